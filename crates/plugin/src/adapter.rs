//! WASM adapter: typed access to one instantiated module's memory and
//! allocator.
//!
//! The adapter wraps a store context together with the guest's exported
//! memory and its `__new` / `__pin` / `__unpin` helpers. All multi-byte
//! reads and writes are little-endian. Pointers allocated while marshaling
//! are pinned immediately so the guest's collector cannot move or reclaim
//! them mid-marshal; pins are tracked in frames and released in reverse
//! order on every exit path.

use std::sync::Arc;

use wasmtime::{AsContextMut, Caller, Instance, StoreContextMut, Val, ValType};

use borealis_core::{ExecutionContext, Function, HostEnv};

use crate::error::{PluginError, Result};
use crate::handlers::HandlerSet;
use crate::instance::{GuestExports, InstanceState};

/// Class id the guest allocator stamps into ArrayBuffer headers.
pub const ARRAY_BUFFER_CLASS_ID: u32 = 1;

/// Class id the guest allocator stamps into string headers.
pub const STRING_CLASS_ID: u32 = 2;

/// Size of the 16-byte array object: buffer, data start, byte length,
/// element count.
pub const ARRAY_OBJECT_SIZE: u32 = 16;

/// Size of the 12-byte typed-array view: buffer, data start, byte length.
pub const TYPED_ARRAY_OBJECT_SIZE: u32 = 12;

/// Marks the start of a pin frame; see [`WasmAdapter::enter_pin_frame`].
#[derive(Debug, Clone, Copy)]
pub struct PinFrame(usize);

/// Typed view over one module instance's memory and allocator.
pub struct WasmAdapter<'a> {
    store: StoreContextMut<'a, InstanceState>,
    instance: Option<Instance>,
    guest: GuestExports,
    handlers: Arc<HandlerSet>,
    pins: Vec<u32>,
}

impl<'a> WasmAdapter<'a> {
    /// Creates an adapter over a module instance's own store. Used for
    /// outer invocations, where guest functions can be dispatched.
    pub(crate) fn new(
        store: StoreContextMut<'a, InstanceState>,
        instance: Instance,
        guest: GuestExports,
        handlers: Arc<HandlerSet>,
    ) -> Self {
        Self {
            store,
            instance: Some(instance),
            guest,
            handlers,
            pins: Vec::new(),
        }
    }

    /// Creates an adapter from a host-function caller. Host functions can
    /// marshal values but cannot dispatch further guest functions.
    pub fn from_caller(caller: &'a mut Caller<'_, InstanceState>) -> Result<Self> {
        let guest = caller
            .data()
            .guest
            .clone()
            .ok_or_else(|| PluginError::MissingExport("memory".to_string()))?;
        let handlers = caller.data().plugin.handlers().clone();

        Ok(Self {
            store: caller.as_context_mut(),
            instance: None,
            guest,
            handlers,
            pins: Vec::new(),
        })
    }

    /// The execution context of the invocation this instance serves.
    pub fn context(&self) -> &ExecutionContext {
        &self.store.data().context
    }

    /// The host environment injected at instantiation.
    pub fn env(&self) -> Arc<HostEnv> {
        self.store.data().env.clone()
    }

    /// The handler set of the plugin this instance was built from.
    pub fn handlers(&self) -> Arc<HandlerSet> {
        self.handlers.clone()
    }

    /// The declared signature of an imported host function, keyed
    /// `module.function`.
    pub fn import_signature(&self, key: &str) -> Result<Function> {
        self.store
            .data()
            .plugin
            .metadata()
            .import(key)
            .cloned()
            .ok_or_else(|| PluginError::MissingImportSignature(key.to_string()))
    }

    // --- memory access -----------------------------------------------------

    /// Reads `len` bytes at `offset`.
    pub fn read_bytes(&self, offset: u32, len: u32) -> Result<Vec<u8>> {
        let data = self.guest.memory.data(&self.store);
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or(PluginError::MemoryAccess { offset, len })?;
        data.get(start..end)
            .map(|s| s.to_vec())
            .ok_or(PluginError::MemoryAccess { offset, len })
    }

    /// Writes `bytes` at `offset`.
    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        let data = self.guest.memory.data_mut(&mut self.store);
        let start = offset as usize;
        let end = start
            .checked_add(bytes.len())
            .ok_or(PluginError::MemoryAccess {
                offset,
                len: bytes.len() as u32,
            })?;
        data.get_mut(start..end)
            .ok_or(PluginError::MemoryAccess {
                offset,
                len: bytes.len() as u32,
            })?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_u8(&self, offset: u32) -> Result<u8> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    pub fn read_u16(&self, offset: u32) -> Result<u16> {
        let b = self.read_bytes(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, offset: u32) -> Result<u32> {
        let b = self.read_bytes(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&self, offset: u32) -> Result<u64> {
        let b = self.read_bytes(offset, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f32(&self, offset: u32) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(offset)?))
    }

    pub fn read_f64(&self, offset: u32) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64(offset)?))
    }

    pub fn write_u8(&mut self, offset: u32, val: u8) -> Result<()> {
        self.write_bytes(offset, &[val])
    }

    pub fn write_u16(&mut self, offset: u32, val: u16) -> Result<()> {
        self.write_bytes(offset, &val.to_le_bytes())
    }

    pub fn write_u32(&mut self, offset: u32, val: u32) -> Result<()> {
        self.write_bytes(offset, &val.to_le_bytes())
    }

    pub fn write_u64(&mut self, offset: u32, val: u64) -> Result<()> {
        self.write_bytes(offset, &val.to_le_bytes())
    }

    pub fn write_f32(&mut self, offset: u32, val: f32) -> Result<()> {
        self.write_u32(offset, val.to_bits())
    }

    pub fn write_f64(&mut self, offset: u32, val: f64) -> Result<()> {
        self.write_u64(offset, val.to_bits())
    }

    /// Reads the header words preceding a guest object: class id at
    /// `ptr - 8`, payload byte length at `ptr - 4`.
    pub fn read_object_header(&self, ptr: u32) -> Result<(u32, u32)> {
        if ptr < 8 {
            return Err(PluginError::MemoryAccess {
                offset: ptr,
                len: 8,
            });
        }
        let class_id = self.read_u32(ptr - 8)?;
        let byte_len = self.read_u32(ptr - 4)?;
        Ok((class_id, byte_len))
    }

    // --- allocation and pinning --------------------------------------------

    /// Allocates `size` bytes with the given class id and pins the result
    /// into the current pin frame.
    pub fn allocate(&mut self, size: u32, class_id: u32) -> Result<u32> {
        let ptr = self
            .guest
            .fn_new
            .call(&mut self.store, (size, class_id))
            .map_err(|e| PluginError::GuestTrap(e.to_string()))?;
        self.pin(ptr)?;
        Ok(ptr)
    }

    /// Pins a guest pointer into the current frame.
    pub fn pin(&mut self, ptr: u32) -> Result<()> {
        self.guest
            .fn_pin
            .call(&mut self.store, ptr)
            .map_err(|e| PluginError::GuestTrap(e.to_string()))?;
        self.pins.push(ptr);
        Ok(())
    }

    /// Opens a pin frame. Every pin taken until the matching
    /// [`exit_pin_frame`](Self::exit_pin_frame) belongs to it.
    pub fn enter_pin_frame(&mut self) -> PinFrame {
        PinFrame(self.pins.len())
    }

    /// Unpins everything pinned since `frame` was opened, in reverse
    /// order. Idempotent: exiting an already-drained frame is a no-op.
    pub fn exit_pin_frame(&mut self, frame: PinFrame) -> Result<()> {
        while self.pins.len() > frame.0 {
            if let Some(ptr) = self.pins.pop() {
                self.guest
                    .fn_unpin
                    .call(&mut self.store, ptr)
                    .map_err(|e| PluginError::GuestTrap(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Number of live pins. Zero once the outermost frame has been exited.
    pub fn live_pins(&self) -> usize {
        self.pins.len()
    }

    // --- invocation --------------------------------------------------------

    /// Invokes a guest-exported function with raw argument words, mapping
    /// each word onto the function's declared core type.
    pub fn invoke_raw(&mut self, name: &str, args: &[u64]) -> Result<Vec<u64>> {
        let instance = self
            .instance
            .ok_or_else(|| PluginError::FunctionNotFound(name.to_string()))?;
        let func = instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| PluginError::FunctionNotFound(name.to_string()))?;

        let ty = func.ty(&self.store);
        let param_types: Vec<ValType> = ty.params().collect();
        if param_types.len() != args.len() {
            return Err(PluginError::Marshal(format!(
                "function {name} takes {} arguments, got {}",
                param_types.len(),
                args.len()
            )));
        }

        let params: Vec<Val> = param_types
            .iter()
            .zip(args)
            .map(|(t, w)| word_to_val(t, *w))
            .collect::<Result<_>>()?;

        let mut results = vec![Val::I32(0); ty.results().len()];
        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| PluginError::GuestTrap(format!("{e:#}")))?;

        results.iter().map(val_to_word).collect()
    }
}

fn word_to_val(ty: &ValType, word: u64) -> Result<Val> {
    match ty {
        ValType::I32 => Ok(Val::I32(word as u32 as i32)),
        ValType::I64 => Ok(Val::I64(word as i64)),
        ValType::F32 => Ok(Val::F32(word as u32)),
        ValType::F64 => Ok(Val::F64(word)),
        other => Err(PluginError::Marshal(format!(
            "unsupported parameter type {other}"
        ))),
    }
}

fn val_to_word(val: &Val) -> Result<u64> {
    match val {
        Val::I32(v) => Ok(*v as u32 as u64),
        Val::I64(v) => Ok(*v as u64),
        Val::F32(bits) => Ok(*bits as u64),
        Val::F64(bits) => Ok(*bits),
        other => Err(PluginError::Marshal(format!(
            "unsupported result type {other:?}"
        ))),
    }
}
