//! Module instantiation: one isolated instance per invocation.
//!
//! Every function invocation gets a freshly instantiated module with its
//! own linear memory, so concurrent requests can never read each other's
//! data and a crashed guest cannot corrupt anyone else's heap. Instances
//! are closed (dropped) when the invocation ends; captured stdout/stderr
//! are re-emitted to the structured log on close, tagged as user-visible
//! output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use wasmtime::{
    AsContextMut, Config, Engine, Instance, Linker, Memory, Store, TypedFunc, UpdateDeadline,
};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::WasiCtxBuilder;

use borealis_core::{ExecutionContext, HostEnv, RuntimeConfig};

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};
use crate::host;
use crate::registry::Plugin;

/// Upper bound on captured guest output per stream.
const MAX_OUTPUT_BYTES: usize = 4 << 20;

/// Store data bound to one module instance.
pub struct InstanceState {
    pub(crate) wasi: WasiP1Ctx,
    pub(crate) context: ExecutionContext,
    pub(crate) env: Arc<HostEnv>,
    pub(crate) plugin: Arc<Plugin>,
    pub(crate) guest: Option<GuestExports>,
}

/// The guest exports the adapter depends on: linear memory, the allocator,
/// and the GC pin/unpin pair.
#[derive(Clone)]
pub struct GuestExports {
    pub(crate) memory: Memory,
    pub(crate) fn_new: TypedFunc<(u32, u32), u32>,
    pub(crate) fn_pin: TypedFunc<u32, u32>,
    pub(crate) fn_unpin: TypedFunc<u32, ()>,
}

/// The WASM host: engine, linker with host functions registered, and the
/// epoch ticker that drives cancellation.
///
/// One host serves the whole process; it is an explicit dependency rather
/// than a global, composed once at startup.
pub struct WasmHost {
    engine: Engine,
    linker: Linker<InstanceState>,
    config: RuntimeConfig,
    _ticker: EpochTicker,
}

impl WasmHost {
    /// Creates a host with host functions and WASI preview 1 registered.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let mut engine_config = Config::new();
        engine_config.epoch_interruption(true);
        let engine = Engine::new(&engine_config)?;

        let mut linker: Linker<InstanceState> = Linker::new(&engine);
        preview1::add_to_linker_sync(&mut linker, |state: &mut InstanceState| &mut state.wasi)?;
        host::register_host_functions(&mut linker)?;

        let tick = Duration::from_millis(config.epoch_tick_ms.max(1));
        let ticker = EpochTicker::start(engine.clone(), tick);

        Ok(Self {
            engine,
            linker,
            config,
            _ticker: ticker,
        })
    }

    /// The underlying wasmtime engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The runtime configuration this host was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Instantiates a fresh module instance for one invocation.
    ///
    /// The instance captures stdout/stderr into per-call buffers, seeds
    /// the WASI clocks and randomness, and runs the guest's `_start` so
    /// top-level initializers execute. Callers must `close` the instance
    /// when the invocation ends.
    pub fn acquire(
        &self,
        plugin: &Arc<Plugin>,
        context: ExecutionContext,
        env: Arc<HostEnv>,
    ) -> Result<ModuleInstance> {
        let stdout = MemoryOutputPipe::new(MAX_OUTPUT_BYTES);
        let stderr = MemoryOutputPipe::new(MAX_OUTPUT_BYTES);

        // Builder defaults seed wall/monotonic clocks and OS randomness.
        let wasi = WasiCtxBuilder::new()
            .stdout(stdout.clone())
            .stderr(stderr.clone())
            .build_p1();

        let state = InstanceState {
            wasi,
            context,
            env,
            plugin: plugin.clone(),
            guest: None,
        };

        let mut store = Store::new(&self.engine, state);

        // A cancelled context traps in-flight guest code at the next
        // epoch tick; everything else keeps running.
        store.set_epoch_deadline(1);
        store.epoch_deadline_callback(|ctx| {
            if ctx.data().context.is_cancelled() {
                Err(wasmtime::Error::msg("function execution cancelled"))
            } else {
                Ok(UpdateDeadline::Continue(1))
            }
        });

        let instance = self
            .linker
            .instantiate(&mut store, plugin.module())
            .map_err(|e| PluginError::Wasm(format!("failed to instantiate plugin module: {e}")))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| PluginError::MissingExport("memory".to_string()))?;
        let fn_new = instance
            .get_typed_func::<(u32, u32), u32>(&mut store, "__new")
            .map_err(|_| PluginError::MissingExport("__new".to_string()))?;
        let fn_pin = instance
            .get_typed_func::<u32, u32>(&mut store, "__pin")
            .map_err(|_| PluginError::MissingExport("__pin".to_string()))?;
        let fn_unpin = instance
            .get_typed_func::<u32, ()>(&mut store, "__unpin")
            .map_err(|_| PluginError::MissingExport("__unpin".to_string()))?;

        store.data_mut().guest = Some(GuestExports {
            memory,
            fn_new,
            fn_pin,
            fn_unpin,
        });

        // Top-level guest code runs at instantiation time.
        if let Ok(start) = instance.get_typed_func::<(), ()>(&mut store, "_start") {
            start
                .call(&mut store, ())
                .map_err(|e| PluginError::GuestTrap(e.to_string()))?;
        }

        Ok(ModuleInstance {
            store,
            instance,
            stdout,
            stderr,
        })
    }
}

/// A plugin instance bound to exactly one invocation.
pub struct ModuleInstance {
    store: Store<InstanceState>,
    instance: Instance,
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

/// Captured guest output, returned when an instance closes.
#[derive(Debug, Default, Clone)]
pub struct InstanceOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ModuleInstance {
    /// The plugin this instance was created from.
    pub fn plugin(&self) -> Arc<Plugin> {
        self.store.data().plugin.clone()
    }

    /// The execution context this instance serves.
    pub fn context(&self) -> &ExecutionContext {
        &self.store.data().context
    }

    /// Builds an adapter over this instance's store.
    pub(crate) fn adapter(&mut self) -> Result<WasmAdapter<'_>> {
        let guest = self
            .store
            .data()
            .guest
            .clone()
            .ok_or_else(|| PluginError::MissingExport("memory".to_string()))?;
        let handlers = self.store.data().plugin.handlers().clone();
        let instance = self.instance;

        Ok(WasmAdapter::new(
            self.store.as_context_mut(),
            instance,
            guest,
            handlers,
        ))
    }

    /// Closes the instance, returning the captured output. Non-empty
    /// output lines are re-emitted to the structured log so operators see
    /// what users see.
    pub fn close(self) -> InstanceOutput {
        let execution_id = self.store.data().context.execution_id().to_string();
        let stdout = String::from_utf8_lossy(&self.stdout.contents()).into_owned();
        let stderr = String::from_utf8_lossy(&self.stderr.contents()).into_owned();
        drop(self.store);

        for line in stdout.lines().filter(|l| !l.is_empty()) {
            tracing::info!(user_visible = true, execution_id = %execution_id, "{line}");
        }
        for line in stderr.lines().filter(|l| !l.is_empty()) {
            tracing::error!(user_visible = true, execution_id = %execution_id, "{line}");
        }

        InstanceOutput { stdout, stderr }
    }
}

/// Background thread advancing the engine epoch so deadline callbacks run
/// inside executing guests.
struct EpochTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EpochTicker {
    fn start(engine: Engine, tick: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(tick);
                engine.increment_epoch();
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
