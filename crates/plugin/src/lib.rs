//! Borealis Plugin - WASM plugin runtime for Borealis.
//!
//! This crate loads typed WebAssembly plugins and executes their exported
//! functions with structured arguments and results.
//!
//! # Plugin Architecture
//!
//! A plugin is a compiled WASM module plus a metadata document describing
//! its exported functions, the host functions it imports, and its type
//! definitions. The metadata drives marshaling: values cross the host and
//! guest memory boundary through per-type handlers selected by type name,
//! using the guest's own allocator and GC pin helpers.
//!
//! Plugins must export:
//! - `__new(size, class_id) -> ptr` - the allocator
//! - `__pin(ptr) -> ptr` / `__unpin(ptr)` - GC pinning
//! - `_start` - top-level initializers
//! - each user-declared function
//!
//! # Host Functions
//!
//! Guests import host functions from the `borealis` module: `log`,
//! `executeGQL`, `httpFetch`, the model-provider calls, and the vector
//! collection operations. WASI preview 1 is layered in alongside.
//!
//! # Isolation
//!
//! Every invocation runs in a freshly instantiated module with its own
//! linear memory, acquired from [`WasmHost::acquire`] and closed when the
//! invocation ends. Concurrent invocations can never observe each other's
//! allocations.
//!
//! # Example
//!
//! ```ignore
//! use borealis_plugin::{Plugin, PluginRegistry, WasmHost};
//!
//! let host = WasmHost::new(config)?;
//! let plugin = Plugin::load_dir(host.engine(), Path::new("./my-plugin"))?;
//!
//! let mut instance = host.acquire(&plugin, context, env)?;
//! let result = instance.call_function("add", &params)?;
//! let output = instance.close();
//! ```

mod adapter;
mod error;
mod functions;
mod handlers;
mod host;
mod instance;
mod registry;
mod typeinfo;

pub use adapter::{PinFrame, WasmAdapter, ARRAY_BUFFER_CLASS_ID, STRING_CLASS_ID};
pub use error::{PluginError, Result};
pub use functions::validate_embedder;
pub use handlers::{HandlerSet, TypeHandler};
pub use host::HOST_MODULE;
pub use instance::{GuestExports, InstanceOutput, InstanceState, ModuleInstance, WasmHost};
pub use registry::{Plugin, PluginRegistry};
pub use typeinfo::{align_offset, TypeInfo};
