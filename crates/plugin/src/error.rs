//! Plugin error types.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin file not found.
    #[error("Plugin not found: {0}")]
    NotFound(PathBuf),

    /// Plugin function not found.
    #[error("no function registered named {0}")]
    FunctionNotFound(String),

    /// A required guest export is missing.
    #[error("Plugin does not export '{0}'")]
    MissingExport(String),

    /// The plugin does not declare the signature of a host function it
    /// calls.
    #[error("Plugin does not declare an import signature for '{0}'")]
    MissingImportSignature(String),

    /// Out-of-range guest memory access.
    #[error("Memory access out of range at offset {offset} (length {len})")]
    MemoryAccess { offset: u32, len: u32 },

    /// Pins survived past the outermost marshal frame.
    #[error("{0} pinned pointers were not released")]
    PinLeak(usize),

    /// A guest object header carried an unexpected class id.
    #[error("Unexpected class id {actual} (expected {expected})")]
    BadClassId { expected: u32, actual: u32 },

    /// A null pointer was read for a non-nullable type.
    #[error("null pointer encountered for non-nullable type {0}")]
    NullPointer(String),

    /// A value could not be marshaled to or from guest memory.
    #[error("Type marshaling failed: {0}")]
    Marshal(String),

    /// A required invocation parameter was not supplied.
    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    /// A function offered as an embedder has the wrong shape.
    #[error("invalid embedder function signature")]
    InvalidEmbedder,

    /// The guest function trapped or aborted.
    #[error("Guest execution failed: {0}")]
    GuestTrap(String),

    /// Outbound HTTP failure from the `httpFetch` host function.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The invocation was cancelled.
    #[error("Execution was cancelled")]
    Cancelled,

    /// WASM runtime error.
    #[error("WASM runtime error: {0}")]
    Wasm(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] borealis_core::CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Whether the error should be surfaced to the caller's response.
    ///
    /// Invariant violations (bad class ids, out-of-range reads, missing
    /// exports) describe runtime defects rather than anything the caller
    /// did, so they are logged but kept out of the GraphQL response.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            PluginError::MemoryAccess { .. }
                | PluginError::PinLeak(_)
                | PluginError::BadClassId { .. }
                | PluginError::MissingExport(_)
                | PluginError::MissingImportSignature(_)
                | PluginError::Wasm(_)
                | PluginError::Io(_)
        )
    }
}

impl From<wasmtime::Error> for PluginError {
    fn from(err: wasmtime::Error) -> Self {
        PluginError::Wasm(err.to_string())
    }
}

impl From<PluginError> for borealis_core::CoreError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Core(e) => e,
            PluginError::FunctionNotFound(name) => borealis_core::CoreError::UnknownFunction(name),
            PluginError::Cancelled => borealis_core::CoreError::Cancelled,
            PluginError::InvalidEmbedder => {
                borealis_core::CoreError::Collection(PluginError::InvalidEmbedder.to_string())
            }
            other => borealis_core::CoreError::Invocation(other.to_string()),
        }
    }
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
