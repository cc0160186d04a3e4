//! Engine error types.

use thiserror::Error;

use borealis_plugin::PluginError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error type for the data source and invocation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input envelope could not be decoded.
    #[error("error parsing input: {0}")]
    Envelope(String),

    /// A result value did not fit its selection set.
    #[error("{0}")]
    Shape(String),

    /// The host environment was used before composition wired it.
    #[error("host environment is not wired")]
    NotWired,

    /// Plugin runtime error.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] borealis_core::CoreError),

    /// Response serialization failure.
    #[error("failed to serialize response: {0}")]
    Serialize(String),

    /// IO error writing the response.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the error belongs in the GraphQL response rather than only
    /// in the server log.
    pub fn is_user_visible(&self) -> bool {
        match self {
            EngineError::Plugin(e) => e.is_user_visible(),
            EngineError::Envelope(_) | EngineError::Shape(_) | EngineError::Core(_) => true,
            EngineError::NotWired | EngineError::Serialize(_) | EngineError::Io(_) => false,
        }
    }
}

impl From<EngineError> for borealis_core::CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(e) => e,
            EngineError::Plugin(e) => e.into(),
            other => borealis_core::CoreError::Invocation(other.to_string()),
        }
    }
}
