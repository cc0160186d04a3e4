//! Error types shared across the Borealis runtime.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that cross crate boundaries in the runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to decode plugin metadata: {0}")]
    Metadata(String),

    #[error("Failed to decode collection manifest: {0}")]
    Manifest(String),

    #[error("Failed to decode runtime configuration: {0}")]
    Config(String),

    #[error("no function registered named {0}")]
    UnknownFunction(String),

    #[error("{0}")]
    Collection(String),

    #[error("Model provider error: {0}")]
    Model(String),

    #[error("GraphQL execution error: {0}")]
    Graphql(String),

    #[error("Function invocation failed: {0}")]
    Invocation(String),

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
