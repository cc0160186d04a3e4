//! Collection error types.

use thiserror::Error;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Error type for collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection {0} not found")]
    CollectionNotFound(String),

    #[error("namespace {0} not found")]
    NamespaceNotFound(String),

    #[error("search method {method} not found in collection {collection}")]
    SearchMethodNotFound { collection: String, method: String },

    #[error("embedder not found in search method {method} of collection {collection}")]
    EmbedderNotConfigured { collection: String, method: String },

    #[error("mismatch in number of labels and texts: {labels} != {texts}")]
    LabelCountMismatch { labels: usize, texts: usize },

    #[error("mismatch in number of keys and texts: {keys} != {texts}")]
    KeyCountMismatch { keys: usize, texts: usize },

    #[error("mismatch in number of embeddings generated by embedder {0}")]
    EmbeddingCountMismatch(String),

    #[error("no embeddings generated by embedder {0}")]
    NoEmbeddings(String),

    #[error("embedder {0} returned a malformed result: {1}")]
    MalformedEmbedding(String, String),

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("vector index {0} not found")]
    IndexNotFound(String),

    #[error("vector id {0} not found")]
    VectorNotFound(i64),

    #[error("vectors have different lengths: {0} != {1}")]
    DimensionMismatch(usize, usize),

    #[error("cannot compute distance to a zero-magnitude vector")]
    ZeroMagnitude,

    #[error("Execution was cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] borealis_core::CoreError),
}

impl From<CollectionError> for borealis_core::CoreError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::Core(e) => e,
            CollectionError::Cancelled => borealis_core::CoreError::Cancelled,
            other => borealis_core::CoreError::Collection(other.to_string()),
        }
    }
}
