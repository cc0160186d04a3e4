//! Borealis Collections - the embedded vector collection subsystem.
//!
//! Collections hold namespaced text stores with one vector index per
//! configured search method. Vectors come from embedder functions exported
//! by plugins, so this crate drives guest execution through the injected
//! [`borealis_core::FunctionInvoker`] rather than depending on the plugin
//! runtime directly.

mod error;
mod index;
mod namespace;
mod ops;
mod utils;

pub use error::{CollectionError, Result};
pub use index::{create_index, SearchMatch, SequentialVectorIndex, VectorIndex};
pub use namespace::{
    Collection, CollectionNamespace, CollectionRegistry, InMemoryNamespace, NamespaceStore,
    DEFAULT_NAMESPACE,
};
pub use ops::CollectionRuntime;
pub use utils::{cosine_distance, to_f32_2d};
