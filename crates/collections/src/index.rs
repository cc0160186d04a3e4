//! Vector indices.

use std::collections::BTreeMap;

use borealis_core::IndexParams;

use crate::error::{CollectionError, Result};
use crate::utils::cosine_distance;

/// A single search hit: external id plus cosine distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub id: i64,
    pub distance: f64,
}

/// A vector index for one search method within one namespace.
///
/// Indices are keyed by external id; key-to-id resolution is the owning
/// namespace's job, so an index never holds a reference back into it.
pub trait VectorIndex: Send + Sync {
    /// Inserts or overwrites vectors by external id. `ids` and `vectors`
    /// must have the same length.
    fn insert_vectors(&mut self, ids: &[i64], vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Removes the vector with the given external id, if present.
    fn delete_vector(&mut self, id: i64) -> Result<()>;

    /// Returns the `k` nearest vectors by ascending cosine distance.
    /// Entries rejected by `filter` are skipped.
    fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&dyn Fn(i64) -> bool>,
    ) -> Result<Vec<SearchMatch>>;

    /// Returns the vector stored under the given external id.
    fn get_vector(&self, id: i64) -> Result<Vec<f32>>;

    /// Number of vectors stored.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates an index for the given parameters.
pub fn create_index(params: &IndexParams) -> Box<dyn VectorIndex> {
    match params {
        IndexParams::Sequential => Box::new(SequentialVectorIndex::new()),
    }
}

/// Exact flat-scan index: every search compares against every stored
/// vector.
#[derive(Default)]
pub struct SequentialVectorIndex {
    vectors: BTreeMap<i64, Vec<f32>>,
}

impl SequentialVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for SequentialVectorIndex {
    fn insert_vectors(&mut self, ids: &[i64], vectors: Vec<Vec<f32>>) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(CollectionError::DimensionMismatch(ids.len(), vectors.len()));
        }
        for (id, vector) in ids.iter().zip(vectors) {
            self.vectors.insert(*id, vector);
        }
        Ok(())
    }

    fn delete_vector(&mut self, id: i64) -> Result<()> {
        self.vectors.remove(&id);
        Ok(())
    }

    fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&dyn Fn(i64) -> bool>,
    ) -> Result<Vec<SearchMatch>> {
        let mut matches = Vec::with_capacity(self.vectors.len());
        for (id, candidate) in &self.vectors {
            if let Some(filter) = filter {
                if !filter(*id) {
                    continue;
                }
            }
            matches.push(SearchMatch {
                id: *id,
                distance: cosine_distance(vector, candidate)?,
            });
        }

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        Ok(matches)
    }

    fn get_vector(&self, id: i64) -> Result<Vec<f32>> {
        self.vectors
            .get(&id)
            .cloned()
            .ok_or(CollectionError::VectorNotFound(id))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
