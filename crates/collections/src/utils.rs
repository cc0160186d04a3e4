//! Vector math and conversion helpers.

use serde_json::Value;

use crate::error::{CollectionError, Result};

/// Cosine distance between two vectors, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(CollectionError::DimensionMismatch(a.len(), b.len()));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += *x as f64 * *y as f64;
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(CollectionError::ZeroMagnitude);
    }

    Ok(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Converts an embedder result into a two-dimensional f32 array.
pub fn to_f32_2d(embedder: &str, value: &Value) -> Result<Vec<Vec<f32>>> {
    let malformed = |detail: &str| {
        CollectionError::MalformedEmbedding(embedder.to_string(), detail.to_string())
    };

    let rows = value
        .as_array()
        .ok_or_else(|| malformed("expected an array of vectors"))?;

    rows.iter()
        .map(|row| {
            let items = row
                .as_array()
                .ok_or_else(|| malformed("expected each vector to be an array"))?;
            items
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| malformed("expected numeric vector components"))
                })
                .collect()
        })
        .collect()
}
