//! Exact nearest-neighbor index over chunk vectors.
//!
//! [`FlatL2Index`] is built once from the full, ordered list of chunk
//! vectors and is immutable afterwards. A search compares the query against
//! every stored vector (no approximation, no pruning) using squared
//! Euclidean distance, the metric FAISS's `IndexFlatL2` reports.
//!
//! Position `i` in the index corresponds to chunk `i`; the index holds no
//! text. Results come back nearest first, and equal distances are ordered by
//! position, lower first.

use crate::error::{Error, Result};
use crate::models::Neighbor;

#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    /// Build the index from chunk vectors in chunk order.
    ///
    /// # Errors
    ///
    /// [`Error::DegenerateSplit`] if `vectors` is empty;
    /// [`Error::ShapeMismatch`] if the vectors do not all share one dimension.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dims = vectors.first().ok_or(Error::DegenerateSplit)?.len();
        if dims == 0 {
            return Err(Error::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(Error::ShapeMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }
        tracing::info!(vectors = vectors.len(), dims, "built flat L2 index");
        Ok(Self { dims, vectors })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Return the `k` stored vectors closest to `query`.
    ///
    /// Fewer than `k` vectors in the index means all of them are returned.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            return Err(Error::ShapeMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
