//! Top-k context retrieval for a question.
//!
//! The [`Retriever`] embeds the query with the same [`Embedder`] that
//! embedded the chunks, searches the [`FlatL2Index`], maps hit positions back
//! to chunk text and joins the texts with a blank line.
//!
//! Overlapping neighbours are not deduplicated: when two adjacent chunks are
//! both retrieved, the text they share appears twice in the context.

use crate::embedding::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::index::FlatL2Index;
use crate::models::{Chunk, Retrieval, RetrievedChunk};

/// Separator placed between retrieved chunks in the context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a FlatL2Index,
    chunks: &'a [Chunk],
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a FlatL2Index,
        chunks: &'a [Chunk],
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chunks,
            top_k,
        }
    }

    /// Retrieve the `top_k` chunks nearest to `query`.
    ///
    /// An empty query is embedded and searched like any other string.
    pub fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let q_vec = embed_query(self.embedder, query)?;
        let neighbors = self.index.search(&q_vec, self.top_k)?;

        let hits = neighbors
            .into_iter()
            .map(|n| {
                let chunk = self.chunks.get(n.position).ok_or_else(|| {
                    Error::ShapeMismatch {
                        expected: self.chunks.len(),
                        actual: self.index.len(),
                    }
                })?;
                Ok(RetrievedChunk {
                    position: n.position,
                    distance: n.distance,
                    text: chunk.text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            top_k = self.top_k,
            distances = ?hits.iter().map(|h| h.distance).collect::<Vec<_>>(),
            "retrieved chunks"
        );

        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        Ok(Retrieval { hits, context })
    }
}
