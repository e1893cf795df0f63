//! Core data types that flow through the pipeline.
//!
//! These represent the chunks, search hits and answers produced between
//! the extraction, retrieval and generation stages.

use serde::Serialize;
use std::path::PathBuf;

/// A bounded segment of the document text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the chunk sequence; equals the vector position in the index.
    pub index: usize,
    pub text: String,
}

/// One nearest-neighbor hit: a position in the index and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// A retrieved chunk together with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub position: usize,
    pub distance: f32,
    pub text: String,
}

/// Result of retrieving context for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    /// Hits, nearest first.
    pub hits: Vec<RetrievedChunk>,
    /// Hit texts joined by a blank line, in hit order.
    pub context: String,
}

/// Summary of a successfully loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ready {
    pub source: PathBuf,
    /// Hex SHA-256 of the document bytes.
    pub digest: String,
    pub pages: usize,
    pub chunks: usize,
    pub dims: usize,
}

/// The answer to one question plus the context it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub retrieval: Retrieval,
}
