//! Error kinds shared by every pipeline stage.
//!
//! Each fallible stage returns [`Result`]. Nothing in the library exits the
//! process: the binary (or any other embedding application) decides whether a
//! failure aborts the session, asks the user to retry, or is only reported.

use std::path::PathBuf;
use thiserror::Error;

/// What a [`Error::MissingResource`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The source document handed to `load`.
    Document,
    /// The GGUF weight file of the language model.
    Model,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Document => write!(f, "document"),
            ResourceKind::Model => write!(f, "model"),
        }
    }
}

/// Errors raised by the question-answering pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A document or model path does not resolve to a readable file.
    #[error("{kind} not found at '{}'", path.display())]
    MissingResource {
        /// Which resource was missing.
        kind: ResourceKind,
        /// The path that was tried.
        path: PathBuf,
    },

    /// The document produced no text (e.g. an image-only scan).
    #[error("no text extracted from {source_name}")]
    EmptyExtraction {
        /// Display name of the document.
        source_name: String,
    },

    /// Splitting or indexing produced nothing to search.
    #[error("text splitting produced zero chunks")]
    DegenerateSplit,

    /// An embedding had an unexpected dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Dimension the index or model declares.
        expected: usize,
        /// Dimension that was produced or supplied.
        actual: usize,
    },

    /// The document extension is not one the extractor understands.
    #[error("unsupported document format: '{0}'")]
    UnsupportedFormat(String),

    /// The extraction library failed on the document bytes.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Parameters that cannot produce a valid pipeline.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding backend failed to load or run.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation backend failed to load or run.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The prompt leaves no room for an answer in the model context window.
    #[error("prompt of {prompt_tokens} tokens does not fit the {n_ctx}-token context window")]
    ContextOverflow {
        /// Tokens in the rendered prompt.
        prompt_tokens: usize,
        /// Context window of the loaded model.
        n_ctx: usize,
    },

    /// A question was asked before any document was loaded.
    #[error("no document loaded")]
    NotReady,

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
