//! `docqa chunks`: inspect how a document was split.
//!
//! Only extraction and chunking run; no embedding model is loaded.

use anyhow::Result;

use crate::chunk::split_text;
use crate::config::ChunkingConfig;
use crate::extract::{load_document, ExtractedDocument};
use crate::models::Chunk;

/// Extract and split `path` without building an index.
pub fn split_document(
    path: &std::path::Path,
    config: &ChunkingConfig,
) -> crate::Result<(ExtractedDocument, Vec<Chunk>)> {
    let document = load_document(path)?;
    let chunks = split_text(&document.text, config)?;
    Ok((document, chunks))
}

pub fn run_chunks(document: &ExtractedDocument, chunks: &[Chunk], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
    } else {
        print!("{}", render_chunks(document, chunks));
    }
    Ok(())
}

pub fn render_chunks(document: &ExtractedDocument, chunks: &[Chunk]) -> String {
    let mut out = String::new();
    out.push_str("--- Document ---\n");
    out.push_str(&format!("source: {}\n", document.source.display()));
    out.push_str(&format!("sha256: {}\n", document.digest));
    out.push_str(&format!("pages:  {}\n", document.page_count));
    out.push_str(&format!("chars:  {}\n\n", document.text.chars().count()));
    out.push_str(&format!("--- Chunks ({}) ---\n", chunks.len()));
    for chunk in chunks {
        out.push_str(&format!("[chunk {}]\n{}\n\n", chunk.index, chunk.text));
    }
    out
}
