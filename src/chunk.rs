//! Separator-aware text chunker with overlap.
//!
//! Splits normalized document text into [`Chunk`]s of at most `chunk_size`
//! characters, preferring to cut at the configured separator (a newline by
//! default) and carrying up to `chunk_overlap` characters of trailing
//! context from one chunk into the next.
//!
//! Every chunk is a slice of the input: pieces are tracked as spans into the
//! text, and a chunk runs from the start of its first piece to the end of its
//! last, with the original separators and spacing in between.
//!
//! # Algorithm
//!
//! 1. Split the text on the separator; each piece is the span of its
//!    non-whitespace content. Blank pieces are dropped.
//! 2. Hard-split any piece longer than `chunk_size` at the last whitespace
//!    before the limit (or exactly at the limit when there is none).
//! 3. Walk the pieces, growing the current window while the span from its
//!    first piece to the next piece stays within `chunk_size`.
//! 4. When the next piece does not fit, emit the window's span as a chunk,
//!    then drop pieces from its front until what is left spans no more than
//!    `chunk_overlap` and the next piece fits. The survivors open the next
//!    chunk.
//!
//! Lengths are counted in Unicode scalar values, not bytes. The output is a
//! pure function of the input text and configuration.
//!
//! # Example
//!
//! ```rust
//! use docqa::chunk::split_text;
//! use docqa::config::ChunkingConfig;
//!
//! let config = ChunkingConfig { chunk_size: 12, chunk_overlap: 0, separator: "\n".into() };
//! let chunks = split_text("A cat sat. \n A dog ran. \n A bird flew.", &config).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["A cat sat.", "A dog ran.", "A bird flew."]);
//! ```

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::Chunk;

/// A piece of the input: byte range plus the matching char positions.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    char_start: usize,
    char_end: usize,
}

/// Split `text` into overlapping chunks.
///
/// # Errors
///
/// - [`Error::EmptyExtraction`] if `text` is empty.
/// - [`Error::InvalidConfig`] if `chunk_size` is zero, `chunk_overlap >= chunk_size`,
///   or the separator is empty.
/// - [`Error::DegenerateSplit`] if no non-blank piece survives splitting.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if text.is_empty() {
        return Err(Error::EmptyExtraction {
            source_name: "input text".to_string(),
        });
    }
    config.validate()?;

    let pieces = split_pieces(text, config);
    let chunks = merge_pieces(text, &pieces, config);
    if chunks.is_empty() {
        return Err(Error::DegenerateSplit);
    }

    tracing::info!(
        chunks = chunks.len(),
        chunk_size = config.chunk_size,
        overlap = config.chunk_overlap,
        "split text into chunks"
    );
    Ok(chunks)
}

fn split_pieces(text: &str, config: &ChunkingConfig) -> Vec<Span> {
    let sep = config.separator.as_str();
    let mut cursor = CharCursor::default();
    let mut pieces = Vec::new();
    let mut offset = 0;

    for part in text.split(sep) {
        let part_start = offset;
        offset += part.len() + sep.len();

        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let base = part_start + (part.len() - part.trim_start().len());
        for (s, e) in hard_split(trimmed, config.chunk_size) {
            let (start, end) = (base + s, base + e);
            pieces.push(Span {
                start,
                end,
                char_start: cursor.advance(text, start),
                char_end: cursor.advance(text, end),
            });
        }
    }
    pieces
}

fn merge_pieces(text: &str, pieces: &[Span], config: &ChunkingConfig) -> Vec<Chunk> {
    let size = config.chunk_size;
    let overlap = config.chunk_overlap;

    let mut chunks = Vec::new();
    let mut window: VecDeque<Span> = VecDeque::new();

    for &piece in pieces {
        let fits = |w: &VecDeque<Span>| {
            w.front()
                .map_or(true, |first| piece.char_end - first.char_start <= size)
        };

        if !fits(&window) {
            push_chunk(&mut chunks, text, &window);
            while let (Some(first), Some(last)) = (window.front(), window.back()) {
                if last.char_end - first.char_start <= overlap && fits(&window) {
                    break;
                }
                window.pop_front();
            }
        }
        window.push_back(piece);
    }
    push_chunk(&mut chunks, text, &window);

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, window: &VecDeque<Span>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let body = text[first.start..last.end].trim();
    if !body.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: body.to_string(),
        });
    }
}

/// Byte ranges (relative to `piece`) of fragments of at most `max_chars`.
///
/// `piece` must be trimmed; every fragment is trimmed too.
fn hard_split(piece: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < piece.len() {
        let rest = &piece[pos..];
        if char_len(rest) <= max_chars {
            out.push((pos, piece.len()));
            break;
        }
        let limit = byte_offset(rest, max_chars);
        let cut = rest[..limit]
            .rfind(char::is_whitespace)
            .filter(|&at| at > 0)
            .unwrap_or(limit);
        let head = rest[..cut].trim_end();
        if !head.is_empty() {
            out.push((pos, pos + head.len()));
        }
        let tail = &rest[cut..];
        pos += cut + (tail.len() - tail.trim_start().len());
    }
    out
}

/// Maps increasing byte offsets to char positions in one forward pass.
#[derive(Default)]
struct CharCursor {
    byte: usize,
    chars: usize,
}

impl CharCursor {
    fn advance(&mut self, text: &str, to: usize) -> usize {
        self.chars += char_len(&text[self.byte..to]);
        self.byte = to;
        self.chars
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th char (or the string length).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
