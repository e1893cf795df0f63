//! # docqa
//!
//! Ask questions about a single document, answered by a local language model
//! grounded in passages retrieved from that document.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌──────────┐   ┌────────────┐
//! │  Extract  │──▶│  Chunk  │──▶│  Embed   │──▶│ FlatL2Index│
//! │ PDF/OOXML │   │ overlap │   │ fastembed│   │  (exact)   │
//! └───────────┘   └─────────┘   └──────────┘   └─────┬──────┘
//!                                                    │ top-k
//!                      ┌──────────┐   ┌──────────┐   │
//!   question ────────▶ │ Retriever│──▶│ Generator│ ◀─┘
//!                      └──────────┘   │ llama.cpp│
//!                                     └──────────┘
//! ```
//!
//! Everything runs in-process and offline once the models are on disk.
//!
//! ## Quick Start
//!
//! ```bash
//! docqa chat CV.pdf                      # load, then ask in a loop
//! docqa ask CV.pdf "Where did they study?"
//! docqa search CV.pdf "python" --k 5     # retrieval only
//! docqa chunks CV.pdf --json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds |
//! | [`models`] | Core data types |
//! | [`extract`] | Document text extraction |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding backends |
//! | [`index`] | Exact L2 vector index |
//! | [`retrieve`] | Top-k context retrieval |
//! | [`generate`] | Prompting and answer generation |
//! | [`session`] | Load-and-ask orchestration |
//! | [`transcript`] | Conversation log |
//! | [`repl`] | Interactive loop |
//! | [`search`] | `search` command |
//! | [`inspect`] | `chunks` command |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod inspect;
pub mod models;
pub mod repl;
pub mod retrieve;
pub mod search;
pub mod session;
pub mod transcript;

pub use error::{Error, Result};
