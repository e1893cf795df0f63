//! # docqa CLI
//!
//! Loads one document, indexes it in memory and answers questions about it
//! with a local language model.
//!
//! ## Usage
//!
//! ```bash
//! docqa [--config ./config/docqa.toml] [overrides] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa chat <doc>` | Load the document, then answer questions interactively |
//! | `docqa ask <doc> "<question>"` | Answer a single question |
//! | `docqa search <doc> "<query>"` | Show the nearest chunks (no language model) |
//! | `docqa chunks <doc>` | Show how the document was split (no models) |
//!
//! Logs go to stderr; set `RUST_LOG` (default `docqa=info`) to change the level.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa::config::{load_config, load_config_or_default, Config};
use docqa::embedding::create_embedder;
use docqa::generate::create_generator;
use docqa::inspect::{run_chunks, split_document};
use docqa::repl::run_repl;
use docqa::search::run_search;
use docqa::session::Session;
use docqa::transcript::Transcript;

const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

/// Ask questions about a document using local retrieval-augmented generation.
///
/// Settings come from a TOML file (see `config/docqa.example.toml`);
/// the flags below override individual keys.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`; when that file does not exist the
    /// built-in defaults are used. An explicitly given file must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum characters per chunk.
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Characters shared by neighbouring chunks.
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question.
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// GGUF model file used for answers.
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Embedding backend: `local` or `hashing`.
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and answer questions until `exit`.
    Chat {
        /// PDF, DOCX, PPTX, XLSX or plain-text file.
        document: PathBuf,
    },

    /// Answer one question and exit.
    Ask {
        document: PathBuf,
        question: String,
    },

    /// Print the chunks nearest to a query with their distances.
    ///
    /// Does not load the language model.
    Search {
        document: PathBuf,
        query: String,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the chunk sequence of a document.
    Chunks {
        document: PathBuf,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => load_config_or_default(&PathBuf::from(DEFAULT_CONFIG_PATH))?,
        };

        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.chunk_overlap = overlap;
        }
        if let Some(k) = self.top_k {
            config.retrieval.top_k = k;
        }
        if let Some(path) = &self.model_path {
            config.generation.model_path = path.clone();
        }
        if let Some(provider) = &self.embedding_provider {
            config.embedding.provider = provider.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Chat { document } => {
            let mut session = answering_session(config)?;
            let ready = session.load(&document)?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            writeln!(
                out,
                "\n{} loaded and indexed ({} chunks). Type 'exit' to quit.\n",
                ready.source.display(),
                ready.chunks
            )?;
            let mut transcript = Transcript::new();
            run_repl(&mut session, &mut transcript, std::io::stdin().lock(), out)?;
        }
        Commands::Ask { document, question } => {
            let mut session = answering_session(config)?;
            session.load(&document)?;
            let answer = session.ask(&question)?;
            println!("{}", answer.text);
        }
        Commands::Search {
            document,
            query,
            k,
            json,
        } => {
            let mut session = retrieval_session(config)?;
            session.load(&document)?;
            run_search(&session, &query, k, json)?;
        }
        Commands::Chunks { document, json } => {
            let (document, chunks) = split_document(&document, &config.chunking)?;
            run_chunks(&document, &chunks, json)?;
        }
    }

    Ok(())
}

fn retrieval_session(config: Config) -> Result<Session> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Session::new(config, embedder)?)
}

/// The language model loads first so a missing model fails before any
/// document work.
fn answering_session(config: Config) -> Result<Session> {
    let generator = create_generator(&config.generation)?;
    Ok(retrieval_session(config)?.with_generator(generator))
}
