//! TOML configuration.
//!
//! Every section and key is optional; an empty file yields the defaults
//! described on each field. See the `[chunking]`, `[retrieval]`,
//! `[embedding]` and `[generation]` tables below.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Default location of the GGUF model weights.
pub const DEFAULT_MODEL_PATH: &str = "./models/Mistral-7B-Instruct-v0.1.Q4_K_M.gguf";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by neighbouring chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Preferred split point.
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local` (fastembed or tract) or `hashing`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Where downloaded model files are cached.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Context window in tokens (prompt + answer).
    #[serde(default = "default_n_ctx")]
    pub n_ctx: u32,
    #[serde(default = "default_n_threads")]
    pub n_threads: i32,
    #[serde(default)]
    pub n_gpu_layers: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    /// Sampling temperature; `<= 0` selects greedy decoding.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k_tokens")]
    pub top_k: i32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_min_p")]
    pub min_p: f32,
    #[serde(default)]
    pub seed: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            n_ctx: default_n_ctx(),
            n_threads: default_n_threads(),
            n_gpu_layers: 0,
            max_tokens: default_max_tokens(),
            stop: default_stop(),
            temperature: default_temperature(),
            top_k: default_top_k_tokens(),
            top_p: default_top_p(),
            min_p: default_min_p(),
            seed: None,
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}
fn default_n_ctx() -> u32 {
    2048
}
fn default_n_threads() -> i32 {
    4
}
fn default_max_tokens() -> usize {
    256
}
fn default_stop() -> Vec<String> {
    vec!["\n".to_string(), "Question:".to_string()]
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_k_tokens() -> i32 {
    40
}
fn default_top_p() -> f32 {
    0.95
}
fn default_min_p() -> f32 {
    0.05
}

impl Config {
    /// Check the invariants every stage relies on.
    pub fn validate(&self) -> crate::Result<()> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig(
                "retrieval.top_k must be >= 1".to_string(),
            ));
        }

        match self.embedding.provider.as_str() {
            "local" | "hashing" => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unknown embedding provider '{}': must be local or hashing",
                    other
                )))
            }
        }
        if self.embedding.dims == Some(0) {
            return Err(Error::InvalidConfig(
                "embedding.dims must be > 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(Error::InvalidConfig(
                "generation.max_tokens must be >= 1".to_string(),
            ));
        }
        if self.generation.n_ctx == 0 {
            return Err(Error::InvalidConfig(
                "generation.n_ctx must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(Error::InvalidConfig(
                "chunking.separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Like [`load_config`], but a file that does not exist yields the defaults.
///
/// Used for the implicit default path; an explicitly passed path should go
/// through [`load_config`] so a typo is reported.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
