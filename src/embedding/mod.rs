//! Embedding backends.
//!
//! Defines the [`Embedder`] trait and its implementations:
//! - **[`LocalEmbedder`]**: runs a sentence-embedding model locally via
//!   fastembed (primary) or tract (musl/Intel Mac). The model is loaded once
//!   when the embedder is created and reused for every chunk and query.
//! - **[`HashingEmbedder`]**: deterministic feature-hashing bag of words.
//!   Needs no model download; used for tests and offline smoke runs.
//!
//! Chunks and queries must be embedded by the same instance: vectors from
//! different models do not live in a comparable space.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the backend named in the config:
//!
//! ```rust
//! # use docqa::config::EmbeddingConfig;
//! # use docqa::embedding::{create_embedder, embed_query};
//! let config = EmbeddingConfig { provider: "hashing".into(), ..Default::default() };
//! let embedder = create_embedder(&config).unwrap();
//! let v = embed_query(embedder.as_ref(), "hello world").unwrap();
//! assert_eq!(v.len(), embedder.dims());
//! ```

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Default local model; sentence-transformers all-MiniLM-L6-v2.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";
/// Dimensionality of the hashing embedder unless configured.
pub const DEFAULT_HASHING_DIMS: usize = 384;

/// Maps text to fixed-dimension vectors.
///
/// Implementations are loaded once and then treated as stateless: embedding
/// the same string twice yields the same vector.
pub trait Embedder {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch of texts and verify the shape of the output.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if any vector's length differs from
/// [`Embedder::dims`]; [`Error::Embedding`] if the backend returns a
/// different number of vectors than inputs.
pub fn embed_texts(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed(texts)?;
    if vectors.len() != texts.len() {
        return Err(Error::Embedding(format!(
            "{} returned {} vectors for {} inputs",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    let expected = embedder.dims();
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(Error::ShapeMismatch {
            expected,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

/// Embed a single query text.
///
/// Convenience wrapper around [`embed_texts`].
pub fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embed_texts(embedder, &[text.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (fastembed or tract, see features) |
/// | `"hashing"` | [`HashingEmbedder`] |
///
/// Loading a local model may download weights on first use and is slow;
/// call this once per session.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
        )?)),
        #[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
        "local" => Ok(Box::new(LocalEmbedder::load(config)?)),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => Err(Error::InvalidConfig(
            "local embedding provider requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
                .to_string(),
        )),
        other => Err(Error::InvalidConfig(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Hashing Embedder ============

/// Deterministic bag-of-words embedder.
///
/// Lowercased alphanumeric tokens are hashed (SHA-256) into `dims` signed
/// buckets and the result is L2-normalized. Texts sharing words end up
/// close; there is no notion of synonyms. The empty string maps to the zero
/// vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::InvalidConfig(
                "hashing embedder needs dims > 0".to_string(),
            ));
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        normalize_l2(v)
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ Local Embedder (fastembed or tract) ============

/// Sentence-embedding model run in-process (fastembed on primary platforms,
/// tract on musl/Intel Mac).
///
/// Weights are downloaded from Hugging Face on first use and cached; after
/// that, embeddings run entirely offline.
#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    #[cfg(feature = "local-embeddings-fastembed")]
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    #[cfg(all(
        feature = "local-embeddings-tract",
        not(feature = "local-embeddings-fastembed")
    ))]
    model: local_tract::TractModel,
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
impl LocalEmbedder {
    /// Load the configured model. Slow: may download weights.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        tracing::info!(model = %model_name, dims, "loading embedding model");

        #[cfg(feature = "local-embeddings-fastembed")]
        let model = {
            let mut options =
                fastembed::InitOptions::new(config_to_fastembed_model(&model_name)?)
                    .with_show_download_progress(true);
            if let Some(dir) = &config.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let model = fastembed::TextEmbedding::try_new(options).map_err(|e| {
                Error::Embedding(format!("failed to initialize local embedding model: {}", e))
            })?;
            std::sync::Mutex::new(model)
        };

        #[cfg(all(
            feature = "local-embeddings-tract",
            not(feature = "local-embeddings-fastembed")
        ))]
        let model = local_tract::TractModel::load(&model_name, config.cache_dir.as_deref())?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model,
        })
    }
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| Error::Embedding("embedding model lock poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| Error::Embedding(format!("local embedding failed: {}", e)))
    }

    #[cfg(all(
        feature = "local-embeddings-tract",
        not(feature = "local-embeddings-fastembed")
    ))]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.model.embed(texts, self.batch_size)
    }
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(Error::InvalidConfig(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

/// Scale `v` to unit length; the zero vector is returned unchanged.
pub(crate) fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
