//! Tract-based local embedding pipeline (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: loads the ONNX model with tract-onnx and tokenizes with the
//! tokenizers crate. Both are loaded once in [`TractModel::load`]; no ONNX
//! Runtime or system deps.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use super::normalize_l2;
use crate::error::{Error, Result};

const ALL_MINILM_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
const ALL_MINILM_DIMS: usize = 384;
const DEFAULT_MAX_LEN: usize = 256;

type RunFn = Box<dyn Fn(TVec<TValue>) -> TractResult<TVec<TValue>>>;

/// Model manifest: name -> (onnx path in repo, tokenizer path in repo, dims).
fn model_manifest(model_name: &str) -> Result<(&'static str, &'static str, usize)> {
    match model_name {
        "all-minilm-l6-v2" => Ok(("onnx/model.onnx", "tokenizer.json", ALL_MINILM_DIMS)),
        _ => Err(Error::InvalidConfig(format!(
            "tract backend supports only all-minilm-l6-v2 for now. Requested: '{}'",
            model_name
        ))),
    }
}

fn embed_err(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Embedding(format!("{}: {}", what, e))
}

fn cache_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = match configured {
        Some(dir) => dir.to_path_buf(),
        None => {
            let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(base).join(".cache").join("docqa").join("models")
        }
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    tracing::info!(%url, "downloading model file");
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| embed_err(&format!("download {}", url), e))?
        .error_for_status()
        .map_err(|e| embed_err(&format!("download {}", url), e))?;
    let bytes = resp.bytes().map_err(|e| embed_err("read body", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(cache_path, &bytes)?;
    Ok(())
}

/// Ensure model and tokenizer are in cache; return (onnx path, tokenizer path).
fn ensure_cached(model_name: &str, configured: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let (onnx_rel, tokenizer_rel, _) = model_manifest(model_name)?;
    let model_dir = cache_dir(configured)?.join(model_name);
    let onnx_path = model_dir.join(onnx_rel);
    let tokenizer_path = model_dir.join(tokenizer_rel);
    download_to_cache(ALL_MINILM_REPO, onnx_rel, &onnx_path)?;
    download_to_cache(ALL_MINILM_REPO, tokenizer_rel, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

/// A loaded ONNX sentence-embedding model and its tokenizer.
pub struct TractModel {
    tokenizer: tokenizers::Tokenizer,
    run: RunFn,
    dims: usize,
}

impl TractModel {
    pub fn load(model_name: &str, cache: Option<&Path>) -> Result<Self> {
        let (_, _, dims) = model_manifest(model_name)?;
        let (onnx_path, tokenizer_path) = ensure_cached(model_name, cache)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| embed_err("load tokenizer", e))?;

        let model = tract_onnx::onnx()
            .model_for_path(onnx_path)
            .map_err(|e| embed_err("load ONNX", e))?
            .into_optimized()
            .map_err(|e| embed_err("optimize", e))?
            .into_runnable()
            .map_err(|e| embed_err("build tract runnable", e))?;

        Ok(Self {
            tokenizer,
            run: Box::new(move |inputs| model.run(inputs)),
            dims,
        })
    }

    pub fn embed(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size.max(1)) {
            let encodings: Vec<_> = chunk
                .iter()
                .map(|s| {
                    self.tokenizer
                        .encode(s.as_str(), true)
                        .map_err(|e| embed_err("tokenize", e))
                })
                .collect::<Result<Vec<_>>>()?;

            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len())
                .max()
                .unwrap_or(1)
                .clamp(1, DEFAULT_MAX_LEN);

            let batch = encodings.len();
            let mut input_ids = vec![0i64; batch * max_len];
            let mut attention_mask = vec![0i64; batch * max_len];

            for (i, enc) in encodings.iter().enumerate() {
                for (j, &id) in enc.get_ids().iter().take(max_len).enumerate() {
                    input_ids[i * max_len + j] = id as i64;
                    attention_mask[i * max_len + j] = 1;
                }
            }

            let input_ids_tensor = ndarray::Array2::from_shape_vec((batch, max_len), input_ids)
                .map_err(|e| embed_err("input ids shape", e))?;
            let attention_mask_tensor =
                ndarray::Array2::from_shape_vec((batch, max_len), attention_mask)
                    .map_err(|e| embed_err("attention mask shape", e))?;

            let input_ids_t: Tensor = input_ids_tensor.into();
            let attention_mask_t: Tensor = attention_mask_tensor.into();
            let result = (self.run)(tvec!(input_ids_t.into(), attention_mask_t.into()))
                .map_err(|e| embed_err("run model", e))?;

            let output = result
                .into_iter()
                .next()
                .ok_or_else(|| Error::Embedding("no output tensor".to_string()))?;
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| embed_err("output to array", e))?;

            // Rank 2 output is already pooled; rank 3 is last_hidden_state and is
            // mean-pooled over each input's real tokens.
            match view.ndim() {
                2 => all_embeddings.extend(
                    view.outer_iter()
                        .map(|row| normalize_l2(row.iter().copied().collect())),
                ),
                3 => {
                    for (hidden, enc) in view.outer_iter().zip(&encodings) {
                        let tokens = enc.get_ids().len().clamp(1, hidden.shape()[0]);
                        let pooled = hidden
                            .slice(ndarray::s![..tokens, ..])
                            .mean_axis(ndarray::Axis(0))
                            .ok_or_else(|| Error::Embedding("empty hidden state".to_string()))?;
                        all_embeddings.push(normalize_l2(pooled.iter().copied().collect()));
                    }
                }
                _ => {
                    return Err(Error::ShapeMismatch {
                        expected: self.dims,
                        actual: view.shape().last().copied().unwrap_or(0),
                    })
                }
            }
        }

        Ok(all_embeddings)
    }
}
