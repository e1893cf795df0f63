//! In-process GGUF inference through llama.cpp.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel},
    sampling::LlamaSampler,
    LlamaCppError,
};

use super::{find_stop, GenerationParams, TextGenerator};
use crate::config::GenerationConfig;
use crate::error::{Error, ResourceKind, Result};

fn gen_err(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Generation(format!("{}: {}", what, e))
}

fn init_backend() -> Result<LlamaBackend> {
    match LlamaBackend::init() {
        Ok(backend) => Ok(backend),
        Err(LlamaCppError::BackendAlreadyInitialized) => Ok(LlamaBackend {}),
        Err(e) => Err(gen_err("init llama backend", e)),
    }
}

/// A GGUF model loaded once and reused for every question.
///
/// Each [`TextGenerator::complete`] call opens a fresh context, so answers
/// never see earlier prompts.
pub struct LlamaGenerator {
    name: String,
    n_ctx: u32,
    n_threads: i32,
    model: LlamaModel,
    backend: LlamaBackend,
}

impl LlamaGenerator {
    /// Load the model named by `config.model_path`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingResource`] if the file does not exist;
    /// [`Error::Generation`] if llama.cpp cannot load it.
    pub fn load(config: &GenerationConfig) -> Result<Self> {
        let path: &Path = &config.model_path;
        if !path.is_file() {
            return Err(Error::MissingResource {
                kind: ResourceKind::Model,
                path: path.to_path_buf(),
            });
        }

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("llama-local")
            .to_string();
        tracing::info!(model = %name, n_ctx = config.n_ctx, "loading language model");

        let backend = init_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers);
        let model = LlamaModel::load_from_file(&backend, path, &model_params)
            .map_err(|e| gen_err("load model", e))?;

        Ok(Self {
            name,
            n_ctx: config.n_ctx,
            n_threads: config.n_threads,
            model,
            backend,
        })
    }
}

impl TextGenerator for LlamaGenerator {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);
        let mut context = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| gen_err("create context", e))?;

        let prompt_tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| gen_err("tokenize prompt", e))?;
        let n_ctx = self.n_ctx as usize;
        if prompt_tokens.len() >= n_ctx {
            return Err(Error::ContextOverflow {
                prompt_tokens: prompt_tokens.len(),
                n_ctx,
            });
        }

        let mut batch = LlamaBatch::new(prompt_tokens.len(), 1);
        batch
            .add_sequence(&prompt_tokens, 0, false)
            .map_err(|e| gen_err("fill prompt batch", e))?;
        context
            .decode(&mut batch)
            .map_err(|e| gen_err("decode prompt", e))?;

        let mut sampler = build_sampler(params);
        sampler.accept_many(prompt_tokens.iter());

        let budget = params.max_tokens.min(n_ctx - prompt_tokens.len());
        let mut generated = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut pos = prompt_tokens.len() as i32;

        for _ in 0..budget {
            let token = sampler.sample(&context, -1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            let piece = self
                .model
                .token_to_piece(token, &mut decoder, true, None)
                .map_err(|e| gen_err("detokenize", e))?;
            generated.push_str(&piece);

            if let Some(cut) = find_stop(&generated, &params.stop) {
                generated.truncate(cut);
                break;
            }

            let mut step = LlamaBatch::new(1, 1);
            step.add(token, pos, &[0], true)
                .map_err(|e| gen_err("fill step batch", e))?;
            context
                .decode(&mut step)
                .map_err(|e| gen_err("decode step", e))?;
            pos += 1;
        }

        tracing::debug!(
            prompt_tokens = prompt_tokens.len(),
            output_chars = generated.len(),
            "completion finished"
        );
        Ok(generated)
    }
}

fn build_sampler(params: &GenerationParams) -> LlamaSampler {
    let mut samplers = Vec::new();
    if params.top_k > 0 {
        samplers.push(LlamaSampler::top_k(params.top_k));
    }
    if params.top_p > 0.0 && params.top_p < 1.0 {
        samplers.push(LlamaSampler::top_p(params.top_p, 1));
    }
    if params.min_p > 0.0 {
        samplers.push(LlamaSampler::min_p(params.min_p, 1));
    }

    if params.temperature <= 0.0 {
        samplers.push(LlamaSampler::greedy());
    } else {
        samplers.push(LlamaSampler::temp(params.temperature));
        samplers.push(LlamaSampler::dist(sampling_seed(params.seed)));
    }

    LlamaSampler::chain_simple(samplers)
}

fn sampling_seed(seed: Option<u32>) -> u32 {
    if let Some(seed) = seed {
        return seed;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);
    ((now ^ (now >> 32)) & 0xFFFF_FFFF) as u32
}
