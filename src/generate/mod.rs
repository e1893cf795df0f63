//! Answer generation.
//!
//! [`build_prompt`] frames the retrieved context and the question;
//! a [`TextGenerator`] backend continues the prompt; [`Generator`] ties the
//! two together and cuts the continuation at the first stop sequence so the
//! model cannot run on into a made-up follow-up question.
//!
//! The production backend is [`LlamaGenerator`] (feature `llama`), a GGUF
//! model run in-process through llama.cpp.

#[cfg(feature = "llama")]
mod llama;

#[cfg(feature = "llama")]
pub use llama::LlamaGenerator;

use crate::config::GenerationConfig;
use crate::error::Result;

/// Sampling and stopping parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub stop: Vec<String>,
    /// `<= 0` selects greedy decoding.
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub min_p: f32,
    pub seed: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            min_p: config.min_p,
            seed: config.seed,
        }
    }
}

/// A language model that continues a prompt.
pub trait TextGenerator {
    /// Returns a short identifier for logs (e.g. the model file name).
    fn model_name(&self) -> &str;

    /// Continue `prompt` and return only the generated text.
    ///
    /// Implementations should stop as soon as the output contains one of
    /// `params.stop`; [`Generator`] truncates again regardless.
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Load the language model described by `config`.
///
/// Slow: reads the full weight file. Call once per session.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    #[cfg(feature = "llama")]
    {
        Ok(Box::new(LlamaGenerator::load(config)?))
    }
    #[cfg(not(feature = "llama"))]
    {
        Err(crate::error::Error::InvalidConfig(format!(
            "cannot load {}: built without --features llama",
            config.model_path.display()
        )))
    }
}

/// Frame the context and question the way the model is prompted.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following context to answer the question:\n\n{}\n\nQuestion: {}\nAnswer:",
        context, question
    )
}

/// Byte offset of the earliest stop sequence in `text`, if any.
pub fn find_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

/// `text` up to (not including) the earliest stop sequence.
pub fn truncate_at_stop<'t>(text: &'t str, stops: &[String]) -> &'t str {
    match find_stop(text, stops) {
        Some(cut) => &text[..cut],
        None => text,
    }
}

/// Turns retrieved context plus a question into an answer.
pub struct Generator<'a> {
    backend: &'a dyn TextGenerator,
    params: GenerationParams,
}

impl<'a> Generator<'a> {
    pub fn new(backend: &'a dyn TextGenerator, params: GenerationParams) -> Self {
        Self { backend, params }
    }

    /// Build the prompt, run the model and return the trimmed answer.
    pub fn answer(&self, context: &str, question: &str) -> Result<String> {
        let prompt = build_prompt(context, question);
        tracing::debug!(
            model = self.backend.model_name(),
            prompt_chars = prompt.len(),
            "generating answer"
        );
        let raw = self.backend.complete(&prompt, &self.params)?;
        Ok(truncate_at_stop(&raw, &self.params.stop).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        reply: String,
        prompts: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn prompt_layout() {
        let prompt = build_prompt("ctx line one\n\nctx line two", "Who?");
        assert_eq!(
            prompt,
            "Use the following context to answer the question:\n\nctx line one\n\nctx line two\n\nQuestion: Who?\nAnswer:"
        );
    }

    #[test]
    fn default_params() {
        let p = GenerationParams::default();
        assert_eq!(p.max_tokens, 256);
        assert_eq!(p.stop, vec!["\n".to_string(), "Question:".to_string()]);
    }

    #[test]
    fn earliest_stop_wins() {
        let stops = vec!["\n".to_string(), "Question:".to_string()];
        assert_eq!(find_stop("abc Question: x\ny", &stops), Some(4));
        assert_eq!(find_stop("abc\nQuestion:", &stops), Some(3));
        assert_eq!(find_stop("no stop here", &stops), None);
    }

    #[test]
    fn empty_stop_sequences_ignored() {
        let stops = vec![String::new()];
        assert_eq!(truncate_at_stop("keep all", &stops), "keep all");
    }

    #[test]
    fn answer_is_cut_and_trimmed() {
        let backend = Scripted::new("  The cat sat.  \nQuestion: What next?");
        let generator = Generator::new(&backend, GenerationParams::default());
        let answer = generator.answer("A cat sat.", "Which animal sat?").unwrap();
        assert_eq!(answer, "The cat sat.");
    }

    #[test]
    fn backend_receives_full_prompt() {
        let backend = Scripted::new("cat");
        let generator = Generator::new(&backend, GenerationParams::default());
        generator.answer("CONTEXT", "QUESTION").unwrap();
        let prompts = backend.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("CONTEXT"));
        assert!(prompts[0].ends_with("Question: QUESTION\nAnswer:"));
    }
}
