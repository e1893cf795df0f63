//! Pipeline orchestration for one loaded document.
//!
//! A [`Session`] owns the embedding model and (optionally) the language
//! model, both loaded once, plus the state built from the current document:
//! its chunks and their [`FlatL2Index`].
//!
//! Loading runs extract → chunk → embed → index. The new state is built in
//! full before it replaces the old one, so a failed load leaves the
//! previously loaded document answerable and never installs a partial index.

use std::path::{Path, PathBuf};

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::{embed_texts, Embedder};
use crate::error::{Error, Result};
use crate::extract::{join_pages, load_document, sha256_hex};
use crate::generate::{GenerationParams, Generator, TextGenerator};
use crate::index::FlatL2Index;
use crate::models::{Answer, Chunk, Ready, Retrieval};
use crate::retrieve::Retriever;

struct LoadedDocument {
    ready: Ready,
    chunks: Vec<Chunk>,
    index: FlatL2Index,
}

pub struct Session {
    config: Config,
    embedder: Box<dyn Embedder>,
    generator: Option<Box<dyn TextGenerator>>,
    document: Option<LoadedDocument>,
}

impl Session {
    /// A session that can retrieve but not answer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(config: Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            generator: None,
            document: None,
        })
    }

    /// Attach the language model used by [`Session::ask`].
    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.document.is_some()
    }

    /// Summary of the loaded document, if any.
    pub fn ready(&self) -> Option<&Ready> {
        self.document.as_ref().map(|d| &d.ready)
    }

    /// Chunks of the loaded document, in index order.
    pub fn chunks(&self) -> &[Chunk] {
        self.document
            .as_ref()
            .map(|d| d.chunks.as_slice())
            .unwrap_or_default()
    }

    /// Extract, chunk, embed and index the document at `path`.
    ///
    /// On error the previously loaded document (if any) stays in place.
    pub fn load(&mut self, path: &Path) -> Result<Ready> {
        let doc = load_document(path)?;
        let loaded = self.build(doc.source, doc.digest, doc.page_count, &doc.text)?;
        Ok(self.install(loaded))
    }

    /// Like [`Session::load`] for text already in memory (one page).
    pub fn load_text(&mut self, name: &str, text: &str) -> Result<Ready> {
        let normalized = join_pages(&[text.to_string()]);
        if normalized.is_empty() {
            return Err(Error::EmptyExtraction {
                source_name: name.to_string(),
            });
        }
        let loaded = self.build(
            PathBuf::from(name),
            sha256_hex(text.as_bytes()),
            1,
            &normalized,
        )?;
        Ok(self.install(loaded))
    }

    fn build(
        &self,
        source: PathBuf,
        digest: String,
        pages: usize,
        text: &str,
    ) -> Result<LoadedDocument> {
        let chunks = split_text(text, &self.config.chunking)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_texts(self.embedder.as_ref(), &texts)?;
        let index = FlatL2Index::build(vectors)?;

        let ready = Ready {
            source,
            digest,
            pages,
            chunks: chunks.len(),
            dims: index.dims(),
        };
        Ok(LoadedDocument {
            ready,
            chunks,
            index,
        })
    }

    fn install(&mut self, loaded: LoadedDocument) -> Ready {
        let ready = loaded.ready.clone();
        tracing::info!(
            source = %ready.source.display(),
            chunks = ready.chunks,
            dims = ready.dims,
            model = self.embedder.model_name(),
            "document ready"
        );
        self.document = Some(loaded);
        ready
    }

    /// Retrieve context for `question` using the configured `top_k`.
    pub fn retrieve(&self, question: &str) -> Result<Retrieval> {
        self.retrieve_k(question, self.config.retrieval.top_k)
    }

    /// Retrieve the `k` nearest chunks for `question`.
    pub fn retrieve_k(&self, question: &str, k: usize) -> Result<Retrieval> {
        let doc = self.document.as_ref().ok_or(Error::NotReady)?;
        Retriever::new(self.embedder.as_ref(), &doc.index, &doc.chunks, k).retrieve(question)
    }

    /// Retrieve context and generate an answer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if no language model is attached (checked
    /// before the question is embedded); [`Error::NotReady`] before the
    /// first successful load.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        let backend = self.generator.as_deref().ok_or_else(|| {
            Error::InvalidConfig("no language model loaded; cannot answer".to_string())
        })?;
        let retrieval = self.retrieve(question)?;
        let generator = Generator::new(backend, GenerationParams::from(&self.config.generation));
        let text = generator.answer(&retrieval.context, question)?;
        Ok(Answer { text, retrieval })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::embedding::HashingEmbedder;

    struct Echo;

    impl TextGenerator for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            // Return the first context line after the header.
            Ok(prompt.lines().nth(2).unwrap_or("").to_string())
        }
    }

    fn session() -> Session {
        let mut config = Config::default();
        config.chunking = ChunkingConfig {
            chunk_size: 12,
            chunk_overlap: 0,
            separator: "\n".to_string(),
        };
        Session::new(config, Box::new(HashingEmbedder::new(1024).unwrap()))
            .unwrap()
            .with_generator(Box::new(Echo))
    }

    #[test]
    fn ask_before_load_is_not_ready() {
        let s = session();
        assert!(!s.is_ready());
        assert!(matches!(s.ask("anything"), Err(Error::NotReady)));
        assert!(matches!(s.retrieve("anything"), Err(Error::NotReady)));
    }

    #[test]
    fn load_text_then_ask() {
        let mut s = session();
        let ready = s
            .load_text("animals.txt", "A cat sat. \n A dog ran. \n A bird flew.")
            .unwrap();
        assert_eq!(ready.chunks, 3);
        assert_eq!(ready.dims, 1024);
        let answer = s.ask("Which animal sat?").unwrap();
        assert_eq!(answer.text, "A cat sat.");
        assert_eq!(answer.retrieval.hits[0].text, "A cat sat.");
    }

    #[test]
    fn failed_load_keeps_previous_document() {
        let mut s = session();
        s.load_text("first.txt", "alpha\nbeta").unwrap();
        let err = s.load_text("blank.txt", "  \n\n ").unwrap_err();
        assert!(matches!(err, Error::EmptyExtraction { .. }));
        assert_eq!(s.ready().unwrap().source, PathBuf::from("first.txt"));
        assert_eq!(s.chunks().len(), 1);
    }

    #[test]
    fn missing_document_keeps_previous_document() {
        let mut s = session();
        s.load_text("first.txt", "alpha").unwrap();
        let err = s.load(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, Error::MissingResource { .. }));
        assert!(s.is_ready());
    }

    #[test]
    fn reload_replaces_document() {
        let mut s = session();
        s.load_text("one.txt", "alpha").unwrap();
        s.load_text("two.txt", "gamma\ndelta\nepsilon").unwrap();
        assert_eq!(s.chunks().len(), 2);
        assert_eq!(s.retrieve("epsilon").unwrap().hits[0].text, "epsilon");
    }

    #[test]
    fn ask_without_generator_is_config_error() {
        let mut s = Session::new(
            Config::default(),
            Box::new(HashingEmbedder::new(64).unwrap()),
        )
        .unwrap();
        s.load_text("doc.txt", "some text").unwrap();
        assert!(s.retrieve("text").is_ok());
        assert!(matches!(s.ask("text"), Err(Error::InvalidConfig(_))));
    }

    /// Counts `embed` calls made after the document was indexed.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.embed(texts)
        }
    }

    #[test]
    fn ask_without_generator_skips_retrieval() {
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let embedder = CountingEmbedder {
            inner: HashingEmbedder::new(64).unwrap(),
            calls: std::rc::Rc::clone(&calls),
        };
        let mut s = Session::new(Config::default(), Box::new(embedder)).unwrap();
        assert!(matches!(s.ask("early"), Err(Error::InvalidConfig(_))));

        s.load_text("doc.txt", "some text").unwrap();
        let after_load = calls.get();
        assert!(matches!(s.ask("text"), Err(Error::InvalidConfig(_))));
        assert_eq!(calls.get(), after_load);
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(Session::new(config, Box::new(HashingEmbedder::new(8).unwrap())).is_err());
    }
}
