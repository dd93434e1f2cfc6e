//! Lazy, single-flight construction of the answer pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scribe_core::{
    AnswerGenerator, ChainConfig, DocumentIndexer, Error, IndexingConfig, PipelineFactory, Result,
};
use scribe_gemini::{GeminiClient, GeminiConfig};
use scribe_rag::{ConversationalRetrievalChain, LocalVectorStore, TranscriptIndexer};
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Holds the answer generator once it has been built.
///
/// Concurrent callers that arrive before the first successful build share a
/// single in-flight attempt. A failed attempt leaves the cell empty, so the
/// next request tries again from scratch.
pub struct Pipeline {
    factory: Arc<dyn PipelineFactory>,
    generator: OnceCell<Arc<dyn AnswerGenerator>>,
    attempts: AtomicUsize,
}

impl Pipeline {
    pub fn new(factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            factory,
            generator: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Return the generator, building it first if no build has succeeded yet.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn AnswerGenerator>> {
        let generator = self.generator.get_or_try_init(|| self.initialize()).await?;
        Ok(Arc::clone(generator))
    }

    pub fn is_ready(&self) -> bool {
        self.generator.initialized()
    }

    /// Number of build attempts started, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<Arc<dyn AnswerGenerator>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        info!(attempt, "initializing RAG pipeline");

        match self.factory.build().await {
            Ok(generator) => {
                info!(
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "RAG pipeline ready"
                );
                Ok(generator)
            }
            Err(e) => {
                error!(attempt, error = %e, "RAG pipeline initialization failed");
                Err(e)
            }
        }
    }
}

/// Builds the Gemini-backed pipeline from a transcript on disk.
///
/// `gemini` is `None` when no API key was available at startup; the build
/// then fails with a configuration error instead of the process exiting.
pub struct GeminiPipelineFactory {
    gemini: Option<GeminiConfig>,
    transcript_path: String,
    indexing: IndexingConfig,
    chain: ChainConfig,
}

impl GeminiPipelineFactory {
    pub fn new(gemini: Option<GeminiConfig>, transcript_path: impl Into<String>) -> Self {
        Self {
            gemini,
            transcript_path: transcript_path.into(),
            indexing: IndexingConfig::default(),
            chain: ChainConfig::default(),
        }
    }

    /// Chain settings with the LLM deadline taken from the Gemini timeout
    fn chain_config(&self, gemini: &GeminiConfig) -> ChainConfig {
        ChainConfig {
            timeout: Duration::from_secs(gemini.timeout_secs),
            ..self.chain.clone()
        }
    }
}

#[async_trait]
impl PipelineFactory for GeminiPipelineFactory {
    async fn build(&self) -> Result<Arc<dyn AnswerGenerator>> {
        let config = self.gemini.clone().ok_or_else(|| {
            Error::Configuration("GOOGLE_API_KEY is not set".to_string())
        })?;

        let chain_config = self.chain_config(&config);
        let client = Arc::new(GeminiClient::new(config)?);
        let store = Arc::new(
            LocalVectorStore::new(Arc::clone(&client)).with_batch_size(self.indexing.batch_size),
        );

        let indexer = TranscriptIndexer::with_config(Arc::clone(&store), self.indexing.clone())?;
        let indexed = indexer.index_from_file(&self.transcript_path).await?;
        info!(
            path = %self.transcript_path,
            chunks = indexed.chunks_created,
            "transcript indexed"
        );

        let chain = ConversationalRetrievalChain::with_config(client, store, chain_config);
        Ok(Arc::new(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::Turn;
    use std::io::Write;

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn answer(&self, question: &str, _history: &[Turn]) -> Result<String> {
            Ok(question.to_string())
        }
    }

    /// Fails the first `failures` builds, then succeeds
    struct FlakyFactory {
        builds: AtomicUsize,
        failures: usize,
        delay: Duration,
    }

    impl FlakyFactory {
        fn new(failures: usize) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                failures,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl PipelineFactory for FlakyFactory {
        async fn build(&self) -> Result<Arc<dyn AnswerGenerator>> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                return Err(Error::Network("transcript service unreachable".to_string()));
            }
            Ok(Arc::new(EchoGenerator))
        }
    }

    #[tokio::test]
    async fn test_ensure_ready_builds_once() {
        let factory = Arc::new(FlakyFactory::new(0));
        let pipeline = Pipeline::new(factory.clone());

        assert!(!pipeline.is_ready());
        for _ in 0..3 {
            pipeline.ensure_ready().await.unwrap();
        }

        assert!(pipeline.is_ready());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let factory = Arc::new(FlakyFactory::new(1));
        let pipeline = Pipeline::new(factory.clone());

        let first = pipeline.ensure_ready().await;
        assert!(matches!(first, Err(Error::Network(_))));
        assert!(!pipeline.is_ready());

        let generator = pipeline.ensure_ready().await.unwrap();
        assert_eq!(generator.answer("hi", &[]).await.unwrap(), "hi");
        assert_eq!(pipeline.attempts(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_build() {
        let factory = Arc::new(FlakyFactory {
            delay: Duration::from_millis(50),
            ..FlakyFactory::new(0)
        });
        let pipeline = Arc::new(Pipeline::new(factory.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let pipeline = pipeline.clone();
            tasks.spawn(async move { pipeline.ensure_ready().await.is_ok() });
        }
        while let Some(ok) = tasks.join_next().await {
            assert!(ok.unwrap());
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gemini_factory_without_key_is_a_configuration_error() {
        let factory = GeminiPipelineFactory::new(None, "./transcript.txt");
        let result = factory.build().await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_gemini_timeout_becomes_chain_deadline() {
        let gemini = GeminiConfig {
            timeout_secs: 240,
            ..GeminiConfig::new("test-key")
        };
        let factory = GeminiPipelineFactory::new(Some(gemini.clone()), "./transcript.txt");

        let chain = factory.chain_config(&gemini);
        assert_eq!(chain.timeout, Duration::from_secs(240));
        assert_eq!(chain.top_k, 3);
        assert_eq!(chain.temperature, 0.3);
    }

    #[tokio::test]
    async fn test_gemini_factory_reports_missing_transcript() {
        let factory = GeminiPipelineFactory::new(
            Some(GeminiConfig::new("test-key")),
            "/nonexistent/scribe/transcript.txt",
        );
        let result = factory.build().await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_gemini_factory_rejects_blank_transcript() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();

        let factory = GeminiPipelineFactory::new(
            Some(GeminiConfig::new("test-key")),
            file.path().to_string_lossy().to_string(),
        );
        let result = factory.build().await;
        assert!(matches!(result, Err(Error::DocumentIndexer(_))));
    }
}
