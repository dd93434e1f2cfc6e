//! Transcript ingestion: load, chunk and store

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use scribe_core::{
    Document, DocumentIndexer, Error, IndexingConfig, IndexingResult, Result, VectorDocument,
    VectorStore,
};

use crate::splitter::RecursiveTextSplitter;

static LINE_ENDINGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").unwrap());

/// Indexes transcript text into any `VectorStore`
pub struct TranscriptIndexer<V: VectorStore> {
    vector_store: Arc<V>,
    splitter: RecursiveTextSplitter,
    config: IndexingConfig,
}

impl<V: VectorStore> TranscriptIndexer<V> {
    /// Create an indexer with the default 1000/100 chunking
    pub fn new(vector_store: Arc<V>) -> Self {
        Self {
            vector_store,
            splitter: RecursiveTextSplitter::default(),
            config: IndexingConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(vector_store: Arc<V>, config: IndexingConfig) -> Result<Self> {
        Ok(Self {
            vector_store,
            splitter: RecursiveTextSplitter::from_config(&config)?,
            config,
        })
    }

    /// Chunk a document into vector documents, without embeddings
    fn chunk_document(&self, document: &Document) -> Vec<VectorDocument> {
        let chunks = self.splitter.split_text(&document.content);
        let total_chunks = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let mut metadata = document.metadata.clone();
                if !metadata.is_object() {
                    metadata = json!({});
                }
                metadata["chunk_index"] = json!(i);
                metadata["total_chunks"] = json!(total_chunks);

                VectorDocument {
                    id: format!("{}_{}", document.id, i),
                    content,
                    embedding: None,
                    metadata,
                    score: None,
                }
            })
            .collect()
    }
}

/// Normalize Windows and old Mac line endings so paragraph splitting works
fn normalize_line_endings(text: &str) -> String {
    LINE_ENDINGS.replace_all(text, "\n").into_owned()
}

#[async_trait]
impl<V: VectorStore + 'static> DocumentIndexer for TranscriptIndexer<V> {
    async fn index_document(&self, document: Document) -> Result<IndexingResult> {
        let chunks = self.chunk_document(&document);
        if chunks.is_empty() {
            return Err(Error::DocumentIndexer(format!(
                "document {} produced no chunks",
                document.id
            )));
        }

        let chunks_created = chunks.len();
        self.vector_store.store_batch(chunks).await?;

        tracing::info!(
            document = %document.id,
            chunks = chunks_created,
            chunk_size = self.config.chunk_size,
            chunk_overlap = self.config.chunk_overlap,
            "indexed document"
        );

        Ok(IndexingResult {
            documents_indexed: 1,
            chunks_created,
        })
    }

    async fn index_from_file(&self, path: &str) -> Result<IndexingResult> {
        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8(bytes).map_err(|_| {
            Error::DocumentIndexer(format!("transcript {} is not valid UTF-8", path))
        })?;

        if content.trim().is_empty() {
            return Err(Error::DocumentIndexer(format!("transcript {} is empty", path)));
        }

        let id = Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("transcript")
            .to_string();

        let document = Document {
            id,
            content: normalize_line_endings(&content),
            metadata: json!({
                "source": path,
            }),
        };

        self.index_document(document).await
    }
}
