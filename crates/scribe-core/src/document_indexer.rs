//! Document indexer trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A document to be indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Result of an indexing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub chunks_created: usize,
}

/// Configuration for document indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            batch_size: 100,
        }
    }
}

/// Trait for document indexers
///
/// Indexing is all-or-nothing: a failure on any chunk fails the whole call.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    /// Chunk and store a single document
    async fn index_document(&self, document: Document) -> Result<IndexingResult>;

    /// Load a UTF-8 text file and index it as one document
    async fn index_from_file(&self, path: &str) -> Result<IndexingResult>;
}
