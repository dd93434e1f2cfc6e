//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Trait for text embedding services
///
/// The same model must be used for documents and queries so that their
/// vectors are comparable. Providers may still tag the two differently.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of documents, returning one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding model ID
    fn embedding_model_id(&self) -> &str;
}
