//! In-memory vector store

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use scribe_core::{Embedder, Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

/// Embedding batches in flight at once while storing
const EMBED_CONCURRENCY: usize = 4;

/// Local in-memory vector store ranked by cosine similarity
///
/// Documents keep their insertion order, so equal scores rank the earlier
/// chunk first.
pub struct LocalVectorStore<E: Embedder> {
    embedder: Arc<E>,
    documents: RwLock<Vec<VectorDocument>>,
    batch_size: usize,
}

impl<E: Embedder> LocalVectorStore<E> {
    /// Create an empty store that embeds through `embedder`
    pub fn new(embedder: Arc<E>) -> Self {
        Self {
            embedder,
            documents: RwLock::new(Vec::new()),
            batch_size: 100,
        }
    }

    /// Set how many chunks go into one embedding request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// Simple cosine similarity calculation
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl<E: Embedder + 'static> VectorStore for LocalVectorStore<E> {
    async fn store_batch(&self, mut documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let missing: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let texts: Vec<String> =
                missing.iter().map(|&i| documents[i].content.clone()).collect();
            let batches: Vec<Vec<String>> = texts
                .chunks(self.batch_size)
                .map(<[String]>::to_vec)
                .collect();
            let embedder = &self.embedder;

            let vectors: Vec<Vec<f32>> = stream::iter(batches)
                .map(|batch| async move { embedder.embed_documents(&batch).await })
                .buffered(EMBED_CONCURRENCY)
                .try_concat()
                .await?;

            if vectors.len() != missing.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    missing.len()
                )));
            }

            for (i, vector) in missing.into_iter().zip(vectors) {
                documents[i].embedding = Some(vector);
            }
        }

        let ids: Vec<String> = documents.iter().map(|doc| doc.id.clone()).collect();
        let mut docs = self.documents.write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.extend(documents);

        Ok(ids)
    }

    async fn search(&self, query: &str, config: &SearchConfig) -> Result<SearchResult> {
        let vector = self.embedder.embed_query(query).await?;
        self.search_by_vector(&vector, config).await
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        config: &SearchConfig,
    ) -> Result<SearchResult> {
        let docs = self.documents.read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<VectorDocument> = docs
            .iter()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = Self::cosine_similarity(vector, embedding);
                let mut doc_with_score = doc.clone();
                doc_with_score.score = Some(score);
                Some(doc_with_score)
            })
            .filter(|doc| match config.score_threshold {
                Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
                None => true,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
        });

        results.truncate(config.top_k);

        let total = results.len();

        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn count(&self) -> Result<usize> {
        let docs = self.documents.read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.len())
    }
}
