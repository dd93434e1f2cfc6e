//! Conversational answer generation traits and types

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, Turn};

/// Tuning for the conversational retrieval chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of transcript chunks retrieved per question
    pub top_k: usize,
    /// Sampling temperature for both the condense and answer calls
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for each LLM call made by the chain
    pub timeout: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            temperature: 0.3,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Produces an answer for a question given the prior turns of its session.
///
/// Errors from retrieval or generation are returned as-is, without retrying.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, question: &str, history: &[Turn]) -> Result<String>;
}

/// Builds a ready-to-use answer generator.
///
/// A build runs the whole ingestion sequence (load, chunk, embed, index). A
/// failed build must leave nothing behind for the next attempt to reuse.
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(&self) -> Result<Arc<dyn AnswerGenerator>>;
}
