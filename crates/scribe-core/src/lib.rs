//! Core traits and types for Scribe
//!
//! This crate defines the capability-facing interfaces shared by the rest of the
//! workspace: LLM providers, embedders, vector stores, document indexers and the
//! conversational answer generator the HTTP layer drives.

pub mod document_indexer;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod rag;
pub mod types;
pub mod vector_store;

pub use document_indexer::{Document, DocumentIndexer, IndexingConfig, IndexingResult};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider};
pub use rag::{AnswerGenerator, ChainConfig, PipelineFactory};
pub use types::*;
pub use vector_store::{SearchConfig, SearchResult, VectorDocument, VectorStore};
