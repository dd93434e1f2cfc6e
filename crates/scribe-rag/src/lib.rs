//! Retrieval-augmented generation over a single transcript
//!
//! This crate provides the text splitter, the transcript indexer, an in-memory
//! vector store and the conversational retrieval chain that answers questions.

mod document_indexer;
mod engine;
mod splitter;
mod vector_store;


pub use document_indexer::TranscriptIndexer;
pub use engine::ConversationalRetrievalChain;
pub use splitter::RecursiveTextSplitter;
pub use vector_store::LocalVectorStore;

// Re-export core types for convenience
pub use scribe_core::{
    AnswerGenerator, ChainConfig, Document, DocumentIndexer, Embedder, Error, IndexingConfig,
    IndexingResult, Result, SearchConfig, SearchResult, Turn, VectorDocument, VectorStore,
};
