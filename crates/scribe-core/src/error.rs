//! Error types for Scribe

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Scribe system
///
/// Variants name the collaborator that failed. The HTTP layer does not map
/// them one by one; it maps by the request stage the error surfaced in.
#[derive(Error, Debug)]
pub enum Error {
    /// Text generation failed or returned nothing usable
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    /// Embedding request failed or returned the wrong number of vectors
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Transcript could not be loaded or chunked
    #[error("Document indexer error: {0}")]
    DocumentIndexer(String),

    /// Missing or invalid settings, e.g. no API key
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the credential
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The provider refused the request for quota or rate reasons
    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Network error: {0}")]
    Network(String),

    /// A response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedResponse(err.to_string())
    }
}
