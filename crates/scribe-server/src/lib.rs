//! Scribe HTTP server - axum router, chat handler, sessions and lazy pipeline.
//!
//! The pipeline (transcript ingestion plus the answer generator) is built on
//! the first chat request and shared by every request after that.

pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use pipeline::{GeminiPipelineFactory, Pipeline};
pub use routes::{create_router, start_server};
pub use session::SessionStore;
pub use state::AppState;
