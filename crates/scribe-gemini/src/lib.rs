//! Google Gemini integration for Scribe
//!
//! This crate provides the Gemini implementation of the `LLMProvider` and
//! `Embedder` traits on top of the Generative Language REST API.

mod client;
mod config;


pub use client::{GeminiClient, ModelInfo};
pub use config::GeminiConfig;

// Re-export core types for convenience
pub use scribe_core::{Embedder, Error, GenerationConfig, GenerationResult, LLMProvider, Result};
