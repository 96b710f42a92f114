//! Model provider implementations
//!
//! Concrete [`ragkit_core::EmbeddingProvider`] and
//! [`ragkit_core::GenerationProvider`] backends:
//!
//! - [`OpenAiCompatClient`]: any OpenAI-compatible HTTP endpoint (vLLM,
//!   llama.cpp server, TGI in openai mode, the hosted APIs)
//! - [`HashingEmbedder`]: deterministic local embeddings for tests and for
//!   running without a model server
//! - [`testing`]: canned generation providers for unit tests

pub mod hashing;
pub mod openai_compat;
pub mod testing;

pub use hashing::HashingEmbedder;
pub use openai_compat::{OpenAiCompatClient, OpenAiCompatConfig};

use thiserror::Error;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(0)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<ProviderError> for ragkit_core::Error {
    fn from(err: ProviderError) -> Self {
        ragkit_core::Error::Provider(err.to_string())
    }
}
