//! Embedding providers and the retrying generator used by the pipeline.
//!
//! Providers implement [`EmbeddingClient`] and turn a batch of texts into vectors. The
//! [`EmbeddingGenerator`] wraps a provider with the configured retry policy and dimension check.

mod generator;
mod hashing;
mod ollama;
mod openai;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use thiserror::Error;

pub use generator::{EmbeddingError, EmbeddingGenerator};
pub use hashing::HashingClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Transport-level failure talking to the provider.
    #[error("Embedding provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a payload that could not be interpreted.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider returned a vector of unexpected length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Length of the returned vector.
        actual: usize,
    },
}

impl EmbeddingClientError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::DimensionMismatch { .. })
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    let client: Box<dyn EmbeddingClient + Send + Sync> = match config.embedding_provider {
        EmbeddingProvider::Ollama => Box::new(OllamaClient::new(
            &config.ollama_url,
            &config.embedding_model,
        )?),
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::GenerationFailed(
                    "OPENAI_API_KEY is required for the openai provider".to_string(),
                )
            })?;
            Box::new(OpenAiClient::new(
                &config.openai_base_url,
                &config.embedding_model,
                api_key,
            )?)
        }
        EmbeddingProvider::Hashing => Box::new(HashingClient::new(config.embedding_dimension)),
    };
    Ok(client)
}

fn build_http_client(user_agent: &str) -> Result<reqwest::Client, EmbeddingClientError> {
    Ok(reqwest::Client::builder().user_agent(user_agent).build()?)
}
