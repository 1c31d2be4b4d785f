use super::{EmbeddingClient, EmbeddingClientError, get_embedding_client};
use crate::config::Config;
use crate::retry::{RetryError, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure returned once the generator gives up on a text.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Every attempt failed; carries the cause of the last one.
    #[error("Embedding failed after {attempts} attempt(s): {source}")]
    EmbeddingFailed {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error raised by the final attempt.
        #[source]
        source: EmbeddingClientError,
    },
}

impl From<RetryError<EmbeddingClientError>> for EmbeddingError {
    fn from(error: RetryError<EmbeddingClientError>) -> Self {
        Self::EmbeddingFailed {
            attempts: error.attempts,
            source: error.last_error,
        }
    }
}

/// Produces one vector per text through an [`EmbeddingClient`], retrying failed calls.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    client: Arc<dyn EmbeddingClient + Send + Sync>,
    retry: RetryPolicy,
    dimension: Option<usize>,
}

impl EmbeddingGenerator {
    /// Wrap `client` with `retry`. Returned vectors are not length-checked.
    pub fn new(client: Box<dyn EmbeddingClient + Send + Sync>, retry: RetryPolicy) -> Self {
        Self {
            client: Arc::from(client),
            retry,
            dimension: None,
        }
    }

    /// Reject vectors whose length differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Build the generator described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        let retry = RetryPolicy::fixed(
            config.embedding_max_retries,
            Duration::from_millis(config.embedding_retry_delay_ms),
        );
        let client = get_embedding_client(config)?;
        Ok(Self::new(client, retry).with_dimension(config.embedding_dimension))
    }

    /// Embed a single text.
    ///
    /// Each attempt is an independent call to the provider. A dimension mismatch is not retried
    /// since the provider would answer the same way again.
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self
            .retry
            .run(|| self.attempt(text), EmbeddingClientError::is_transient)
            .await?;
        Ok(vector)
    }

    async fn attempt(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut vectors = self.client.generate_embeddings(vec![text.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::InvalidResponse("provider returned no embedding".to_string())
        })?;

        if let Some(expected) = self.dimension
            && vector.len() != expected
        {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

impl std::fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("retry", &self.retry)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: Arc<AtomicU32>,
        failures: u32,
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingClient for FlakyClient {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(EmbeddingClientError::GenerationFailed(format!(
                    "transient failure {call}"
                )));
            }
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    fn generator(failures: u32, vector: Vec<f32>) -> (EmbeddingGenerator, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let client = FlakyClient {
            calls: Arc::clone(&calls),
            failures,
            vector,
        };
        let generator =
            EmbeddingGenerator::new(Box::new(client), RetryPolicy::fixed(3, Duration::ZERO));
        (generator, calls)
    }

    #[tokio::test]
    async fn recovers_after_two_failures_without_fourth_attempt() {
        let (generator, calls) = generator(2, vec![0.25, 0.75]);
        let vector = generator.generate("chunk").await.expect("vector");
        assert_eq!(vector, vec![0.25, 0.75]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_carry_last_cause() {
        let (generator, calls) = generator(10, vec![1.0]);
        let error = generator.generate("chunk").await.expect_err("exhausted");

        let EmbeddingError::EmbeddingFailed { attempts, source } = error;
        assert_eq!(attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(source.to_string().contains("transient failure 4"));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_not_retried() {
        let (generator, calls) = generator(0, vec![1.0, 2.0, 3.0]);
        let generator = generator.with_dimension(2);
        let error = generator.generate("chunk").await.expect_err("mismatch");

        let EmbeddingError::EmbeddingFailed { attempts, source } = error;
        assert_eq!(attempts, 1);
        assert!(matches!(
            source,
            EmbeddingClientError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_configured_delay_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = FlakyClient {
            calls: Arc::clone(&calls),
            failures: 1,
            vector: vec![0.5],
        };
        let generator = EmbeddingGenerator::new(
            Box::new(client),
            RetryPolicy::fixed(3, Duration::from_millis(1000)),
        );
        let started = tokio::time::Instant::now();

        generator.generate("chunk").await.expect("vector");
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }
}
