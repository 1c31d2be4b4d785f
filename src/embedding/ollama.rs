use super::{EmbeddingClient, EmbeddingClientError, build_http_client};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Embedding client for a local Ollama runtime (`POST /api/embed`).
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Construct a client targeting `base_url` with the given model.
    pub fn new(base_url: &str, model: &str) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            http: build_http_client("rustydocs/embedding")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let expected = texts.len();
        let payload = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self.http.post(self.endpoint()).json(&payload).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama endpoint {} returned 404; is model '{}' pulled?",
                self.endpoint(),
                self.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if body.embeddings.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} embeddings, Ollama returned {}",
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn posts_model_and_inputs() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(&server.base_url(), "nomic-embed-text").expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({
                        "model": "nomic-embed-text",
                        "input": ["Hello world."]
                    }));
                then.status(200).json_body(json!({
                    "model": "nomic-embed-text",
                    "embeddings": [[0.1, 0.2, 0.3]]
                }));
            })
            .await;

        let vectors = client
            .generate_embeddings(vec!["Hello world.".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(&server.base_url(), "nomic-embed-text").expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .generate_embeddings(vec!["text".into()])
            .await
            .expect_err("error response");

        assert!(matches!(
            error,
            EmbeddingClientError::GenerationFailed(ref message) if message.contains("500")
        ));
    }

    #[tokio::test]
    async fn short_response_is_invalid() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(&server.base_url(), "m").expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [] }));
            })
            .await;

        let error = client
            .generate_embeddings(vec!["text".into()])
            .await
            .expect_err("missing embeddings");
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }
}
