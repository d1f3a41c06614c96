//! A real, HTTP-backed embedding provider, grounded in the gateway's own
//! provider-calling conventions. Only compiled in behind the
//! `http-embeddings` feature; without it, callers rely on the deterministic
//! pseudo-embedding instead.

#![cfg(feature = "http-embeddings")]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::embedding::{EmbeddingError, EmbeddingProvider};

/// Calls an OpenAI-compatible `/embeddings` endpoint. This is deliberately
/// narrow: one model, one endpoint, no retry/circuit-breaker machinery,
/// since those belong to the gateway's provider layer and are out of scope
/// for the cache core.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if cancel.is_cancelled() {
            return Err(EmbeddingError::Cancelled);
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
            result = send => result.map_err(|e| EmbeddingError::Provider(e.to_string()))?,
        };

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Provider("empty embedding response".to_string()))
    }
}
