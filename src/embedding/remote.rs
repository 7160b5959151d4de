//! Remote HTTP embedding provider.
//!
//! Network-bound; retries transient failures with exponential backoff and
//! never retries on credential/schema errors. Every request is bounded
//! by a per-request timeout.

use super::EmbeddingProvider;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the remote embedding provider.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: String,
    pub dim: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Base delay for exponential backoff: attempt `k` waits `base * 2^k`.
    pub backoff_base: Duration,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            dim: super::local::DEFAULT_DIM,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
}

/// HTTP-backed embedding provider, talking to whatever endpoint is
/// configured via `EMBEDDING_ENDPOINT` / `EMBEDDING_API_KEY`.
pub struct RemoteProvider {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteProvider {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EngineError::Http)?;
        Ok(Self { client, config })
    }

    /// Pad with zeros or truncate so every vector this provider returns has
    /// exactly `self.config.dim` components, regardless of what the
    /// backend actually sent — every provider pads/truncates to the
    /// configured dimension.
    fn normalize_dim(&self, mut vector: Vec<f32>) -> Vec<f32> {
        vector.resize(self.config.dim, 0.0);
        vector
    }

    async fn request_once(&self, text: &str) -> std::result::Result<Vec<f32>, RemoteError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    RemoteError::Transient(e.to_string())
                } else {
                    RemoteError::Terminal(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(RemoteError::Transient(format!("http {status}")));
        }
        if status.is_client_error() {
            return Err(RemoteError::Terminal(format!("http {status}")));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Terminal(format!("malformed response body: {e}")))?;
        Ok(body.vector)
    }
}

enum RemoteError {
    Transient(String),
    Terminal(String),
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0u32;
        loop {
            match self.request_once(text).await {
                Ok(vector) => return Ok(self.normalize_dim(vector)),
                Err(RemoteError::Terminal(reason)) => {
                    return Err(EngineError::EmbeddingTerminal(reason));
                }
                Err(RemoteError::Transient(reason)) => {
                    if attempt >= self.config.max_retries {
                        return Err(EngineError::EmbeddingTransient(format!(
                            "exhausted {attempt} retries: {reason}"
                        )));
                    }
                    let delay = self.config.backoff_base * 2u32.pow(attempt);
                    warn!(attempt, %reason, delay_ms = delay.as_millis() as u64, "retrying embedding request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "remote-http"
    }

    async fn validate_credential(&self) -> Result<bool> {
        match self.embed("validate_credential probe").await {
            Ok(_) => Ok(true),
            Err(EngineError::EmbeddingTerminal(reason)) => {
                debug!(%reason, "credential validation failed");
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dim_pads_short_vectors() {
        let provider = RemoteProvider::new(RemoteConfig {
            dim: 5,
            ..RemoteConfig::new("http://example.invalid", "key")
        })
        .unwrap();
        let padded = provider.normalize_dim(vec![1.0, 2.0]);
        assert_eq!(padded, vec![1.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalize_dim_truncates_long_vectors() {
        let provider = RemoteProvider::new(RemoteConfig {
            dim: 2,
            ..RemoteConfig::new("http://example.invalid", "key")
        })
        .unwrap();
        let truncated = provider.normalize_dim(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(truncated, vec![1.0, 2.0]);
    }
}
