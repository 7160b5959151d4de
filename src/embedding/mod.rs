//! Embedding Provider (component C2): a pluggable capability for turning
//! text into vectors, plus the two implementations this engine ships —
//! a deterministic local fallback and a remote HTTP provider.

pub mod local;
pub mod remote;

use crate::error::Result;
use async_trait::async_trait;

pub use local::LocalProvider;
pub use remote::{RemoteConfig, RemoteProvider};

/// Capability set an embedding backend must implement.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default implementation calls `embed`
    /// once per item; providers whose wire protocol supports true
    /// batching should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Human-readable provider name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Validate that the configured credential (if any) is usable.
    /// Providers with no credential concept (e.g. the local fallback)
    /// always return `Ok(true)`.
    async fn validate_credential(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Build the configured provider from `Config`: a remote provider when an
/// API key is present, otherwise the local fallback with a single
/// warning — a missing credential transparently downgrades to the local
/// fallback rather than failing startup.
pub fn provider_from_config(config: &crate::config::Config) -> Box<dyn EmbeddingProvider> {
    match (&config.embedding_api_key, &config.embedding_endpoint) {
        (Some(key), Some(endpoint)) if !key.is_empty() => {
            let remote_config = RemoteConfig {
                endpoint: endpoint.clone(),
                api_key: key.clone(),
                dim: local::DEFAULT_DIM,
                timeout: config.embedding_timeout,
                max_retries: config.embedding_max_retries,
                backoff_base: std::time::Duration::from_millis(200),
            };
            match RemoteProvider::new(remote_config) {
                Ok(provider) => return Box::new(provider),
                Err(err) => {
                    tracing::warn!(%err, "failed to build remote embedding provider, falling back to local");
                }
            }
        }
        _ => {
            tracing::warn!("no embedding credential configured, using local deterministic fallback");
        }
    }
    Box::new(LocalProvider::new())
}
