//! Deterministic local embedding fallback.
//!
//! Used when no remote credential is configured (`EMBEDDING_API_KEY`
//! absent) and by tests that need reproducible vectors without network
//! access. Not semantically meaningful — it hashes the input text into a
//! fixed-length vector, but the same input always produces the same
//! output, which is the only property the rest of the engine (and its
//! property tests) actually rely on.

use super::EmbeddingProvider;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Default dimensionality for the local fallback provider.
pub const DEFAULT_DIM: usize = 256;

/// Hash-based provider: deterministic, no network, no credential.
pub struct LocalProvider {
    dim: usize,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self { dim: DEFAULT_DIM }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim }
    }

    /// Hash `text` into `self.dim` floats in `[-1, 1]` by chaining SHA-256
    /// blocks: block `k` hashes `text` concatenated with `k`'s bytes, and
    /// each output byte becomes one vector component.
    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dim);
        let mut block: u32 = 0;
        while out.len() < self.dim {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest.iter() {
                if out.len() >= self.dim {
                    break;
                }
                // Map 0..=255 to -1.0..=1.0.
                out.push((*byte as f32 / 127.5) - 1.0);
            }
            block += 1;
        }
        out
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_vector(text))
    }

    fn name(&self) -> &str {
        "local-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = LocalProvider::new();
        let a = provider.embed("fn foo()").await.unwrap();
        let b = provider.embed("fn foo()").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let provider = LocalProvider::new();
        let a = provider.embed("fn foo()").await.unwrap();
        let b = provider.embed("fn bar()").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn respects_configured_dimension() {
        let provider = LocalProvider::with_dim(64);
        let v = provider.embed("hello").await.unwrap();
        assert_eq!(v.len(), 64);
    }
}
