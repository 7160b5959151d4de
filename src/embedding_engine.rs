//! Embedding Engine (component C5).
//!
//! Bridges the symbol model and the embedding provider: synthesizes the
//! canonical prompt text for a `Symbol`, asks the provider for a vector,
//! and wraps the result in an `Embedding`. Also hosts the two pure
//! functions the rest of the engine leans on: cosine similarity and the
//! heuristic complexity score.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::types::{Embedding, EmbeddingMetadata, Symbol, SymbolKind};
use tracing::warn;

/// Builds embedding input text from symbols and drives the configured
/// provider to turn that text into vectors.
pub struct EmbeddingEngine {
    provider: Box<dyn EmbeddingProvider>,
}

impl EmbeddingEngine {
    pub fn new(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Borrow the underlying provider, e.g. to hand to a [`crate::query::QueryEngine`].
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Synthesize the canonical prompt for a symbol.
    pub fn build_prompt(symbol: &Symbol) -> String {
        let params = symbol
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = symbol.returns.join(", ");
        let fields = symbol
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.ty))
            .collect::<Vec<_>>()
            .join(", ");
        let methods = symbol.methods.join(", ");

        format!(
            "Documentation: {}\nSignature: {}\nType: {}\nParameters: {}\nReturns: {}\nFields: {}\nMethods: {}\nPackage: {}\nFile: {}:{}",
            symbol.doc.as_deref().unwrap_or(""),
            symbol.signature,
            symbol.kind.as_str(),
            params,
            returns,
            fields,
            methods,
            symbol.package,
            symbol.file.display(),
            symbol.line,
        )
    }

    /// Embed one symbol.
    pub async fn generate_symbol_embedding(&self, symbol: &Symbol) -> Result<Embedding> {
        let text = Self::build_prompt(symbol);
        let vector = self.provider.embed(&text).await?;
        Ok(Embedding {
            id: symbol.id.clone(),
            kind: symbol.kind,
            text,
            vector,
            metadata: EmbeddingMetadata {
                package: symbol.package.clone(),
                file: symbol.file.clone(),
                line: symbol.line,
                complexity: complexity_score(symbol),
                public: symbol.public,
            },
            created_at: chrono::Utc::now(),
        })
    }

    /// Embed many symbols, tolerating and logging individual failures
    /// rather than aborting the whole batch.
    pub async fn generate_symbol_embeddings(&self, symbols: &[Symbol]) -> Vec<Embedding> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.generate_symbol_embedding(symbol).await {
                Ok(embedding) => out.push(embedding),
                Err(err) => {
                    warn!(symbol = %symbol.id, %err, "skipping embedding for symbol");
                }
            }
        }
        out
    }
}

/// Cosine similarity between two vectors. Returns 0 if either norm is
/// zero or the dimensions mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Heuristic complexity score. Not a substitute for real cyclomatic
/// analysis — advisory only.
pub fn complexity_score(symbol: &Symbol) -> u32 {
    let mut score = 1u32;
    match symbol.kind {
        SymbolKind::Function | SymbolKind::Method => {
            score += symbol.params.len() as u32;
            score += symbol.returns.len() as u32;
            score += symbol.calls.len() as u32;
        }
        SymbolKind::Struct => {
            score += symbol.fields.len() as u32;
        }
        SymbolKind::Interface => {
            score += symbol.methods.len() as u32;
        }
        SymbolKind::Type | SymbolKind::Var | SymbolKind::Const => {}
    }
    if symbol.public {
        score += 1;
    }
    if let Some(doc) = &symbol.doc {
        if doc.split_whitespace().count() > 10 {
            score += 2;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Param;
    use std::path::PathBuf;

    fn sample() -> Symbol {
        Symbol {
            id: "p:foo:1".to_string(),
            name: "foo".to_string(),
            kind: SymbolKind::Function,
            package: "p".to_string(),
            file: PathBuf::from("a.rs"),
            line: 1,
            column: 0,
            signature: "fn foo(x: i32) -> i32".to_string(),
            doc: Some("Adds one to x and returns the result for downstream use".to_string()),
            public: true,
            imports: vec![],
            calls: vec!["bar".to_string()],
            callers: vec![],
            params: vec![Param { name: "x".to_string(), ty: "i32".to_string() }],
            returns: vec!["i32".to_string()],
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn prompt_includes_all_sections() {
        let prompt = EmbeddingEngine::build_prompt(&sample());
        assert!(prompt.contains("Documentation:"));
        assert!(prompt.contains("Signature: fn foo"));
        assert!(prompt.contains("Type: function"));
        assert!(prompt.contains("Parameters: x: i32"));
        assert!(prompt.contains("File: a.rs:1"));
    }

    #[test]
    fn complexity_counts_params_returns_calls_and_bonuses() {
        // 1 base + 1 param + 1 return + 1 call + 1 public + 2 long-doc = 7
        assert_eq!(complexity_score(&sample()), 7);
    }

    #[test]
    fn cosine_similarity_bounds_and_self_similarity() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, 4.0];
        let sim = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&sim));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_mismatched_dims_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
