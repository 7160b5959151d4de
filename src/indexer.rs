//! Indexer: the root handle for a full (non-incremental) directory index
//! pass, used for first-run indexing and explicit reindex requests.
//! Incremental updates after the initial pass go through `DeltaHandler`
//! instead.

use crate::cancel::CancellationToken;
use crate::embedding_engine::EmbeddingEngine;
use crate::error::Result;
use crate::parsing;
use crate::store::Store;
use crate::types::Symbol;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Outcome of one `index_directory` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub symbols_indexed: usize,
}

pub struct Indexer<'a> {
    store: &'a Store,
    embeddings: &'a EmbeddingEngine,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a Store, embeddings: &'a EmbeddingEngine) -> Self {
        Self { store, embeddings }
    }

    /// Walk `root`, parse every discovered file, generate embeddings, and
    /// write each file's symbols and embeddings atomically: parse for
    /// symbols, embed them, then write both through the store inside one
    /// transaction. Per-file failures are logged and skipped by
    /// `parse_directory`/`replace_file`; cancellation stops the walk
    /// cleanly between files, never mid-file.
    #[instrument(skip(self, token), fields(root = %root.display()))]
    pub async fn index_directory(&self, root: &Path, token: &CancellationToken) -> Result<IndexSummary> {
        let symbols = parsing::parse_directory(root, token)?;

        let mut by_file: BTreeMap<PathBuf, Vec<Symbol>> = BTreeMap::new();
        for symbol in symbols {
            by_file.entry(symbol.file.clone()).or_default().push(symbol);
        }

        let mut summary = IndexSummary::default();
        for (file, file_symbols) in by_file {
            if token.is_cancelled() {
                return Err(crate::error::EngineError::Cancelled);
            }
            let embeddings = self.embeddings.generate_symbol_embeddings(&file_symbols).await;
            self.store.replace_file(&file, &file_symbols, &embeddings)?;
            summary.files_indexed += 1;
            summary.symbols_indexed += file_symbols.len();
        }

        self.store.record_sync_checkpoint()?;
        info!(files = summary.files_indexed, symbols = summary.symbols_indexed, "directory index complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::LocalProvider;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn indexes_every_discovered_file_in_a_directory() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.rs", "fn foo() {}\n");
        write_file(&dir, "b.rs", "fn bar() {}\nfn baz() {}\n");

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let indexer = Indexer::new(&store, &engine);

        let token = CancellationToken::new();
        let summary = indexer.index_directory(dir.path(), &token).await.unwrap();

        assert_eq!(summary.files_indexed, 2);
        assert_eq!(summary.symbols_indexed, 3);
        assert_eq!(store.all_symbols().unwrap().len(), 3);
        assert_eq!(store.get_all_embeddings().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cancellation_before_any_file_leaves_store_empty() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.rs", "fn foo() {}\n");

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let indexer = Indexer::new(&store, &engine);

        let token = CancellationToken::new();
        token.cancel();
        let result = indexer.index_directory(dir.path(), &token).await;
        assert!(result.is_err());
        assert!(store.all_symbols().unwrap().is_empty());
    }
}
