//! Delta Handler (component C7): applies add/modify/remove file batches
//! atomically across the symbol and embedding stores.

use crate::cache::Cache;
use crate::embedding_engine::EmbeddingEngine;
use crate::error::Result;
use crate::parsing;
use crate::store::Store;
use crate::types::DeltaBatch;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Orchestrates one `DeltaBatch` application. Removes precede updates
/// within a call to `process`; within a per-file update, delete precedes
/// insert. Each per-file update is its own atomic transaction
/// (`Store::replace_file`/`remove_file`); a failure on one file is logged
/// and skipped rather than aborting the rest of the batch.
pub struct DeltaHandler<'a> {
    store: &'a Store,
    embeddings: &'a EmbeddingEngine,
    cache: Option<&'a Cache>,
    root: &'a Path,
}

impl<'a> DeltaHandler<'a> {
    pub fn new(store: &'a Store, embeddings: &'a EmbeddingEngine, root: &'a Path) -> Self {
        Self { store, embeddings, cache: None, root }
    }

    pub fn with_cache(mut self, cache: &'a Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[instrument(skip(self, batch), fields(added = batch.added.len(), modified = batch.modified.len(), removed = batch.removed.len()))]
    pub async fn process(&self, batch: &DeltaBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        for file in &batch.removed {
            if let Err(err) = self.store.remove_file(file) {
                warn!(file = %file.display(), %err, "failed to remove file from store");
            }
        }

        for file in batch.added_or_modified() {
            if let Err(err) = self.update_file(file).await {
                warn!(file = %file.display(), %err, "failed to update file in store");
            }
        }

        self.store.record_sync_checkpoint()?;
        if let Some(cache) = self.cache {
            cache.clear();
        }
        info!(
            added = batch.added.len(),
            modified = batch.modified.len(),
            removed = batch.removed.len(),
            "delta batch processed"
        );
        Ok(())
    }

    /// Per-file add/modify update: parse, embed, then a single atomic
    /// delete-then-insert across symbols and embeddings.
    async fn update_file(&self, file: &Path) -> Result<()> {
        let source = std::fs::read_to_string(file)?;
        let package = parsing::package_for_file(self.root, file);
        let symbols = parsing::parse_file(file, &source, &package)?;
        let embeddings = self.embeddings.generate_symbol_embeddings(&symbols).await;
        self.store.replace_file(file, &symbols, &embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::LocalProvider;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn s1_single_file_index() {
        let dir = TempDir::new().unwrap();
        let file = write_file(
            &dir,
            "a.rs",
            "fn foo(x: i32) -> i32 { bar(x) }\nfn bar(y: i32) -> i32 { y + 1 }\n",
        );

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let handler = DeltaHandler::new(&store, &engine, dir.path());

        let batch = DeltaBatch { added: vec![file.clone()], modified: vec![], removed: vec![] };
        handler.process(&batch).await.unwrap();

        let results = store.search_symbols("foo", 10).unwrap();
        assert_eq!(results.len(), 1);
        let (foo, _) = &results[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.calls, vec!["bar".to_string()]);
    }

    #[tokio::test]
    async fn s3_delta_removal_closure() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.rs", "fn foo() {}\n");

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let handler = DeltaHandler::new(&store, &engine, dir.path());

        handler
            .process(&DeltaBatch { added: vec![file.clone()], modified: vec![], removed: vec![] })
            .await
            .unwrap();
        handler
            .process(&DeltaBatch { added: vec![], modified: vec![], removed: vec![file] })
            .await
            .unwrap();

        assert!(store.search_symbols("foo", 10).unwrap().is_empty());
        assert!(store.all_symbols().unwrap().is_empty());
        assert!(store.get_all_embeddings().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delta_idempotence_reindexing_same_file_does_not_duplicate() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.rs", "fn foo() {}\n");

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let handler = DeltaHandler::new(&store, &engine, dir.path());

        let batch = DeltaBatch { added: vec![file], modified: vec![], removed: vec![] };
        handler.process(&batch).await.unwrap();
        handler.process(&batch).await.unwrap();

        assert_eq!(store.all_symbols().unwrap().len(), 1);
        assert_eq!(store.get_all_embeddings().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_file_is_skipped_with_warning_not_aborted() {
        let dir = TempDir::new().unwrap();
        let bad = write_file(&dir, "bad.txt", "not rust at all");
        let good = write_file(&dir, "good.rs", "fn ok() {}\n");

        let store = Store::open_in_memory().unwrap();
        let engine = EmbeddingEngine::new(Box::new(LocalProvider::new()));
        let handler = DeltaHandler::new(&store, &engine, dir.path());

        let batch = DeltaBatch { added: vec![bad, good], modified: vec![], removed: vec![] };
        handler.process(&batch).await.unwrap();

        assert_eq!(store.all_symbols().unwrap().len(), 1);
    }
}
