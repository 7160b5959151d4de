//! Symbol Store and Embedding Store (components C3/C4).
//!
//! A single `rusqlite` connection backs both: a `symbols` table mirrored
//! into an FTS5 virtual table for lexical search, and an `embeddings`
//! table holding one vector per symbol id. Opened with `journal_mode=WAL`
//! and `synchronous=NORMAL` so concurrent readers never block the single
//! writer.

use crate::error::{EngineError, Result};
use crate::types::{Embedding, EmbeddingMetadata, Param, Symbol, SymbolKind};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Embedded SQL store for symbols and embeddings.
///
/// Wraps a single connection behind a mutex: SQLite under WAL allows
/// concurrent readers, but this store serializes writers at the
/// application level to keep delete-then-insert reconciliation atomic.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if necessary) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Self::init_schema(&conn)?;
        info!(path = %path.display(), "opened symbol/embedding store");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS symbols (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                package TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                column INTEGER NOT NULL,
                signature TEXT NOT NULL,
                doc TEXT,
                public INTEGER NOT NULL,
                imports TEXT NOT NULL,
                calls TEXT NOT NULL,
                callers TEXT NOT NULL,
                params TEXT NOT NULL,
                returns TEXT NOT NULL,
                fields TEXT NOT NULL,
                methods TEXT NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
                id UNINDEXED,
                name,
                doc,
                signature,
                content=symbols,
                content_rowid=rowid
            );

            CREATE TRIGGER IF NOT EXISTS symbols_ai AFTER INSERT ON symbols BEGIN
                INSERT INTO symbols_fts(rowid, id, name, doc, signature)
                VALUES (new.rowid, new.id, new.name, new.doc, new.signature);
            END;

            CREATE TRIGGER IF NOT EXISTS symbols_ad AFTER DELETE ON symbols BEGIN
                INSERT INTO symbols_fts(symbols_fts, rowid, id, name, doc, signature)
                VALUES ('delete', old.rowid, old.id, old.name, old.doc, old.signature);
            END;

            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file);
            CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

            CREATE TABLE IF NOT EXISTS embeddings (
                id TEXT PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                vector BLOB NOT NULL,
                package TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                complexity INTEGER NOT NULL,
                public INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_file ON embeddings(file);

            CREATE TABLE IF NOT EXISTS checkpoints (
                file TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sync_checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                synced_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // -- Symbols ------------------------------------------------------

    /// Replace all symbols belonging to `file` with `symbols`, atomically.
    /// Deletion precedes insertion within the same transaction so a
    /// reader never observes a half-updated file.
    pub fn store_symbols(&self, file: &Path, symbols: &[Symbol]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let file_str = file.to_string_lossy();
        tx.execute("DELETE FROM symbols WHERE file = ?1", params![file_str])?;
        for symbol in symbols {
            insert_symbol(&tx, symbol)?;
        }
        tx.commit()?;
        debug!(file = %file.display(), count = symbols.len(), "stored symbols");
        Ok(())
    }

    /// Delete all symbols belonging to `file`.
    pub fn delete_symbols_by_file(&self, file: &Path) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM symbols WHERE file = ?1", params![file.to_string_lossy()])?;
        Ok(())
    }

    /// Replace both the symbols and the embeddings belonging to `file` in
    /// one transaction. Used by the delta handler (C7) for a per-file
    /// add/modify update: the old rows for `file` disappear and the new
    /// ones appear atomically, or neither does.
    pub fn replace_file(&self, file: &Path, symbols: &[Symbol], embeddings: &[Embedding]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let file_str = file.to_string_lossy();
        tx.execute("DELETE FROM symbols WHERE file = ?1", params![file_str])?;
        tx.execute("DELETE FROM embeddings WHERE file = ?1", params![file_str])?;
        for symbol in symbols {
            insert_symbol(&tx, symbol)?;
        }
        for embedding in embeddings {
            insert_embedding(&tx, embedding)?;
        }
        tx.commit()?;
        debug!(
            file = %file.display(),
            symbols = symbols.len(),
            embeddings = embeddings.len(),
            "replaced file contents"
        );
        Ok(())
    }

    /// Remove both the symbols and the embeddings belonging to `file` in
    /// one transaction. Used by the delta handler (C7) for a `removed`
    /// file, closing out every trace of it.
    pub fn remove_file(&self, file: &Path) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let file_str = file.to_string_lossy();
        tx.execute("DELETE FROM symbols WHERE file = ?1", params![file_str])?;
        tx.execute("DELETE FROM embeddings WHERE file = ?1", params![file_str])?;
        tx.execute("DELETE FROM checkpoints WHERE file = ?1", params![file_str])?;
        tx.commit()?;
        debug!(file = %file.display(), "removed file contents");
        Ok(())
    }

    /// Tries `id` first; if nothing matches, falls back to `name` and
    /// returns the first match.
    pub fn get_symbol(&self, id: &str) -> Result<Option<Symbol>> {
        let conn = self.conn.lock();
        let sql = format!("{SELECT_SYMBOL_COLUMNS} WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt.query_row(params![id], row_to_symbol).optional()?;
        if row.is_some() {
            return Ok(row);
        }
        let sql = format!("{SELECT_SYMBOL_COLUMNS} WHERE name = ?1 LIMIT 1");
        let mut stmt = conn.prepare(&sql)?;
        let row = stmt.query_row(params![id], row_to_symbol).optional()?;
        Ok(row)
    }

    pub fn symbols_in_file(&self, file: &Path) -> Result<Vec<Symbol>> {
        let conn = self.conn.lock();
        let sql = format!("{SELECT_SYMBOL_COLUMNS} WHERE file = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![file.to_string_lossy()], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    /// Full-text search over name/doc/signature. `raw_query` is sanitized
    /// before being handed to FTS5's MATCH operator. An empty query (or one
    /// that sanitizes to nothing) returns all rows up to `limit`, scored
    /// 1.0, per the C3 contract rather than matching nothing.
    pub fn search_symbols(&self, raw_query: &str, limit: usize) -> Result<Vec<(Symbol, f32)>> {
        if raw_query.trim().is_empty() {
            let sql = format!("{SELECT_SYMBOL_COLUMNS} LIMIT ?1");
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit as i64], |row| Ok((row_to_symbol(row)?, 1.0f32)))?;
            return rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from);
        }
        let sanitized = sanitize_fts_query(raw_query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let sql = format!(
            "{SELECT_SYMBOL_COLUMNS_PREFIXED}, bm25(symbols_fts) AS rank
             JOIN symbols_fts ON symbols_fts.rowid = symbols.rowid
             WHERE symbols_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![sanitized, limit as i64], |row| {
            let symbol = row_to_symbol(row)?;
            // bm25() returns a negative-is-better score in SQLite's FTS5;
            // fold it into a positive 0..1-ish relevance for fusion with
            // semantic/graph scores downstream.
            let rank: f64 = row.get(17)?;
            Ok((symbol, (1.0 / (1.0 + rank.abs())) as f32))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    /// Text-search entry point for the query engine: an empty query
    /// lists all symbols up to `limit`; a non-empty query is sanitized
    /// and, when `include_docs` is false, scoped to the `name` and
    /// `signature` FTS columns only.
    pub fn search_symbols_text(&self, raw_query: &str, limit: usize, include_docs: bool) -> Result<Vec<Symbol>> {
        if raw_query.trim().is_empty() {
            let sql = format!("{SELECT_SYMBOL_COLUMNS} LIMIT ?1");
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit as i64], row_to_symbol)?;
            return rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from);
        }
        let sanitized = sanitize_fts_query(raw_query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = if include_docs { sanitized } else { format!("{{name signature}} : ({sanitized})") };
        let conn = self.conn.lock();
        let sql = format!(
            "{SELECT_SYMBOL_COLUMNS_PREFIXED}
             JOIN symbols_fts ON symbols_fts.rowid = symbols.rowid
             WHERE symbols_fts MATCH ?1
             ORDER BY bm25(symbols_fts)
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![match_expr, limit as i64], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    /// Symbols whose `calls` list contains `name` — i.e. who calls `name`.
    pub fn find_callers(&self, name: &str) -> Result<Vec<Symbol>> {
        let conn = self.conn.lock();
        let sql = format!("{SELECT_SYMBOL_COLUMNS} WHERE calls LIKE ?1");
        let needle = format!("%\"{name}\"%");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![needle], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    /// Symbols called from within `caller_id`'s source symbol by name.
    pub fn find_called(&self, caller_scoped_or_id: &str) -> Result<Vec<Symbol>> {
        let caller = self.get_symbol(caller_scoped_or_id)?;
        let Some(caller) = caller else { return Ok(Vec::new()) };
        let conn = self.conn.lock();
        let mut out = Vec::new();
        for callee_name in &caller.calls {
            let sql = format!("{SELECT_SYMBOL_COLUMNS} WHERE name = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![callee_name], row_to_symbol)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    pub fn all_symbols(&self) -> Result<Vec<Symbol>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_SYMBOL_COLUMNS)?;
        let rows = stmt.query_map([], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    // -- Embeddings -----------------------------------------------------

    pub fn store_embeddings(&self, file: &Path, embeddings: &[Embedding]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM embeddings WHERE file = ?1", params![file.to_string_lossy()])?;
        for embedding in embeddings {
            insert_embedding(&tx, embedding)?;
        }
        tx.commit()?;
        debug!(file = %file.display(), count = embeddings.len(), "stored embeddings");
        Ok(())
    }

    pub fn delete_embeddings_by_file(&self, file: &Path) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM embeddings WHERE file = ?1", params![file.to_string_lossy()])?;
        Ok(())
    }

    /// Fetch every stored embedding. The query engine (C10) performs a
    /// brute-force cosine scan over this set — no ANN index.
    pub fn get_all_embeddings(&self) -> Result<Vec<Embedding>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, text, vector, package, file, line, complexity, public, created_at FROM embeddings",
        )?;
        let rows = stmt.query_map([], row_to_embedding)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(EngineError::from)
    }

    // -- Checkpoints ------------------------------------------------------

    pub fn record_checkpoint(&self, file: &Path, content_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO checkpoints (file, content_hash, indexed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(file) DO UPDATE SET content_hash = excluded.content_hash, indexed_at = excluded.indexed_at",
            params![file.to_string_lossy(), content_hash, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn checkpoint_hash(&self, file: &Path) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT content_hash FROM checkpoints WHERE file = ?1",
            params![file.to_string_lossy()],
            |row| row.get(0),
        )
        .optional()
        .map_err(EngineError::from)
    }

    pub fn delete_checkpoint(&self, file: &Path) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM checkpoints WHERE file = ?1", params![file.to_string_lossy()])?;
        Ok(())
    }

    /// Record a new monotonically increasing sync timestamp and prune down
    /// to the last 10.
    pub fn record_sync_checkpoint(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_checkpoints (synced_at) VALUES (?1)",
            params![chrono::Utc::now().to_rfc3339()],
        )?;
        conn.execute(
            "DELETE FROM sync_checkpoints WHERE id NOT IN (
                SELECT id FROM sync_checkpoints ORDER BY id DESC LIMIT 10
            )",
            [],
        )?;
        Ok(())
    }

    /// The newest recorded sync checkpoint, if any.
    pub fn last_checkpoint(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let conn = self.conn.lock();
        let ts: Option<String> = conn
            .query_row("SELECT synced_at FROM sync_checkpoints ORDER BY id DESC LIMIT 1", [], |row| row.get(0))
            .optional()?;
        Ok(ts.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&chrono::Utc)))
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

const SELECT_SYMBOL_COLUMNS: &str = "SELECT id, name, kind, package, file, line, column, signature, doc, public, imports, calls, callers, params, returns, fields, methods FROM symbols";
const SELECT_SYMBOL_COLUMNS_PREFIXED: &str = "SELECT symbols.id, symbols.name, symbols.kind, symbols.package, symbols.file, symbols.line, symbols.column, symbols.signature, symbols.doc, symbols.public, symbols.imports, symbols.calls, symbols.callers, symbols.params, symbols.returns, symbols.fields, symbols.methods FROM symbols";

fn insert_symbol(tx: &rusqlite::Transaction, symbol: &Symbol) -> Result<()> {
    tx.execute(
        "INSERT INTO symbols (id, name, kind, package, file, line, column, signature, doc, public, imports, calls, callers, params, returns, fields, methods)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            symbol.id,
            symbol.name,
            symbol.kind.as_str(),
            symbol.package,
            symbol.file.to_string_lossy(),
            symbol.line,
            symbol.column,
            symbol.signature,
            symbol.doc,
            symbol.public as i64,
            serde_json::to_string(&symbol.imports)?,
            serde_json::to_string(&symbol.calls)?,
            serde_json::to_string(&symbol.callers)?,
            serde_json::to_string(&symbol.params)?,
            serde_json::to_string(&symbol.returns)?,
            serde_json::to_string(&symbol.fields)?,
            serde_json::to_string(&symbol.methods)?,
        ],
    )?;
    Ok(())
}

fn insert_embedding(tx: &rusqlite::Transaction, embedding: &Embedding) -> Result<()> {
    tx.execute(
        "INSERT INTO embeddings (id, kind, text, vector, package, file, line, complexity, public, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            embedding.id,
            embedding.kind.as_str(),
            embedding.text,
            vector_to_blob(&embedding.vector),
            embedding.metadata.package,
            embedding.metadata.file.to_string_lossy(),
            embedding.metadata.line,
            embedding.metadata.complexity,
            embedding.metadata.public as i64,
            embedding.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Symbol> {
    let kind_str: String = row.get(2)?;
    let kind = SymbolKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let imports: String = row.get(10)?;
    let calls: String = row.get(11)?;
    let callers: String = row.get(12)?;
    let params_json: String = row.get(13)?;
    let returns: String = row.get(14)?;
    let fields: String = row.get(15)?;
    let methods: String = row.get(16)?;

    Ok(Symbol {
        id: row.get(0)?,
        name: row.get(1)?,
        kind,
        package: row.get(3)?,
        file: PathBuf::from(row.get::<_, String>(4)?),
        line: row.get(5)?,
        column: row.get(6)?,
        signature: row.get(7)?,
        doc: row.get(8)?,
        public: row.get::<_, i64>(9)? != 0,
        imports: serde_json::from_str(&imports).unwrap_or_default(),
        calls: serde_json::from_str(&calls).unwrap_or_default(),
        callers: serde_json::from_str(&callers).unwrap_or_default(),
        params: serde_json::from_str::<Vec<Param>>(&params_json).unwrap_or_default(),
        returns: serde_json::from_str(&returns).unwrap_or_default(),
        fields: serde_json::from_str::<Vec<Param>>(&fields).unwrap_or_default(),
        methods: serde_json::from_str(&methods).unwrap_or_default(),
    })
}

fn row_to_embedding(row: &rusqlite::Row) -> rusqlite::Result<Embedding> {
    let kind_str: String = row.get(1)?;
    let kind = SymbolKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let blob: Vec<u8> = row.get(3)?;
    let created_at: String = row.get(9)?;
    Ok(Embedding {
        id: row.get(0)?,
        kind,
        text: row.get(2)?,
        vector: blob_to_vector(&blob),
        metadata: EmbeddingMetadata {
            package: row.get(4)?,
            file: PathBuf::from(row.get::<_, String>(5)?),
            line: row.get(6)?,
            complexity: row.get(7)?,
            public: row.get::<_, i64>(8)? != 0,
        },
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

/// Sanitize a free-text query for safe use with FTS5's MATCH operator:
/// split on whitespace, strip characters FTS5 treats as query syntax, and
/// wrap each remaining term in double quotes so it is matched literally.
/// Prevents a search term like `foo" OR 1=1 --` from being interpreted as
/// FTS5 query syntax.
pub fn sanitize_fts_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|term| term.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect::<String>())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;

    fn sample_symbol(file: &str, name: &str, line: u32) -> Symbol {
        Symbol {
            id: Symbol::derive_id("pkg", name, line),
            name: name.to_string(),
            kind: SymbolKind::Function,
            package: "pkg".to_string(),
            file: PathBuf::from(file),
            line,
            column: 0,
            signature: format!("fn {name}()"),
            doc: None,
            public: true,
            imports: vec![],
            calls: vec!["helper".to_string()],
            callers: vec![],
            params: vec![],
            returns: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn stores_and_retrieves_a_symbol() {
        let store = Store::open_in_memory().unwrap();
        let sym = sample_symbol("a.rs", "foo", 1);
        store.store_symbols(Path::new("a.rs"), &[sym.clone()]).unwrap();

        let fetched = store.get_symbol(&sym.id).unwrap().unwrap();
        assert_eq!(fetched.name, "foo");
        assert_eq!(fetched.calls, vec!["helper".to_string()]);
    }

    #[test]
    fn delete_then_insert_replaces_file_contents() {
        let store = Store::open_in_memory().unwrap();
        let first = sample_symbol("a.rs", "foo", 1);
        store.store_symbols(Path::new("a.rs"), &[first]).unwrap();

        let second = sample_symbol("a.rs", "bar", 5);
        store.store_symbols(Path::new("a.rs"), &[second]).unwrap();

        let remaining = store.symbols_in_file(Path::new("a.rs")).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "bar");
    }

    #[test]
    fn search_finds_symbol_by_name() {
        let store = Store::open_in_memory().unwrap();
        store.store_symbols(Path::new("a.rs"), &[sample_symbol("a.rs", "find_me", 1)]).unwrap();

        let results = store.search_symbols("find_me", 10).unwrap();
        assert!(results.iter().any(|(s, _)| s.name == "find_me"));
    }

    #[test]
    fn search_query_with_injection_attempt_does_not_error() {
        let store = Store::open_in_memory().unwrap();
        store.store_symbols(Path::new("a.rs"), &[sample_symbol("a.rs", "foo", 1)]).unwrap();

        let results = store.search_symbols("foo\" OR 1=1 --", 10);
        assert!(results.is_ok());
    }

    #[test]
    fn sanitize_strips_fts_syntax_characters() {
        let sanitized = sanitize_fts_query("foo\" OR bar*");
        assert_eq!(sanitized, "\"foo\" OR \"OR\" OR \"bar\"");
    }

    #[test]
    fn vector_round_trips_through_blob_encoding() {
        let original = vec![0.5f32, -1.25, 3.0];
        let blob = vector_to_blob(&original);
        assert_eq!(blob_to_vector(&blob), original);
    }

    #[test]
    fn replace_file_is_atomic_across_symbols_and_embeddings() {
        let store = Store::open_in_memory().unwrap();
        let sym = sample_symbol("a.rs", "foo", 1);
        let embedding = Embedding {
            id: sym.id.clone(),
            kind: SymbolKind::Function,
            text: "prompt".to_string(),
            vector: vec![0.1, 0.2],
            metadata: EmbeddingMetadata {
                package: "pkg".to_string(),
                file: PathBuf::from("a.rs"),
                line: 1,
                complexity: 1,
                public: true,
            },
            created_at: chrono::Utc::now(),
        };
        store.replace_file(Path::new("a.rs"), &[sym.clone()], &[embedding]).unwrap();

        assert_eq!(store.symbols_in_file(Path::new("a.rs")).unwrap().len(), 1);
        assert_eq!(store.get_all_embeddings().unwrap().len(), 1);
    }

    #[test]
    fn remove_file_closes_out_symbols_and_embeddings() {
        let store = Store::open_in_memory().unwrap();
        let sym = sample_symbol("a.rs", "foo", 1);
        store.store_symbols(Path::new("a.rs"), &[sym.clone()]).unwrap();
        store
            .store_embeddings(
                Path::new("a.rs"),
                &[Embedding {
                    id: sym.id.clone(),
                    kind: SymbolKind::Function,
                    text: "prompt".to_string(),
                    vector: vec![0.1],
                    metadata: EmbeddingMetadata {
                        package: "pkg".to_string(),
                        file: PathBuf::from("a.rs"),
                        line: 1,
                        complexity: 1,
                        public: true,
                    },
                    created_at: chrono::Utc::now(),
                }],
            )
            .unwrap();

        store.remove_file(Path::new("a.rs")).unwrap();
        assert!(store.symbols_in_file(Path::new("a.rs")).unwrap().is_empty());
        assert!(store.get_all_embeddings().unwrap().is_empty());
    }

    #[test]
    fn sync_checkpoints_retain_only_last_ten_and_report_newest() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..15 {
            store.record_sync_checkpoint().unwrap();
        }
        let conn = store.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sync_checkpoints", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 10);
        drop(conn);
        assert!(store.last_checkpoint().unwrap().is_some());
    }

    #[test]
    fn find_callers_matches_by_callee_name() {
        let store = Store::open_in_memory().unwrap();
        store.store_symbols(Path::new("a.rs"), &[sample_symbol("a.rs", "foo", 1)]).unwrap();

        let callers = store.find_callers("helper").unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].name, "foo");
    }
}
