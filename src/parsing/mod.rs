//! Parsing module for extracting symbols from source code.
//!
//! Uses tree-sitter for incremental, error-tolerant parsing. A
//! [`LanguageParser`] extracts three raw facts from a parsed tree — symbol
//! definitions, call sites and imports — which [`parse_file`] assembles
//! into the flat [`Symbol`] records the rest of the engine operates on.

pub mod rust;

use crate::cancel::CancellationToken;
use crate::discovery::FileDiscovery;
use crate::error::{EngineError, Result};
use crate::types::{Param, Symbol, SymbolKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;
use tree_sitter::{Language, Tree};

/// One raw symbol definition as seen by a language parser, before call
/// edges and imports are folded in.
#[derive(Debug, Clone)]
pub struct RawSymbol {
    pub name: String,
    pub scoped_name: String,
    pub kind: SymbolKind,
    pub line: u32,
    pub column: u32,
    pub signature: String,
    pub doc: Option<String>,
    pub public: bool,
    pub params: Vec<Param>,
    pub returns: Vec<String>,
    pub fields: Vec<Param>,
    pub methods: Vec<String>,
}

/// A call site: `caller` is the scoped name of the enclosing symbol,
/// `callee_name` the unscoped name of the function/method being called
/// (unscoped because static resolution of dynamic dispatch is out of
/// scope).
#[derive(Debug, Clone)]
pub struct RawCall {
    pub caller: String,
    pub callee_name: String,
}

/// Trait for language-specific parsers (Parser component C1).
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> Language;
    fn extensions(&self) -> &[&str];

    fn extract_symbols(&self, tree: &Tree, source: &str, file: &Path) -> Result<Vec<RawSymbol>>;
    fn extract_calls(&self, tree: &Tree, source: &str, file: &Path) -> Result<Vec<RawCall>>;
    fn extract_imports(&self, tree: &Tree, source: &str, file: &Path) -> Result<Vec<String>>;
}

/// Resolve a parser for a file based on its extension. Returns `None` for
/// extensions outside the engine's scope (Rust only).
pub fn parser_for_file(path: &Path) -> Option<Box<dyn LanguageParser>> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "rs" => Some(Box::new(rust::RustParser::new())),
        _ => None,
    }
}

/// Parse a single file into the flat `Symbol` records the store consumes.
///
/// `package` is the crate/package name the file belongs to, used to
/// derive each symbol's stable id. Per-file imports are attached to every
/// symbol defined in that file; calls are attached to the symbol whose
/// scoped name matches the call site's enclosing function/method.
pub fn parse_file(path: &Path, source: &str, package: &str) -> Result<Vec<Symbol>> {
    let parser_impl = parser_for_file(path).ok_or_else(|| EngineError::Parse {
        path: path.to_path_buf(),
        reason: "no parser registered for this file extension".to_string(),
    })?;

    let mut ts_parser = tree_sitter::Parser::new();
    ts_parser
        .set_language(&parser_impl.language())
        .map_err(|e| EngineError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let tree = ts_parser.parse(source, None).ok_or_else(|| EngineError::Parse {
        path: path.to_path_buf(),
        reason: "tree-sitter returned no tree".to_string(),
    })?;

    let raw_symbols = parser_impl.extract_symbols(&tree, source, path)?;
    let raw_calls = parser_impl.extract_calls(&tree, source, path)?;
    let imports = parser_impl.extract_imports(&tree, source, path)?;

    let mut calls_by_caller: HashMap<String, Vec<String>> = HashMap::new();
    for call in raw_calls {
        calls_by_caller.entry(call.caller).or_default().push(call.callee_name);
    }

    let symbols = raw_symbols
        .into_iter()
        .map(|raw| {
            let id = Symbol::derive_id(package, &raw.scoped_name, raw.line);
            let calls = calls_by_caller.remove(&raw.scoped_name).unwrap_or_default();
            Symbol {
                id,
                name: raw.name,
                kind: raw.kind,
                package: package.to_string(),
                file: path.to_path_buf(),
                line: raw.line,
                column: raw.column,
                signature: raw.signature,
                doc: raw.doc,
                public: raw.public,
                imports: imports.clone(),
                calls,
                callers: Vec::new(),
                params: raw.params,
                returns: raw.returns,
                fields: raw.fields,
                methods: raw.methods,
            }
        })
        .collect();

    Ok(symbols)
}

/// Derive the package name a file belongs to: the name of its containing
/// crate (nearest ancestor directory holding a `Cargo.toml`), falling back
/// to the immediate parent directory name, then `"main"`.
pub fn package_for_file(root: &Path, file: &Path) -> String {
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d.join("Cargo.toml").is_file() {
            if let Some(name) = d.file_name().and_then(|n| n.to_str()) {
                return name.to_string();
            }
        }
        if d == root {
            break;
        }
        dir = d.parent();
    }
    file.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "main".to_string())
}

/// Parse every source file under `root`, skipping syntax/read errors on
/// individual files rather than aborting the walk. Cancellable via
/// `token`: on cancellation, returns `Err(Cancelled)` with no partial
/// state leaked to the caller (the caller hasn't persisted anything yet —
/// this function is pure read-and-parse).
pub fn parse_directory(root: &Path, token: &CancellationToken) -> Result<Vec<Symbol>> {
    let files = FileDiscovery::new().discover(root).map_err(|e| EngineError::Parse {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut symbols = Vec::new();
    for file in files {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if parser_for_file(&file).is_none() {
            continue;
        }
        let source = match fs::read_to_string(&file) {
            Ok(s) => s,
            Err(err) => {
                warn!(file = %file.display(), %err, "failed to read file, skipping");
                continue;
            }
        };
        let package = package_for_file(root, &file);
        match parse_file(&file, &source, &package) {
            Ok(mut file_symbols) => symbols.append(&mut file_symbols),
            Err(err) => {
                warn!(file = %file.display(), %err, "failed to parse file, skipping");
            }
        }
    }
    Ok(symbols)
}
