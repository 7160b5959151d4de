//! Core data model for the code-intelligence engine.
//!
//! These types mirror the three representations that must stay coherent
//! with each other: the symbol row, the embedding vector, and the graph
//! node. See `SPEC_FULL.md` §3 for the invariants that bind them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of symbol recognised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Struct,
    Interface,
    Var,
    Const,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Type => "type",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Var => "var",
            Self::Const => "const",
        }
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "type" => Ok(Self::Type),
            "struct" => Ok(Self::Struct),
            "interface" => Ok(Self::Interface),
            "var" => Ok(Self::Var),
            "const" => Ok(Self::Const),
            other => Err(crate::error::EngineError::InvariantViolation(format!(
                "unknown symbol kind `{other}`"
            ))),
        }
    }
}

/// A named, located code entity: a function, method, type, constant or
/// variable. The atomic unit of the engine's data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Derived, stable key `"{package}:{name}:{line}"`.
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub package: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub signature: String,
    pub doc: Option<String>,
    pub public: bool,

    pub imports: Vec<String>,
    pub calls: Vec<String>,
    /// Populated by the graph builder (C6); empty as produced by the parser.
    pub callers: Vec<String>,

    pub params: Vec<Param>,
    pub returns: Vec<String>,
    pub fields: Vec<Param>,
    pub methods: Vec<String>,
}

impl Symbol {
    /// Compute the derived id for a symbol identified by package/name/line.
    pub fn derive_id(package: &str, name: &str, line: u32) -> String {
        format!("{package}:{name}:{line}")
    }
}

/// A `{name, type}` pair used for parameters, return values and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// One indexable embedding vector, attached to exactly one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// Equal to the owning symbol's id.
    pub id: String,
    pub kind: SymbolKind,
    /// The synthesized prompt used to produce the vector.
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: EmbeddingMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub package: String,
    pub file: PathBuf,
    pub line: u32,
    pub complexity: u32,
    pub public: bool,
}

/// Edge kind in the call/dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    Implements,
    Embeds,
    References,
    DependsOn,
}

/// A directed edge between two symbol ids in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: f32,
    pub location: Option<String>,
}

/// A node in the graph: a symbol reference plus derived counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub call_count: u32,
    pub called_by: u32,
    pub cyclomatic: u32,
}

/// Three disjoint sequences of file paths describing a set of changes to
/// apply atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaBatch {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl DeltaBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn added_or_modified(&self) -> impl Iterator<Item = &Path> {
        self.added.iter().chain(self.modified.iter()).map(|p| p.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_stable_id() {
        assert_eq!(Symbol::derive_id("p", "Foo", 3), "p:Foo:3");
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Type,
            SymbolKind::Struct,
            SymbolKind::Interface,
            SymbolKind::Var,
            SymbolKind::Const,
        ] {
            let parsed: SymbolKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn delta_batch_is_empty_by_default() {
        assert!(DeltaBatch::default().is_empty());
    }
}
