//! Property-based tests for the code-intelligence engine's universal
//! properties: parse idempotence, round-trip storage, delta idempotence,
//! graph determinism, and cosine-similarity bounds.

use codeindex_engine::embedding_engine::cosine_similarity;
use codeindex_engine::graph::Graph;
use codeindex_engine::parsing;
use codeindex_engine::store::Store;
use codeindex_engine::types::{Param, Symbol, SymbolKind};
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

/// Generate valid Rust identifiers, excluding keywords.
fn rust_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_filter("must not be a keyword", |s| {
        !["fn", "let", "mut", "pub", "struct", "impl", "trait", "use", "mod", "const", "self", "return"]
            .contains(&s.as_str())
    })
}

/// Generate a small, syntactically valid Rust source file: a handful of
/// free functions, each optionally calling one earlier-declared function.
fn rust_source_file() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec(rust_identifier(), 1..6).prop_map(|names| {
        let unique: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            names.into_iter().filter(|n| seen.insert(n.clone())).collect()
        };
        let mut src = String::new();
        for (i, name) in unique.iter().enumerate() {
            let call = if i > 0 { format!("{}();", unique[i - 1]) } else { String::new() };
            src.push_str(&format!("pub fn {name}() {{ {call} }}\n"));
        }
        (src, unique)
    })
}

fn sample_symbol(name: &str, package: &str, line: u32, calls: Vec<&str>) -> Symbol {
    Symbol {
        id: Symbol::derive_id(package, name, line),
        name: name.to_string(),
        kind: SymbolKind::Function,
        package: package.to_string(),
        file: PathBuf::from("a.rs"),
        line,
        column: 0,
        signature: format!("fn {name}()"),
        doc: None,
        public: true,
        imports: vec![],
        calls: calls.into_iter().map(String::from).collect(),
        callers: vec![],
        params: vec![Param { name: "x".to_string(), ty: "i32".to_string() }],
        returns: vec!["i32".to_string()],
        fields: vec![],
        methods: vec![],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Parse idempotence: parsing the same source twice yields the same
    /// symbol names, kinds and call lists, in the same order.
    #[test]
    fn parse_is_idempotent((source, _names) in rust_source_file()) {
        let path = PathBuf::from("gen.rs");
        let first = parsing::parse_file(&path, &source, "pkg").unwrap();
        let second = parsing::parse_file(&path, &source, "pkg").unwrap();

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(&a.name, &b.name);
            prop_assert_eq!(a.kind, b.kind);
            prop_assert_eq!(&a.calls, &b.calls);
            prop_assert_eq!(&a.id, &b.id);
        }
    }

    /// Round-trip storage: every scalar field of a stored symbol survives
    /// a write and a read back out unchanged.
    #[test]
    fn store_round_trips_scalar_fields(
        name in rust_identifier(),
        line in 1u32..10_000,
        public in any::<bool>(),
    ) {
        let store = Store::open_in_memory().unwrap();
        let symbol = sample_symbol(&name, "pkg", line, vec![]);
        let mut symbol = symbol;
        symbol.public = public;

        store.store_symbols(&symbol.file, &[symbol.clone()]).unwrap();
        let fetched = store.get_symbol(&symbol.id).unwrap().unwrap();

        prop_assert_eq!(fetched.id, symbol.id);
        prop_assert_eq!(fetched.name, symbol.name);
        prop_assert_eq!(fetched.kind, symbol.kind);
        prop_assert_eq!(fetched.package, symbol.package);
        prop_assert_eq!(fetched.file, symbol.file);
        prop_assert_eq!(fetched.line, symbol.line);
        prop_assert_eq!(fetched.signature, symbol.signature);
        prop_assert_eq!(fetched.public, symbol.public);
    }

    /// Delta idempotence at the store layer: replacing a file's contents
    /// with the same symbol set twice never duplicates rows.
    #[test]
    fn replace_file_twice_does_not_duplicate(name in rust_identifier(), line in 1u32..10_000) {
        let store = Store::open_in_memory().unwrap();
        let symbol = sample_symbol(&name, "pkg", line, vec![]);

        store.replace_file(&symbol.file, &[symbol.clone()], &[]).unwrap();
        store.replace_file(&symbol.file, &[symbol.clone()], &[]).unwrap();

        let remaining = store.symbols_in_file(&symbol.file).unwrap();
        prop_assert_eq!(remaining.len(), 1);
    }

    /// Graph determinism: building the graph twice from the same symbol
    /// snapshot yields the same node count and the same callee sets.
    #[test]
    fn graph_build_is_deterministic(caller in rust_identifier(), callee in rust_identifier()) {
        prop_assume!(caller != callee);
        let mut symbols: HashMap<String, Symbol> = HashMap::new();
        let caller_sym = sample_symbol(&caller, "pkg", 1, vec![&callee]);
        let callee_sym = sample_symbol(&callee, "pkg", 2, vec![]);
        symbols.insert(caller_sym.id.clone(), caller_sym.clone());
        symbols.insert(callee_sym.id.clone(), callee_sym.clone());

        let g1 = Graph::build(&symbols);
        let g2 = Graph::build(&symbols);

        prop_assert_eq!(g1.node_count(), g2.node_count());
        prop_assert_eq!(g1.callees(&caller_sym.id), g2.callees(&caller_sym.id));
        prop_assert_eq!(g1.callers(&callee_sym.id), g2.callers(&callee_sym.id));
    }

    /// Cosine bounds: for any pair of equal-length nonzero vectors, cosine
    /// similarity lies in [-1, 1], and a vector is always similarity-1 with
    /// itself.
    #[test]
    fn cosine_similarity_is_bounded(
        a in prop::collection::vec(-10.0f32..10.0, 3..8),
        b in prop::collection::vec(-10.0f32..10.0, 3..8),
    ) {
        let len = a.len().min(b.len());
        let a = &a[..len];
        let b = &b[..len];
        let sim = cosine_similarity(a, b);
        prop_assert!((-1.0..=1.0001).contains(&sim));

        if a.iter().any(|x| *x != 0.0) {
            let self_sim = cosine_similarity(a, a);
            prop_assert!((self_sim - 1.0).abs() < 1e-3);
        }
    }
}
