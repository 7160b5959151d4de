//! Rust language parser using tree-sitter.

use super::{LanguageParser, RawCall, RawSymbol};
use crate::error::Result;
use crate::types::{Param, SymbolKind};
use std::path::Path;
use tree_sitter::{Language, Node, Tree};

/// Rust source code parser.
pub struct RustParser {
    // Parser instance is created per-use since it's not Send.
}

impl RustParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for RustParser {
    fn language(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, _file: &Path) -> Result<Vec<RawSymbol>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut symbols = Vec::new();
        let mut module_stack = vec!["crate".to_string()];
        let mut impl_type_stack = Vec::<String>::new();

        walk_symbols(root, bytes, &mut module_stack, &mut impl_type_stack, &mut symbols);

        Ok(symbols)
    }

    fn extract_calls(&self, tree: &Tree, source: &str, _file: &Path) -> Result<Vec<RawCall>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut calls = Vec::new();
        let mut module_stack = vec!["crate".to_string()];
        let mut impl_type_stack = Vec::<String>::new();
        let mut fn_scope_stack = Vec::<String>::new();

        walk_calls(
            root,
            bytes,
            &mut module_stack,
            &mut impl_type_stack,
            &mut fn_scope_stack,
            &mut calls,
        );

        Ok(calls)
    }

    fn extract_imports(&self, tree: &Tree, source: &str, _file: &Path) -> Result<Vec<String>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut imports = Vec::new();
        walk_imports(root, bytes, &mut imports);

        Ok(imports)
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Extract the last identifier from a node's text, e.g. "Foo" out of
/// "Foo<T>" or "foo::Bar" out of a scoped path.
fn last_ident_of(bytes: &[u8], node: Node) -> Option<String> {
    let text = std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).ok()?;
    let mut best = None;
    for part in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if !part.is_empty() {
            best = Some(part);
        }
    }
    best.map(|s| s.to_string())
}

fn join_scope(seg: &[String]) -> String {
    seg.join("::")
}

fn current_impl_type(impl_stack: &[String]) -> Option<&str> {
    impl_stack.last().map(|s| s.as_str())
}

fn impl_type_ident(bytes: &[u8], impl_node: Node) -> Option<String> {
    if impl_node.kind() != "impl_item" {
        return None;
    }
    let ty = impl_node.child_by_field_name("type")?;
    let text = std::str::from_utf8(&bytes[ty.start_byte()..ty.end_byte()]).ok()?;
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_doc_comments(bytes: &[u8], node: Node) -> Option<String> {
    let mut doc_lines = Vec::new();
    let mut cur = node.prev_sibling();

    while let Some(sib) = cur {
        match sib.kind() {
            "line_comment" => {
                let Ok(text) = std::str::from_utf8(&bytes[sib.start_byte()..sib.end_byte()])
                else {
                    break;
                };
                if text.starts_with("///") || text.starts_with("//!") {
                    doc_lines.push(text.trim_start_matches(['/', '!']).trim().to_string());
                } else {
                    break;
                }
                cur = sib.prev_sibling();
            }
            "attribute_item" => cur = sib.prev_sibling(),
            _ => break,
        }
    }

    doc_lines.reverse();
    if doc_lines.is_empty() { None } else { Some(doc_lines.join("\n")) }
}

/// Any `visibility_modifier` (`pub`, `pub(crate)`, `pub(super)`, `pub(in
/// ...)`) counts as externally visible for this engine's coarse model.
fn is_public(node: Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|child| child.kind() == "visibility_modifier")
}

fn node_text<'a>(bytes: &'a [u8], node: Node) -> &'a str {
    std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).unwrap_or("")
}

/// Build a human-readable signature string mirroring the source text of
/// the declaration head (everything up to, but excluding, the body).
fn signature_text(bytes: &[u8], node: Node) -> String {
    let body_start = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or(node.end_byte());
    std::str::from_utf8(&bytes[node.start_byte()..body_start])
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_params(bytes: &[u8], fn_node: Node) -> Vec<Param> {
    let Some(params_node) = fn_node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        match child.kind() {
            "self_parameter" => out.push(Param { name: "self".to_string(), ty: node_text(bytes, child).to_string() }),
            "parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .and_then(|p| last_ident_of(bytes, p))
                    .unwrap_or_else(|| "_".to_string());
                let ty = child
                    .child_by_field_name("type")
                    .map(|t| node_text(bytes, t).trim().to_string())
                    .unwrap_or_default();
                out.push(Param { name, ty });
            }
            _ => {}
        }
    }
    out
}

fn extract_returns(bytes: &[u8], fn_node: Node) -> Vec<String> {
    fn_node
        .child_by_field_name("return_type")
        .map(|ret| vec![node_text(bytes, ret).trim().to_string()])
        .unwrap_or_default()
}

/// Extract `{name, type}` pairs from a struct's field declaration list.
fn extract_struct_fields(bytes: &[u8], struct_node: Node) -> Vec<Param> {
    let Some(body) = struct_node.child_by_field_name("body") else {
        return Vec::new();
    };
    if body.kind() != "field_declaration_list" {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if child.kind() != "field_declaration" {
            continue;
        }
        let name = child
            .child_by_field_name("name")
            .and_then(|n| last_ident_of(bytes, n))
            .unwrap_or_else(|| "_".to_string());
        let ty = child
            .child_by_field_name("type")
            .map(|t| node_text(bytes, t).trim().to_string())
            .unwrap_or_default();
        out.push(Param { name, ty });
    }
    out
}

/// Extract method names declared on a trait's declaration list.
fn extract_trait_methods(bytes: &[u8], trait_node: Node) -> Vec<String> {
    let Some(body) = trait_node.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if matches!(child.kind(), "function_item" | "function_signature_item") {
            if let Some(name_node) = child.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    out.push(name);
                }
            }
        }
    }
    out
}

/// Map a tree-sitter item kind onto the engine's narrower symbol kind,
/// given whether it sits inside an impl block (method vs. function).
fn symbol_kind_for(ts_kind: &str, in_impl: bool) -> Option<SymbolKind> {
    match ts_kind {
        "function_item" if in_impl => Some(SymbolKind::Method),
        "function_item" => Some(SymbolKind::Function),
        "struct_item" => Some(SymbolKind::Struct),
        "trait_item" => Some(SymbolKind::Interface),
        "enum_item" | "type_item" => Some(SymbolKind::Type),
        "const_item" => Some(SymbolKind::Const),
        "static_item" => Some(SymbolKind::Var),
        _ => None,
    }
}

// ============================================================================
// Symbol extraction walker
// ============================================================================

fn walk_symbols(
    node: Node,
    bytes: &[u8],
    module_stack: &mut Vec<String>,
    impl_type_stack: &mut Vec<String>,
    symbols: &mut Vec<RawSymbol>,
) {
    let kind = node.kind();

    let mut entered_mod = false;
    if kind == "mod_item" && node.child_by_field_name("body").is_some() {
        if let Some(name) = node.child_by_field_name("name").and_then(|n| last_ident_of(bytes, n)) {
            module_stack.push(name);
            entered_mod = true;
        }
    }

    let mut entered_impl = false;
    if kind == "impl_item" {
        impl_type_stack.push(impl_type_ident(bytes, node).unwrap_or_else(|| "_".to_string()));
        entered_impl = true;
    }

    if let Some(symbol_kind) = symbol_kind_for(kind, current_impl_type(impl_type_stack).is_some_and(|t| t != "_"))
    {
        if let Some(name) = node.child_by_field_name("name").and_then(|n| last_ident_of(bytes, n)) {
            let mut scoped = join_scope(module_stack);
            if matches!(symbol_kind, SymbolKind::Method) {
                if let Some(ty) = current_impl_type(impl_type_stack) {
                    scoped.push_str("::");
                    scoped.push_str(ty);
                }
            }
            scoped.push_str("::");
            scoped.push_str(&name);

            let pos = node.start_position();
            let params = if matches!(symbol_kind, SymbolKind::Function | SymbolKind::Method) {
                extract_params(bytes, node)
            } else {
                Vec::new()
            };
            let returns = if matches!(symbol_kind, SymbolKind::Function | SymbolKind::Method) {
                extract_returns(bytes, node)
            } else {
                Vec::new()
            };
            let fields = if kind == "struct_item" { extract_struct_fields(bytes, node) } else { Vec::new() };
            let methods = if kind == "trait_item" { extract_trait_methods(bytes, node) } else { Vec::new() };

            // Methods are named "RecvType.Method" so the graph builder's
            // callee-name resolution and interface-implementation check can
            // recover both the receiver type and the bare method name from
            // a single field.
            let display_name = if matches!(symbol_kind, SymbolKind::Method) {
                match current_impl_type(impl_type_stack) {
                    Some(ty) if ty != "_" => format!("{ty}.{name}"),
                    _ => name.clone(),
                }
            } else {
                name.clone()
            };

            symbols.push(RawSymbol {
                name: display_name,
                scoped_name: scoped,
                kind: symbol_kind,
                line: pos.row as u32 + 1,
                column: pos.column as u32,
                signature: signature_text(bytes, node),
                doc: extract_doc_comments(bytes, node),
                public: is_public(node),
                params,
                returns,
                fields,
                methods,
            });
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_symbols(child, bytes, module_stack, impl_type_stack, symbols);
        }
    }

    if entered_impl {
        impl_type_stack.pop();
    }
    if entered_mod {
        module_stack.pop();
    }
}

// ============================================================================
// Call extraction walker
// ============================================================================

fn walk_calls(
    node: Node,
    bytes: &[u8],
    module_stack: &mut Vec<String>,
    impl_type_stack: &mut Vec<String>,
    fn_scope_stack: &mut Vec<String>,
    calls: &mut Vec<RawCall>,
) {
    let kind = node.kind();

    let mut entered_mod = false;
    if kind == "mod_item" && node.child_by_field_name("body").is_some() {
        if let Some(name) = node.child_by_field_name("name").and_then(|n| last_ident_of(bytes, n)) {
            module_stack.push(name);
            entered_mod = true;
        }
    }

    let mut entered_impl = false;
    if kind == "impl_item" {
        impl_type_stack.push(impl_type_ident(bytes, node).unwrap_or_else(|| "_".to_string()));
        entered_impl = true;
    }

    let mut entered_fn = false;
    if kind == "function_item" {
        if let Some(fn_name) = node.child_by_field_name("name").and_then(|n| last_ident_of(bytes, n)) {
            let mut scoped = join_scope(module_stack);
            if let Some(ty) = current_impl_type(impl_type_stack) {
                if ty != "_" {
                    scoped.push_str("::");
                    scoped.push_str(ty);
                }
            }
            scoped.push_str("::");
            scoped.push_str(&fn_name);
            fn_scope_stack.push(scoped);
            entered_fn = true;
        }
    }

    if kind == "call_expression" {
        if let Some(fun) = node.child_by_field_name("function") {
            if let Some(callee) = last_ident_of(bytes, fun) {
                let caller = fn_scope_stack.last().cloned().unwrap_or_else(|| "crate::<toplevel>".to_string());
                calls.push(RawCall { caller, callee_name: callee });
            }
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_calls(child, bytes, module_stack, impl_type_stack, fn_scope_stack, calls);
        }
    }

    if entered_fn {
        fn_scope_stack.pop();
    }
    if entered_impl {
        impl_type_stack.pop();
    }
    if entered_mod {
        module_stack.pop();
    }
}

// ============================================================================
// Import extraction walker
// ============================================================================

fn walk_imports(node: Node, bytes: &[u8], imports: &mut Vec<String>) {
    if node.kind() == "use_declaration" {
        if let Some(arg_node) = node.child_by_field_name("argument") {
            extract_use_tree(arg_node, bytes, "", imports);
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_imports(child, bytes, imports);
        }
    }
}

fn extract_use_tree(node: Node, bytes: &[u8], prefix: &str, imports: &mut Vec<String>) {
    match node.kind() {
        "scoped_identifier" | "identifier" => {
            let text = node_text(bytes, node);
            let full_path = if prefix.is_empty() { text.to_string() } else { format!("{prefix}::{text}") };
            imports.push(full_path);
        }

        "use_as_clause" => {
            if let Some(path_node) = node.child_by_field_name("path") {
                let path_text = node_text(bytes, path_node);
                let full_path = if prefix.is_empty() { path_text.to_string() } else { format!("{prefix}::{path_text}") };
                imports.push(full_path);
            }
        }

        "use_wildcard" => {
            let full_text = node_text(bytes, node);
            if let Some(path_part) = full_text.strip_suffix("::*") {
                let full_path = if prefix.is_empty() { path_part.to_string() } else { format!("{prefix}::{path_part}") };
                imports.push(format!("{full_path}::*"));
            } else if !prefix.is_empty() {
                imports.push(format!("{prefix}::*"));
            }
        }

        "scoped_use_list" => {
            if let Some(path_node) = node.child_by_field_name("path") {
                let path_text = node_text(bytes, path_node);
                let new_prefix = if prefix.is_empty() { path_text.to_string() } else { format!("{prefix}::{path_text}") };
                if let Some(list_node) = node.child_by_field_name("list") {
                    for i in 0..list_node.child_count() {
                        if let Some(child) = list_node.child(i) {
                            extract_use_tree(child, bytes, &new_prefix, imports);
                        }
                    }
                }
            }
        }

        "use_list" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    extract_use_tree(child, bytes, prefix, imports);
                }
            }
        }

        _ => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    extract_use_tree(child, bytes, prefix, imports);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(source: &str) -> (RustParser, Tree) {
        let rust_parser = RustParser::new();
        let mut parser = Parser::new();
        parser.set_language(&rust_parser.language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        (rust_parser, tree)
    }

    #[test]
    fn extracts_struct_and_functions() {
        let source = r#"
use std::collections::HashMap;

/// A test struct
pub struct MyStruct {
    value: i32,
}

impl MyStruct {
    pub fn new(value: i32) -> Self {
        Self { value }
    }

    fn internal(&self) -> i32 {
        self.value
    }
}

pub fn public_function(x: i32) -> i32 {
    x + 1
}
"#;
        let (parser, tree) = parse(source);
        let symbols = parser.extract_symbols(&tree, source, Path::new("test.rs")).unwrap();

        let my_struct = symbols.iter().find(|s| s.name == "MyStruct").unwrap();
        assert_eq!(my_struct.kind, SymbolKind::Struct);
        assert_eq!(my_struct.fields[0].name, "value");
        assert!(my_struct.doc.as_deref().unwrap().contains("test struct"));

        let new_fn = symbols.iter().find(|s| s.name == "MyStruct.new").unwrap();
        assert_eq!(new_fn.kind, SymbolKind::Method);
        assert_eq!(new_fn.params[0].name, "value");

        let public_fn = symbols.iter().find(|s| s.name == "public_function").unwrap();
        assert_eq!(public_fn.kind, SymbolKind::Function);
        assert!(public_fn.public);
    }

    #[test]
    fn extracts_call_edges() {
        let source = r#"
fn caller() {
    callee();
    another_fn(1, 2);
}

fn callee() {}

fn another_fn(a: i32, b: i32) {}
"#;
        let (parser, tree) = parse(source);
        let calls = parser.extract_calls(&tree, source, Path::new("test.rs")).unwrap();

        assert!(calls.iter().any(|c| c.callee_name == "callee" && c.caller == "crate::caller"));
        assert!(calls.iter().any(|c| c.callee_name == "another_fn"));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn extracts_imports_including_globs_and_aliases() {
        let source = r#"
use std::collections::HashMap;
use std::io::{Read, Write};
use super::*;
use crate::types::Symbol as Sym;
"#;
        let (parser, tree) = parse(source);
        let imports = parser.extract_imports(&tree, source, Path::new("test.rs")).unwrap();

        assert!(imports.iter().any(|i| i.contains("HashMap")));
        assert!(imports.iter().any(|i| i.ends_with("Read")));
        assert!(imports.iter().any(|i| i.ends_with("Write")));
        assert!(imports.iter().any(|i| i.ends_with("::*")));
        assert!(imports.iter().any(|i| i.contains("Symbol")));
    }

    #[test]
    fn scopes_methods_under_module_and_impl_type() {
        let source = r#"
pub mod my_module {
    pub struct Foo;

    impl Foo {
        pub fn bar(&self) {}
    }
}
"#;
        let (parser, tree) = parse(source);
        let symbols = parser.extract_symbols(&tree, source, Path::new("test.rs")).unwrap();

        let bar = symbols.iter().find(|s| s.name == "Foo.bar").unwrap();
        assert_eq!(bar.scoped_name, "crate::my_module::Foo::bar");
    }
}
