//! Graph Builder (component C6): derives the call/dependency graph from a
//! symbol snapshot.
//!
//! `build` is a pure function of its input: calling it twice on the same
//! symbol set yields equal nodes and edges. Internally backed by
//! `petgraph::stable_graph::StableDiGraph`.

use crate::types::{EdgeType, GraphEdge, GraphNode, Symbol, SymbolKind};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{HashMap, HashSet};

/// The built call/dependency graph. Readers only ever see a fully-built
/// graph: construct a new one and swap it in under a reader-writer lock
/// at the call site rather than mutating in place.
pub struct Graph {
    inner: StableDiGraph<String, EdgeType>,
    index_of: HashMap<String, NodeIndex>,
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, Vec<GraphEdge>>,
}

/// Direction to traverse in `transitive`/`impact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseDirection {
    Upstream,   // callers / dependents
    Downstream, // callees / dependencies
}

/// Result of an impact analysis.
#[derive(Debug, Clone, Default)]
pub struct Impact {
    pub direct_calls: Vec<String>,
    pub direct_callers: Vec<String>,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    pub transitive_up: Vec<String>,
    pub transitive_down: Vec<String>,
}

impl Graph {
    /// Build a graph from a full symbol snapshot in two passes: nodes
    /// first, then edges once every id is known.
    pub fn build(symbols: &HashMap<String, Symbol>) -> Self {
        let mut inner = StableDiGraph::new();
        let mut index_of = HashMap::new();

        // Pass 1: one node per symbol.
        for id in symbols.keys() {
            let idx = inner.add_node(id.clone());
            index_of.insert(id.clone(), idx);
        }

        // Index by bare name (and last dotted component) for callee
        // resolution, since `calls` entries are unqualified.
        let mut by_name: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut by_last_component: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, symbol) in symbols {
            by_name.entry(symbol.name.as_str()).or_default().push(id.as_str());
            let last = symbol.name.rsplit('.').next().unwrap_or(&symbol.name);
            by_last_component.entry(last).or_default().push(id.as_str());
        }

        let mut edges: HashMap<String, Vec<GraphEdge>> = HashMap::new();

        for (id, symbol) in symbols {
            // `calls` edges.
            if matches!(symbol.kind, SymbolKind::Function | SymbolKind::Method) {
                for callee_name in &symbol.calls {
                    let targets = by_name
                        .get(callee_name.as_str())
                        .or_else(|| by_last_component.get(callee_name.as_str()));
                    if let Some(targets) = targets {
                        for target in targets {
                            if *target == id.as_str() {
                                continue;
                            }
                            push_edge(
                                &mut inner,
                                &index_of,
                                &mut edges,
                                id,
                                target,
                                EdgeType::Calls,
                                1.0,
                                None,
                            );
                        }
                    }
                }
            }

            // `embeds` edges: Rust's nearest analogue to Go's embedded
            // fields is an unnamed tuple-struct field whose type names
            // another known symbol.
            if symbol.kind == SymbolKind::Struct {
                for field in &symbol.fields {
                    if is_positional_field(&field.name) {
                        let ty_name = base_type_name(&field.ty);
                        if let Some(targets) = by_name.get(ty_name.as_str()) {
                            for target in targets {
                                if *target == id.as_str() {
                                    continue;
                                }
                                push_edge(
                                    &mut inner,
                                    &index_of,
                                    &mut edges,
                                    id,
                                    target,
                                    EdgeType::Embeds,
                                    2.0,
                                    None,
                                );
                            }
                        }
                    }
                }
            }

            // `depends_on` edges: one per import resolved against another
            // symbol's package.
            for import_path in &symbol.imports {
                let imported_package = import_path.rsplit("::").nth(1).unwrap_or(import_path);
                for (other_id, other_symbol) in symbols {
                    if other_id == id {
                        continue;
                    }
                    if other_symbol.package == imported_package {
                        push_edge(
                            &mut inner,
                            &index_of,
                            &mut edges,
                            id,
                            other_id,
                            EdgeType::DependsOn,
                            1.0,
                            None,
                        );
                    }
                }
            }
        }

        // `implements` edges: one per (struct, interface) pair where the
        // struct's method-name set is a superset of the interface's
        // declared method set. Name comparison only, not signature
        // comparison — an approximation that can over-match overloaded
        // method names.
        for (iface_id, iface) in symbols {
            if iface.kind != SymbolKind::Interface {
                continue;
            }
            let required: HashSet<&str> = iface.methods.iter().map(|m| m.as_str()).collect();
            if required.is_empty() {
                continue;
            }
            for (struct_id, _) in symbols {
                if struct_id == iface_id {
                    continue;
                }
                let struct_methods = methods_of(symbols, struct_id);
                if required.is_subset(&struct_methods) {
                    push_edge(
                        &mut inner,
                        &index_of,
                        &mut edges,
                        struct_id,
                        iface_id,
                        EdgeType::Implements,
                        1.0,
                        None,
                    );
                }
            }
        }

        let nodes = build_node_metrics(symbols, &edges);

        Self { inner, index_of, nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges_from(&self, id: &str) -> &[GraphEdge] {
        self.edges.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Callees of `id` (targets of its outgoing `calls` edges), sorted.
    pub fn callees(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges_from(id)
            .iter()
            .filter(|e| e.edge_type == EdgeType::Calls)
            .map(|e| e.to.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Callers of `id` (symbols with an outgoing `calls` edge to it), sorted.
    pub fn callers(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .values()
            .flatten()
            .filter(|e| e.edge_type == EdgeType::Calls && e.to == id)
            .map(|e| e.from.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Derived call graph: symbol id -> ordered sequence of callee ids,
    /// filtered down to `calls` edges.
    pub fn call_graph(&self) -> HashMap<String, Vec<String>> {
        self.nodes.keys().map(|id| (id.clone(), self.callees(id))).collect()
    }

    pub fn upstream_deps(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .values()
            .flatten()
            .filter(|e| e.edge_type == EdgeType::DependsOn && e.to == id)
            .map(|e| e.from.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn downstream_deps(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges_from(id)
            .iter()
            .filter(|e| e.edge_type == EdgeType::DependsOn)
            .map(|e| e.to.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Transitive closure of callers (`Upstream`) or callees
    /// (`Downstream`) from `id`, bounded by `max_depth`. DFS with a
    /// visited set: a revisited node is dropped, not followed again, so
    /// cycles terminate. Deterministic: sorted on exit.
    pub fn transitive(&self, id: &str, direction: TraverseDirection, max_depth: usize) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut reachable = HashSet::new();
        self.transitive_inner(id, direction, max_depth, &mut visited, &mut reachable);
        let mut out: Vec<String> = reachable.into_iter().collect();
        out.sort();
        out
    }

    /// `visited` guards recursion (a node's outgoing edges are expanded at
    /// most once); `reachable` is the output set. The two are kept separate
    /// so that a cycle back to the start node still counts as reachable —
    /// it's the revisiting edge that gets dropped, not the node's
    /// reachability — without looping forever.
    fn transitive_inner(
        &self,
        id: &str,
        direction: TraverseDirection,
        depth_remaining: usize,
        visited: &mut HashSet<String>,
        reachable: &mut HashSet<String>,
    ) {
        if depth_remaining == 0 || !visited.insert(id.to_string()) {
            return;
        }
        let next = match direction {
            TraverseDirection::Upstream => self.callers(id),
            TraverseDirection::Downstream => self.callees(id),
        };
        for n in next {
            reachable.insert(n.clone());
            self.transitive_inner(&n, direction, depth_remaining - 1, visited, reachable);
        }
    }

    /// Impact analysis: direct and transitive callers/callees up to
    /// `max_depth`.
    pub fn impact(&self, id: &str, max_depth: usize) -> Impact {
        Impact {
            direct_calls: self.callees(id),
            direct_callers: self.callers(id),
            upstream: self.upstream_deps(id),
            downstream: self.downstream_deps(id),
            transitive_up: self.transitive(id, TraverseDirection::Upstream, max_depth),
            transitive_down: self.transitive(id, TraverseDirection::Downstream, max_depth),
        }
    }
}

fn push_edge(
    inner: &mut StableDiGraph<String, EdgeType>,
    index_of: &HashMap<String, NodeIndex>,
    edges: &mut HashMap<String, Vec<GraphEdge>>,
    from: &str,
    to: &str,
    edge_type: EdgeType,
    weight: f32,
    location: Option<String>,
) {
    // A missing target silently drops the edge rather than creating a
    // phantom node.
    let (Some(&from_idx), Some(&to_idx)) = (index_of.get(from), index_of.get(to)) else {
        return;
    };
    inner.add_edge(from_idx, to_idx, edge_type);
    edges.entry(from.to_string()).or_default().push(GraphEdge {
        from: from.to_string(),
        to: to.to_string(),
        edge_type,
        weight,
        location,
    });
}

fn is_positional_field(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

fn base_type_name(ty: &str) -> String {
    ty.trim_start_matches('&').trim_start_matches("mut ").trim().split('<').next().unwrap_or(ty).to_string()
}

/// Method names belonging to a struct/type: method symbols whose
/// `RecvType.Method` name's receiver component matches another symbol's
/// bare name. A plain string match, since the naming convention already
/// encodes the receiver — no extra field needed.
fn methods_of(symbols: &HashMap<String, Symbol>, owner_id: &str) -> HashSet<String> {
    let Some(owner) = symbols.get(owner_id) else { return HashSet::new() };
    symbols
        .values()
        .filter(|s| s.kind == SymbolKind::Method && s.package == owner.package)
        .filter_map(|s| {
            let (recv, method) = s.name.split_once('.')?;
            (recv == owner.name).then(|| method.to_string())
        })
        .collect()
}

fn build_node_metrics(
    symbols: &HashMap<String, Symbol>,
    edges: &HashMap<String, Vec<GraphEdge>>,
) -> HashMap<String, GraphNode> {
    let mut called_by: HashMap<&str, u32> = HashMap::new();
    for edge_list in edges.values() {
        for edge in edge_list {
            if edge.edge_type == EdgeType::Calls {
                *called_by.entry(edge.to.as_str()).or_default() += 1;
            }
        }
    }

    symbols
        .iter()
        .map(|(id, symbol)| {
            let call_count =
                edges.get(id).map(|es| es.iter().filter(|e| e.edge_type == EdgeType::Calls).count()).unwrap_or(0)
                    as u32;
            let node = GraphNode {
                id: id.clone(),
                call_count,
                called_by: called_by.get(id.as_str()).copied().unwrap_or(0),
                cyclomatic: cyclomatic_estimate(&symbol.signature),
            };
            (id.clone(), node)
        })
        .collect()
}

/// Heuristic cyclomatic complexity from signature tokens: count of
/// branch/loop keywords and boolean operators. Advisory only.
fn cyclomatic_estimate(signature: &str) -> u32 {
    let mut count = 1u32;
    for keyword in ["if", "for", "range", "switch", "select"] {
        count += signature.matches(keyword).count() as u32;
    }
    count += signature.matches("&&").count() as u32;
    count += signature.matches("||").count() as u32;
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Param;
    use std::path::PathBuf;

    fn sym(id: &str, name: &str, kind: SymbolKind, calls: Vec<&str>) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            package: "p".to_string(),
            file: PathBuf::from("a.rs"),
            line: 1,
            column: 0,
            signature: format!("fn {name}()"),
            doc: None,
            public: true,
            imports: vec![],
            calls: calls.into_iter().map(String::from).collect(),
            callers: vec![],
            params: vec![],
            returns: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn call_graph_tracks_callers_and_callees() {
        let mut symbols = HashMap::new();
        symbols.insert("p:Foo:2".to_string(), sym("p:Foo:2", "Foo", SymbolKind::Function, vec!["Bar"]));
        symbols.insert("p:Bar:3".to_string(), sym("p:Bar:3", "Bar", SymbolKind::Function, vec![]));

        let graph = Graph::build(&symbols);
        assert_eq!(graph.callees("p:Foo:2"), vec!["p:Bar:3".to_string()]);
        assert_eq!(graph.callers("p:Bar:3"), vec!["p:Foo:2".to_string()]);
        assert!(graph.callers("p:Foo:2").is_empty());
    }

    #[test]
    fn build_is_deterministic() {
        let mut symbols = HashMap::new();
        symbols.insert("p:Foo:2".to_string(), sym("p:Foo:2", "Foo", SymbolKind::Function, vec!["Bar"]));
        symbols.insert("p:Bar:3".to_string(), sym("p:Bar:3", "Bar", SymbolKind::Function, vec![]));

        let g1 = Graph::build(&symbols);
        let g2 = Graph::build(&symbols);
        assert_eq!(g1.callees("p:Foo:2"), g2.callees("p:Foo:2"));
        assert_eq!(g1.node_count(), g2.node_count());
    }

    #[test]
    fn missing_callee_drops_edge_without_phantom_node() {
        let mut symbols = HashMap::new();
        symbols.insert("p:Foo:2".to_string(), sym("p:Foo:2", "Foo", SymbolKind::Function, vec!["Nonexistent"]));

        let graph = Graph::build(&symbols);
        assert!(graph.callees("p:Foo:2").is_empty());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn transitive_handles_cycles_without_infinite_loop() {
        let mut symbols = HashMap::new();
        symbols.insert("p:A:1".to_string(), sym("p:A:1", "A", SymbolKind::Function, vec!["B"]));
        symbols.insert("p:B:2".to_string(), sym("p:B:2", "B", SymbolKind::Function, vec!["A"]));

        let graph = Graph::build(&symbols);
        let down = graph.transitive("p:A:1", TraverseDirection::Downstream, 10);
        assert_eq!(down, vec!["p:A:1".to_string(), "p:B:2".to_string()]);
    }

    #[test]
    fn implements_edge_when_struct_method_set_is_superset() {
        let mut symbols = HashMap::new();
        let mut iface = sym("p:Greeter:1", "Greeter", SymbolKind::Interface, vec![]);
        iface.methods = vec!["greet".to_string()];
        symbols.insert(iface.id.clone(), iface);

        let strukt = sym("p:Person:2", "Person", SymbolKind::Struct, vec![]);
        symbols.insert(strukt.id.clone(), strukt);

        let mut method = sym("p:Person.greet:3", "Person.greet", SymbolKind::Method, vec![]);
        method.params = vec![Param { name: "self".to_string(), ty: "&self".to_string() }];
        symbols.insert(method.id.clone(), method);

        let graph = Graph::build(&symbols);
        let edges = graph.edges_from("p:Person:2");
        assert!(edges.iter().any(|e| e.edge_type == EdgeType::Implements && e.to == "p:Greeter:1"));
    }
}
