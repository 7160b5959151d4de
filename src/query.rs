//! Query Engine (component C10): fuses lexical, semantic and graph
//! results against the current store/graph snapshot and ranks them.

use crate::cache::{Cache, CachedValue};
use crate::embedding::EmbeddingProvider;
use crate::embedding_engine::cosine_similarity;
use crate::error::Result;
use crate::graph::{Graph, TraverseDirection};
use crate::store::Store;
use crate::types::{Symbol, SymbolKind};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    #[default]
    All,
    Semantic,
    Text,
    Graph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Semantic,
    Text,
    Graph,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub kind: QueryKind,
    pub limit: usize,
    pub context: Option<String>,
    pub kind_filters: Vec<SymbolKind>,
    pub include_docs: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self { query: String::new(), kind: QueryKind::All, limit: 10, context: None, kind_filters: vec![], include_docs: true }
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub symbol: Symbol,
    pub score: f32,
    pub match_type: MatchType,
    pub location: String,
    pub reason: String,
}

/// Minimum cosine similarity for a semantic hit to be retained.
const SEMANTIC_THRESHOLD: f32 = 0.1;
/// Depth bound for related-symbol collection in graph search.
const GRAPH_SEARCH_DEPTH: usize = 2;

pub struct QueryEngine<'a> {
    store: &'a Store,
    provider: &'a dyn EmbeddingProvider,
    cache: Option<&'a Cache>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { store, provider, cache: None }
    }

    pub fn with_cache(mut self, cache: &'a Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Dispatches to one or all of semantic/text/graph search and fuses
    /// the results.
    #[instrument(skip(self, request), fields(query = %request.query, kind = ?request.kind))]
    pub async fn search(&self, request: &QueryRequest) -> Result<Vec<QueryResult>> {
        let limit = if request.limit == 0 { 10 } else { request.limit };

        let mut semantic = Vec::new();
        let mut text = Vec::new();
        let mut graph = Vec::new();

        match request.kind {
            QueryKind::Semantic => semantic = self.semantic_search(&request.query, limit).await?,
            QueryKind::Text => text = self.text_search(request)?,
            QueryKind::Graph => graph = self.graph_search(request)?,
            QueryKind::All => {
                semantic = self.semantic_search(&request.query, limit).await?;
                text = self.text_search(request)?;
                graph = self.graph_search(request)?;
            }
        }

        let candidates: Vec<QueryResult> = semantic
            .into_iter()
            .chain(text)
            .chain(graph)
            .filter(|r| passes_filters(&r.symbol, &request.kind_filters, request.context.as_deref()))
            .collect();

        let mut fused = fuse(candidates);
        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(limit);
        Ok(fused)
    }

    /// Embed the query, score every stored embedding by cosine similarity,
    /// retain anything above `SEMANTIC_THRESHOLD`.
    async fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let cache_key = Cache::key("semantic", query, limit);
        if let Some(cache) = self.cache {
            if let Some(CachedValue::ScoredSymbols(cached)) = cache.get(&cache_key) {
                return Ok(cached
                    .into_iter()
                    .map(|(score, s)| {
                        let location = location_of(&s);
                        let reason = format!("cached semantic similarity {score:.2}");
                        QueryResult { symbol: s, score, match_type: MatchType::Semantic, location, reason }
                    })
                    .collect());
            }
        }

        let query_vector = self.provider.embed(query).await?;
        let embeddings = self.store.get_all_embeddings()?;
        let mut scored: Vec<(f32, Symbol)> = Vec::new();
        for embedding in embeddings {
            let similarity = cosine_similarity(&query_vector, &embedding.vector);
            if similarity <= SEMANTIC_THRESHOLD {
                continue;
            }
            if let Some(symbol) = self.store.get_symbol(&embedding.id)? {
                scored.push((similarity, symbol));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        if let Some(cache) = self.cache {
            cache.set(cache_key, CachedValue::ScoredSymbols(scored.clone()));
        }

        Ok(scored
            .into_iter()
            .map(|(score, symbol)| {
                let location = location_of(&symbol);
                let reason = format!("semantic similarity {score:.2}");
                QueryResult { symbol, score, match_type: MatchType::Semantic, location, reason }
            })
            .collect())
    }

    /// Translate to an FTS expression and score every hit 1.0 (rank
    /// neutral); an empty query lists all symbols.
    fn text_search(&self, request: &QueryRequest) -> Result<Vec<QueryResult>> {
        let symbols = self.store.search_symbols_text(&request.query, request.limit, request.include_docs)?;
        Ok(symbols
            .into_iter()
            .map(|symbol| {
                let location = location_of(&symbol);
                QueryResult { symbol, score: 1.0, match_type: MatchType::Text, location, reason: "text match".to_string() }
            })
            .collect())
    }

    /// Run text search, then for each hit collect related symbols up to
    /// depth 2 (union of upstream and downstream), scored by direct-edge
    /// weight where one exists.
    fn graph_search(&self, request: &QueryRequest) -> Result<Vec<QueryResult>> {
        let hits = self.store.search_symbols_text(&request.query, request.limit, request.include_docs)?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let all = self.store.all_symbols()?;
        let by_id: HashMap<String, Symbol> = all.into_iter().map(|s| (s.id.clone(), s)).collect();
        let graph = Graph::build(&by_id);

        let mut results = Vec::new();
        for hit in &hits {
            let mut related = graph.transitive(&hit.id, TraverseDirection::Upstream, GRAPH_SEARCH_DEPTH);
            related.extend(graph.transitive(&hit.id, TraverseDirection::Downstream, GRAPH_SEARCH_DEPTH));
            related.sort();
            related.dedup();

            for related_id in related {
                if related_id == hit.id {
                    continue;
                }
                let Some(symbol) = by_id.get(&related_id).cloned() else { continue };
                let weight = direct_edge_weight(&graph, &hit.id, &related_id);
                let score = weight.map(|w| w / 10.0).unwrap_or(0.1);
                let location = location_of(&symbol);
                let reason = format!("graph neighbor of {}", hit.name);
                results.push(QueryResult { symbol, score, match_type: MatchType::Graph, location, reason });
            }
        }
        Ok(results)
    }

    /// Pattern-matched shorthand queries: `"find all X [in Y]"`,
    /// `"A calls"`, `"who calls A"`; anything else falls back to
    /// `search(kind=All)`.
    #[instrument(skip(self))]
    pub async fn advanced(&self, pattern: &str) -> Result<Vec<QueryResult>> {
        let trimmed = pattern.trim();

        if let Some(rest) = trimmed.strip_prefix("find all ") {
            let (what, context) = match rest.split_once(" in ") {
                Some((w, c)) => (w.trim(), Some(c.trim().to_string())),
                None => (rest.trim(), None),
            };
            let kind_filters = parse_kind_filter(what);
            let request = QueryRequest {
                query: what.to_string(),
                kind: QueryKind::Text,
                limit: 50,
                context,
                kind_filters,
                include_docs: true,
            };
            return self.search(&request).await;
        }

        if let Some(name) = trimmed.strip_prefix("who calls ") {
            return self.graph_direction(name.trim(), TraverseDirection::Upstream);
        }

        if let Some(name) = trimmed.strip_suffix(" calls") {
            return self.graph_direction(name.trim(), TraverseDirection::Downstream);
        }

        self.search(&QueryRequest { query: trimmed.to_string(), ..QueryRequest::default() }).await
    }

    fn graph_direction(&self, name: &str, direction: TraverseDirection) -> Result<Vec<QueryResult>> {
        let all = self.store.all_symbols()?;
        let by_id: HashMap<String, Symbol> = all.into_iter().map(|s| (s.id.clone(), s)).collect();
        let Some((id, _)) = by_id.iter().find(|(_, s)| s.name == name) else { return Ok(Vec::new()) };
        let id = id.clone();
        let graph = Graph::build(&by_id);
        let direct = match direction {
            TraverseDirection::Upstream => graph.callers(&id),
            TraverseDirection::Downstream => graph.callees(&id),
        };

        Ok(direct
            .into_iter()
            .filter_map(|related_id| by_id.get(&related_id).cloned())
            .map(|symbol| {
                let location = location_of(&symbol);
                let reason = match direction {
                    TraverseDirection::Upstream => format!("calls {name}"),
                    TraverseDirection::Downstream => format!("called by {name}"),
                };
                QueryResult { symbol, score: 1.0, match_type: MatchType::Graph, location, reason }
            })
            .collect())
    }
}

fn direct_edge_weight(graph: &Graph, from: &str, to: &str) -> Option<f32> {
    if let Some(edge) = graph.edges_from(from).iter().find(|e| e.to == to) {
        return Some(edge.weight);
    }
    graph.edges_from(to).iter().find(|e| e.to == from).map(|e| e.weight)
}

fn location_of(symbol: &Symbol) -> String {
    format!("{}:{}", symbol.file.display(), symbol.line)
}

fn passes_filters(symbol: &Symbol, kind_filters: &[SymbolKind], context: Option<&str>) -> bool {
    if !kind_filters.is_empty() && !kind_filters.contains(&symbol.kind) {
        return false;
    }
    if let Some(context) = context {
        if !symbol.package.contains(context) && !symbol.file.to_string_lossy().contains(context) {
            return false;
        }
    }
    true
}

fn parse_kind_filter(what: &str) -> Vec<SymbolKind> {
    let singular = what.trim().trim_end_matches('s');
    match singular.to_lowercase().as_str() {
        "function" | "func" => vec![SymbolKind::Function],
        "method" => vec![SymbolKind::Method],
        "struct" => vec![SymbolKind::Struct],
        "interface" | "trait" => vec![SymbolKind::Interface],
        "type" => vec![SymbolKind::Type],
        "var" | "variable" => vec![SymbolKind::Var],
        "const" | "constant" => vec![SymbolKind::Const],
        _ => vec![],
    }
}

/// Group by `{symbol.name, symbol.package}`; the first match keeps full
/// weight, each subsequent match of a different type adds half its score
/// and promotes the result to `hybrid`.
fn fuse(candidates: Vec<QueryResult>) -> Vec<QueryResult> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut grouped: HashMap<(String, String), QueryResult> = HashMap::new();

    for candidate in candidates {
        let key = (candidate.symbol.name.clone(), candidate.symbol.package.clone());
        match grouped.get_mut(&key) {
            None => {
                order.push(key.clone());
                grouped.insert(key, candidate);
            }
            Some(existing) => {
                existing.score += 0.5 * candidate.score;
                if existing.match_type != candidate.match_type {
                    existing.match_type = MatchType::Hybrid;
                }
                existing.reason = format!("{}; {}", existing.reason, candidate.reason);
            }
        }
    }

    order.into_iter().filter_map(|key| grouped.remove(&key)).collect()
}
