//! `codeindex` — a thin CLI over the library crate, wiring the five root
//! handles (`Indexer`, `EmbeddingEngine`, `QueryEngine`, `DeltaHandler`,
//! `FileWatcher`) end-to-end for manual exercising. This binary is CLI
//! glue, not part of the engine's contract.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeindex_engine::cancel::CancellationToken;
use codeindex_engine::config::Config;
use codeindex_engine::delta::DeltaHandler;
use codeindex_engine::embedding::provider_from_config;
use codeindex_engine::embedding_engine::EmbeddingEngine;
use codeindex_engine::graph::{Graph, TraverseDirection};
use codeindex_engine::indexer::Indexer;
use codeindex_engine::query::{QueryEngine, QueryKind, QueryRequest};
use codeindex_engine::store::Store;
use codeindex_engine::types::{DeltaBatch, Symbol};
use codeindex_engine::watcher::FileWatcher;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "codeindex", about = "Local code-intelligence engine CLI")]
struct Cli {
    /// Path to the on-disk database; overrides DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a directory from scratch.
    Index {
        /// Root directory to index.
        root: PathBuf,
    },
    /// Apply add/modify/remove file paths as one delta batch.
    Reindex {
        #[arg(long = "add")]
        added: Vec<PathBuf>,
        #[arg(long = "modify")]
        modified: Vec<PathBuf>,
        #[arg(long = "remove")]
        removed: Vec<PathBuf>,
        /// Root used to derive each file's package name.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Watch a directory and keep the index coherent with it.
    Watch {
        root: PathBuf,
    },
    /// Run a hybrid (lexical + semantic + graph) query.
    Query {
        query: String,
        #[arg(long, default_value = "all")]
        kind: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Look up one symbol by id or name.
    Symbol {
        id_or_name: String,
    },
    /// List the symbols a symbol calls.
    Callees {
        name: String,
    },
    /// List the symbols that call a symbol.
    Callers {
        name: String,
    },
}

fn db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| config.db_path.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let path = db_path(&cli, &config);
    let store = Store::open(&path).context("opening symbol/embedding store")?;
    let provider = provider_from_config(&config);
    let embeddings = EmbeddingEngine::new(provider);

    match cli.command {
        Command::Index { root } => {
            let indexer = Indexer::new(&store, &embeddings);
            let token = CancellationToken::new();
            let summary = indexer.index_directory(&root, &token).await?;
            println!("indexed {} files, {} symbols", summary.files_indexed, summary.symbols_indexed);
        }
        Command::Reindex { added, modified, removed, root } => {
            let handler = DeltaHandler::new(&store, &embeddings, &root);
            handler.process(&DeltaBatch { added, modified, removed }).await?;
            println!("delta batch applied");
        }
        Command::Watch { root } => {
            let store = Arc::new(store);
            let embeddings = Arc::new(embeddings);
            let cache = Arc::new(codeindex_engine::cache::Cache::new(config.cache_ttl, config.cache_capacity));
            let mut watcher = FileWatcher::new(
                vec![root],
                store,
                embeddings,
                cache,
                config.debounce_delay,
                config.batch_size,
            );
            watcher.start()?;
            println!("watching; press ctrl-c to stop");
            tokio::signal::ctrl_c().await.ok();
            watcher.stop().await;
        }
        Command::Query { query, kind, limit, json } => {
            let engine = QueryEngine::new(&store, embeddings.provider());
            let request = QueryRequest { query, kind: parse_kind(&kind), limit, ..QueryRequest::default() };
            let results = engine.search(&request).await?;
            print_results(&results, json);
        }
        Command::Symbol { id_or_name } => match store.get_symbol(&id_or_name)? {
            Some(symbol) => print_symbol(&symbol),
            None => println!("no symbol found for `{id_or_name}`"),
        },
        Command::Callees { name } => print_graph_direction(&store, &name, TraverseDirection::Downstream)?,
        Command::Callers { name } => print_graph_direction(&store, &name, TraverseDirection::Upstream)?,
    }

    Ok(())
}

fn parse_kind(s: &str) -> QueryKind {
    match s {
        "semantic" => QueryKind::Semantic,
        "text" => QueryKind::Text,
        "graph" => QueryKind::Graph,
        _ => QueryKind::All,
    }
}

fn print_symbol(symbol: &Symbol) {
    println!("{} ({}) — {}:{}", symbol.name, symbol.kind.as_str(), symbol.file.display(), symbol.line);
    println!("  {}", symbol.signature);
    if let Some(doc) = &symbol.doc {
        println!("  doc: {doc}");
    }
}

fn print_results(results: &[codeindex_engine::query::QueryResult], json: bool) {
    if json {
        let rows: Vec<_> = results
            .iter()
            .map(|r| serde_json::json!({ "name": r.symbol.name, "score": r.score, "location": r.location }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
        return;
    }
    for result in results {
        println!("{:.2}  {} ({})  {}", result.score, result.symbol.name, result.location, result.reason);
    }
}

fn print_graph_direction(store: &Store, name: &str, direction: TraverseDirection) -> Result<()> {
    let all = store.all_symbols()?;
    let by_id: HashMap<String, Symbol> = all.into_iter().map(|s| (s.id.clone(), s)).collect();
    let Some((id, _)) = by_id.iter().find(|(_, s)| s.name == name) else {
        println!("no symbol named `{name}`");
        return Ok(());
    };
    let graph = Graph::build(&by_id);
    let related = match direction {
        TraverseDirection::Upstream => graph.callers(id),
        TraverseDirection::Downstream => graph.callees(id),
    };
    for related_id in related {
        if let Some(symbol) = by_id.get(&related_id) {
            println!("{}", symbol.name);
        }
    }
    Ok(())
}
