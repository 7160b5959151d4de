//! File Watcher (component C8): debounced filesystem-change detection
//! that turns raw OS events into `DeltaBatch`es and drives them through
//! the delta handler.

use crate::cache::Cache;
use crate::delta::DeltaHandler;
use crate::discovery::FileDiscovery;
use crate::embedding_engine::EmbeddingEngine;
use crate::store::Store;
use crate::types::DeltaBatch;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// One coalesced change, kept separate from `DeltaBatch`'s add/modify/
/// remove split until the debouncer hands a path to the dispatcher (a
/// path's *current* kind is whatever its last raw event said).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKindSimple {
    AddedOrModified,
    Removed,
}

/// Coalesces events per path: a path is "ready" once no new event for it
/// has arrived for `debounce_delay`.
struct Debouncer {
    pending: HashMap<PathBuf, (Instant, EventKindSimple)>,
    delay: Duration,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self { pending: HashMap::new(), delay }
    }

    fn record(&mut self, path: PathBuf, kind: EventKindSimple) {
        self.pending.insert(path, (Instant::now(), kind));
    }

    fn take_ready(&mut self) -> Vec<(PathBuf, EventKindSimple)> {
        let now = Instant::now();
        let mut ready = Vec::new();
        self.pending.retain(|path, (last, kind)| {
            if now.duration_since(*last) >= self.delay {
                ready.push((path.clone(), *kind));
                false
            } else {
                true
            }
        });
        ready
    }
}

/// Watches a set of roots, debounces and batches change events, and
/// dispatches them through `DeltaHandler`. `start`/`stop` are idempotent.
pub struct FileWatcher {
    roots: Vec<PathBuf>,
    store: Arc<Store>,
    embeddings: Arc<EmbeddingEngine>,
    cache: Arc<Cache>,
    debounce_delay: Duration,
    batch_size: usize,
    tasks: Vec<JoinHandle<()>>,
    shutdown: Option<mpsc::Sender<()>>,
    _watcher: Option<RecommendedWatcher>,
    /// Paths currently being processed by a worker: a path in this set is
    /// not redispatched until its worker finishes.
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileWatcher {
    pub fn new(
        roots: Vec<PathBuf>,
        store: Arc<Store>,
        embeddings: Arc<EmbeddingEngine>,
        cache: Arc<Cache>,
        debounce_delay: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            roots,
            store,
            embeddings,
            cache,
            debounce_delay,
            batch_size,
            tasks: Vec::new(),
            shutdown: None,
            _watcher: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start the watch and debounce tasks. A no-op if already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> crate::error::Result<()> {
        if self.shutdown.is_some() {
            debug!("watcher already running, start() is a no-op");
            return Ok(());
        }

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| crate::error::EngineError::InvariantViolation(format!("watcher init failed: {e}")))?;

        for root in &self.roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| crate::error::EngineError::InvariantViolation(format!("watch {root:?} failed: {e}")))?;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let debounce_delay = self.debounce_delay;
        let batch_size = self.batch_size;
        let store = Arc::clone(&self.store);
        let embeddings = Arc::clone(&self.embeddings);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let roots = self.roots.clone();
        let discovery = FileDiscovery::new();

        let handle = tokio::spawn(async move {
            let mut debouncer = Debouncer::new(debounce_delay);
            let mut sweep = tokio::time::interval(Duration::from_secs(1));

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("file watcher stopping");
                        break;
                    }
                    Some(event) = raw_rx.recv() => {
                        match event {
                            Ok(ev) => handle_raw_event(ev, &discovery, &mut debouncer),
                            Err(err) => warn!(%err, "watcher error event"),
                        }
                    }
                    _ = sweep.tick() => {
                        let ready = debouncer.take_ready();
                        if ready.is_empty() {
                            continue;
                        }
                        for chunk in ready.chunks(batch_size) {
                            dispatch_chunk(
                                chunk.to_vec(),
                                Arc::clone(&store),
                                Arc::clone(&embeddings),
                                Arc::clone(&cache),
                                roots.first().cloned().unwrap_or_default(),
                                Arc::clone(&in_flight),
                            );
                        }
                    }
                }
            }
        });

        self.tasks.push(handle);
        self.shutdown = Some(shutdown_tx);
        self._watcher = Some(watcher);
        Ok(())
    }

    /// Stop the watch and debounce tasks and close the underlying OS
    /// watcher. A no-op if not running.
    pub async fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            debug!("watcher already stopped, stop() is a no-op");
            return;
        };
        let _ = shutdown.send(()).await;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self._watcher = None;
    }
}

fn handle_raw_event(event: Event, discovery: &FileDiscovery, debouncer: &mut Debouncer) {
    let simple_kind = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => EventKindSimple::AddedOrModified,
        EventKind::Remove(_) => EventKindSimple::Removed,
        _ => return,
    };
    for path in event.paths {
        if crate::parsing::parser_for_file(&path).is_none() {
            continue;
        }
        if simple_kind == EventKindSimple::AddedOrModified && !discovery.should_include(&path) {
            continue;
        }
        debouncer.record(path, simple_kind);
    }
}

fn dispatch_chunk(
    chunk: Vec<(PathBuf, EventKindSimple)>,
    store: Arc<Store>,
    embeddings: Arc<EmbeddingEngine>,
    cache: Arc<Cache>,
    root: PathBuf,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
) {
    let claimed: Vec<(PathBuf, EventKindSimple)> = {
        let mut guard = in_flight.lock();
        chunk
            .into_iter()
            .filter(|(path, _)| guard.insert(path.clone()))
            .collect()
    };
    if claimed.is_empty() {
        return;
    }

    tokio::spawn(async move {
        let mut batch = DeltaBatch::default();
        for (path, kind) in &claimed {
            match kind {
                EventKindSimple::AddedOrModified => batch.modified.push(path.clone()),
                EventKindSimple::Removed => batch.removed.push(path.clone()),
            }
        }

        let handler = DeltaHandler::new(&store, &embeddings, &root).with_cache(&cache);
        if let Err(err) = handler.process(&batch).await {
            warn!(%err, "delta batch from watcher failed");
        }

        let mut guard = in_flight.lock();
        for (path, _) in &claimed {
            guard.remove(path);
        }
    });
}
