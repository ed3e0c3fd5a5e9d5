//! Ownership of the in-memory road network. The current graph is held as an
//! immutable snapshot behind a reader-writer lock; readers take a clone of
//! the Arc and keep using it for the rest of their request, while a refresh
//! builds a complete replacement before swapping it in.

use crate::common::config::{Region, to_time_delta};
use crate::common::error::{GraphError, GraphResult};
use crate::common::graph_data::RoadGraph;
use crate::loading::cache_file::{CachedGraph, read_cache, write_cache};
use crate::loading::overpass::{AreaQuery, GraphSource};
use crate::loading::petgraph::create_graph;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A road network which is ready to be routed over. Each snapshot installed
/// in a GraphHandle gets a new generation number, which lets caches tell
/// whether their contents refer to the current graph.
#[derive(Debug)]
pub struct GraphSnapshot {
    pub graph: RoadGraph,
    pub acquired_at: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct HandleState {
    current: Option<Arc<GraphSnapshot>>,
    generation: u64,
}

/// Cheaply cloneable reference to the current snapshot, shared between the
/// store and the request handlers
#[derive(Debug, Clone, Default)]
pub struct GraphHandle {
    state: Arc<RwLock<HandleState>>,
}

impl GraphHandle {
    /// The snapshot which requests should currently be using, if any
    pub fn snapshot(&self) -> Option<Arc<GraphSnapshot>> {
        self.state.read().current.clone()
    }

    /// Replace the current snapshot. Anyone still holding the previous one
    /// can keep using it until they drop it.
    pub fn install(&self, graph: RoadGraph, acquired_at: DateTime<Utc>) -> Arc<GraphSnapshot> {
        let mut state = self.state.write();
        state.generation += 1;
        let snapshot = Arc::new(GraphSnapshot {
            graph,
            acquired_at,
            generation: state.generation,
        });
        state.current = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().current.is_none()
    }
}

/// Describes how a call to ensure_fresh was satisfied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshOutcome {
    AlreadyFresh,
    LoadedFromCache,
    Downloaded,
    LoadedStale,
}

/// Loads, downloads, persists and refreshes the road network for a region
pub struct GraphStore<S> {
    source: S,
    handle: GraphHandle,
    region: Region,
    cache_file: PathBuf,
    refresh_interval: Duration,
    refresh_lock: Mutex<()>,
}

impl<S: GraphSource> GraphStore<S> {
    pub fn new(
        source: S,
        region: Region,
        cache_file: PathBuf,
        refresh_interval: Duration,
    ) -> Self {
        GraphStore {
            source,
            handle: GraphHandle::default(),
            region,
            cache_file,
            refresh_interval,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> GraphHandle {
        self.handle.clone()
    }

    /// The graph currently in memory, if one has been loaded
    pub fn graph(&self) -> Option<Arc<GraphSnapshot>> {
        self.handle.snapshot()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn is_expired(&self, acquired_at: DateTime<Utc>) -> bool {
        Utc::now() - acquired_at > to_time_delta(self.refresh_interval)
    }

    /// Check whether the graph is missing or older than the refresh interval
    pub fn needs_refresh(&self) -> bool {
        match self.handle.snapshot() {
            Some(snapshot) => self.is_expired(snapshot.acquired_at),
            None => true,
        }
    }

    /// Make sure an up to date graph is loaded. The cache file is tried
    /// first, then a download by place name, then a download by bounding box.
    /// Only one refresh runs at a time; concurrent callers wait their turn
    /// and will usually find the graph already fresh.
    pub async fn ensure_fresh(&self) -> GraphResult<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        if !self.needs_refresh() {
            return Ok(RefreshOutcome::AlreadyFresh);
        }

        info!("Loading graph from cache or downloading...");
        let stale = match self.load_cache_file().await {
            Ok(cached) if !self.is_expired(cached.acquired_at) => {
                info!(
                    "Graph loaded from cache: {} nodes, {} edges",
                    cached.graph.node_count(),
                    cached.graph.edge_count()
                );
                self.handle.install(cached.graph, cached.acquired_at);
                return Ok(RefreshOutcome::LoadedFromCache);
            }
            Ok(cached) => {
                info!("Cached graph from {} has expired", cached.acquired_at);
                Some(cached)
            }
            Err(e) => {
                warn!("Unable to load graph from {}: {}", self.cache_file.display(), e);
                None
            }
        };

        match self.download().await {
            Ok(graph) => {
                let cached = self
                    .persist(CachedGraph {
                        acquired_at: Utc::now(),
                        graph,
                    })
                    .await?;
                self.handle.install(cached.graph, cached.acquired_at);
                Ok(RefreshOutcome::Downloaded)
            }
            Err(e) => match stale {
                Some(cached) if self.handle.is_empty() => {
                    warn!("Download failed ({}), serving expired graph from cache", e);
                    self.handle.install(cached.graph, cached.acquired_at);
                    Ok(RefreshOutcome::LoadedStale)
                }
                _ => Err(e),
            },
        }
    }

    async fn load_cache_file(&self) -> GraphResult<CachedGraph> {
        let path = self.cache_file.clone();
        let region = self.region.name;
        tokio::task::spawn_blocking(move || read_cache(&path, region)).await?
    }

    /// Write the graph to the cache file. A failure to write is logged but
    /// the graph is handed back regardless, as it is still perfectly usable.
    async fn persist(&self, cached: CachedGraph) -> GraphResult<CachedGraph> {
        let path = self.cache_file.clone();
        let region = self.region.name;
        let (cached, result) = tokio::task::spawn_blocking(move || {
            let result = write_cache(&path, region, &cached);
            (cached, result)
        })
        .await?;

        match result {
            Ok(()) => info!("Graph cached to {}", self.cache_file.display()),
            Err(e) => error!("Unable to cache graph to {}: {}", self.cache_file.display(), e),
        }

        Ok(cached)
    }

    /// Download a new graph for the region, falling back to the bounding box
    /// if the place name can't be used
    pub async fn download(&self) -> GraphResult<RoadGraph> {
        info!("Downloading new graph...");
        let place = AreaQuery::Place(self.region.place.clone());
        match self.download_area(&place).await {
            Ok(graph) => Ok(graph),
            Err(e) => {
                warn!("Error downloading graph by place name: {}", e);
                info!("Attempting to download using bounding box...");
                let bbox = AreaQuery::BBox(self.region.bbox);
                self.download_area(&bbox).await.inspect_err(|e| {
                    error!("Error in bbox download: {}", e);
                })
            }
        }
    }

    async fn download_area(&self, area: &AreaQuery) -> GraphResult<RoadGraph> {
        let osm = self.source.fetch(area).await?;
        let graph = tokio::task::spawn_blocking(move || create_graph(&osm)).await?;

        if graph.node_count() == 0 {
            return Err(GraphError::EmptyGraph(area.describe()));
        }

        info!(
            "Built graph for {}: {} nodes, {} edges",
            area.describe(),
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

/// Start the background task which periodically re-checks the graph. It
/// sleeps for the refresh interval, then calls ensure_fresh, forever. Errors
/// are logged and retried on the next cycle.
pub fn spawn_refresher<S: GraphSource>(store: Arc<GraphStore<S>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(store.refresh_interval()).await;
            match store.ensure_fresh().await {
                Ok(outcome) => info!("Periodic graph refresh: {:?}", outcome),
                Err(e) => error!("Periodic graph refresh failed: {}", e),
            }
        }
    })
}
