//! Memoisation of nearest-node lookups. Finding the closest node means
//! checking every node in the graph, so repeat requests for the same
//! coordinates are served from a bounded LRU map instead.
//!
//! Keys are the exact bit patterns of the requested (lat, lng); there is no
//! rounding, so two coordinates a millimetre apart are cached separately.
//! The least recently used entry is evicted when the map is full. Every
//! entry belongs to one graph generation, and the whole map is cleared the
//! first time it is used with a newer graph. Requests still working from an
//! older graph bypass the cache entirely.

use geo::Point;
use indexmap::IndexMap;
use parking_lot::Mutex;
use petgraph::graph::NodeIndex;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type CoordKey = (u64, u64);

/// The node a coordinate snaps to, and how far away it is in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub node: NodeIndex,
    pub distance: f64,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    // Ordered from least to most recently used
    entries: IndexMap<CoordKey, Snap, FxBuildHasher>,
}

impl CacheState {
    /// Drop everything if the entries belong to an older graph. Returns false
    /// if the caller is working with an older graph than the cache, in which
    /// case the cache must not be used at all.
    fn sync_generation(&mut self, generation: u64) -> bool {
        if generation < self.generation {
            return false;
        }
        if generation > self.generation {
            if !self.entries.is_empty() {
                debug!(
                    "Graph generation {} -> {}, dropping {} cached lookups",
                    self.generation,
                    generation,
                    self.entries.len()
                );
            }
            self.entries.clear();
            self.generation = generation;
        }
        true
    }
}

/// Bounded, generation-aware LRU cache of nearest-node lookups
#[derive(Debug)]
pub struct NearestNodeCache {
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn coord_key(point: Point) -> CoordKey {
    (point.y().to_bits(), point.x().to_bits())
}

impl NearestNodeCache {
    pub fn new(capacity: usize) -> Self {
        NearestNodeCache {
            capacity,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a point, marking it as most recently used
    pub fn get(&self, generation: u64, point: Point) -> Option<Snap> {
        let key = coord_key(point);
        let mut state = self.state.lock();
        if !state.sync_generation(generation) {
            return None;
        }

        let snap = state.entries.shift_remove(&key)?;
        state.entries.insert(key, snap);
        Some(snap)
    }

    /// Store the result of a lookup, evicting the least recently used entry
    /// if the cache is full
    pub fn insert(&self, generation: u64, point: Point, snap: Snap) {
        if self.capacity == 0 {
            return;
        }

        let key = coord_key(point);
        let mut state = self.state.lock();
        if !state.sync_generation(generation) {
            return;
        }

        state.entries.shift_remove(&key);
        if state.entries.len() >= self.capacity {
            state.entries.shift_remove_index(0);
        }
        state.entries.insert(key, snap);
    }

    /// Return the cached value for a point, or run the provided search and
    /// remember its result. The lock is not held while searching, so two
    /// threads asking for the same new point may both search. Searches
    /// which find nothing are not cached.
    pub fn get_or_insert_with<F>(&self, generation: u64, point: Point, search: F) -> Option<Snap>
    where
        F: FnOnce() -> Option<Snap>,
    {
        if let Some(snap) = self.get(generation, point) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(snap);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let snap = search()?;
        self.insert(generation, point, snap);
        Some(snap)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of (hits, misses) since the cache was created
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
