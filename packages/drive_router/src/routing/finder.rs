use crate::loading::petgraph::find_nearest_node;
use crate::loading::store::GraphSnapshot;
use crate::routing::nearest::{NearestNodeCache, Snap};
use geo::Point;
use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use tracing::debug;

/// Resolves coordinates to graph nodes and finds the fastest path between
/// them. Shared between all requests.
#[derive(Debug)]
pub struct RouteFinder {
    cache: NearestNodeCache,
    max_snap_distance: f64,
}

impl RouteFinder {
    pub fn new(cache_capacity: usize, max_snap_distance: f64) -> Self {
        RouteFinder {
            cache: NearestNodeCache::new(cache_capacity),
            max_snap_distance,
        }
    }

    pub fn cache(&self) -> &NearestNodeCache {
        &self.cache
    }

    /// Find the node closest to the provided point. Points which are further
    /// from the road network than the maximum snapping distance don't map to
    /// any node.
    pub fn nearest_node(&self, snapshot: &GraphSnapshot, point: Point) -> Option<NodeIndex> {
        let snap = self
            .cache
            .get_or_insert_with(snapshot.generation, point, || {
                find_nearest_node(&snapshot.graph, point)
                    .map(|(node, distance)| Snap { node, distance })
            })?;

        if snap.distance > self.max_snap_distance {
            debug!(
                "({}, {}) is {:.0}m from the nearest road, ignoring",
                point.y(),
                point.x(),
                snap.distance
            );
            return None;
        }
        Some(snap.node)
    }

    /// Find the path between the two points which minimises the total travel
    /// time. The path starts at the node nearest the origin and ends at the
    /// node nearest the destination. Returns None if either point can't be
    /// placed on the network, or if no path connects them.
    pub fn shortest_path(
        &self,
        snapshot: &GraphSnapshot,
        origin: Point,
        destination: Point,
    ) -> Option<Vec<NodeIndex>> {
        let start = self.nearest_node(snapshot, origin)?;
        let end = self.nearest_node(snapshot, destination)?;

        // A zero heuristic makes this equivalent to Dijkstra, but astar also
        // returns the path taken
        let (cost, path) = astar(
            &snapshot.graph,
            start,
            |inx| inx == end,
            |edge| edge.weight().travel_time,
            |_| 0.0,
        )?;

        debug!(
            "Path from {:?} to {:?}: {} nodes, {:.1}s",
            start,
            end,
            path.len(),
            cost
        );
        Some(path)
    }
}
