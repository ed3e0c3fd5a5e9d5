//! Defines the struct which contains the physical geometry of a route (i.e.
//! the points it visits)

use crate::common::graph_data::RoadGraph;
use petgraph::graph::NodeIndex;
use serde::Serialize;

/// Stores the geometry of a route as (lat, lon) pairs, in the order they are
/// visited
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteGeometry {
    pub coords: Vec<(f64, f64)>,
}

impl RouteGeometry {
    /// Resolve every node in the path to its position. Returns the index of
    /// the first node which isn't in the graph on failure.
    pub fn from_path(graph: &RoadGraph, path: &[NodeIndex]) -> Result<RouteGeometry, NodeIndex> {
        let coords = path
            .iter()
            .map(|inx| graph.node_weight(*inx).map(|n| n.coords()).ok_or(*inx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RouteGeometry { coords })
    }

    pub fn start(&self) -> Option<(f64, f64)> {
        self.coords.first().copied()
    }

    pub fn end(&self) -> Option<(f64, f64)> {
        self.coords.last().copied()
    }
}
