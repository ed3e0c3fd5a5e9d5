//! Defines the struct which contains high level information about a route
//! (i.e. total distance and travel time)

use crate::common::graph_data::{EdgeData, RoadGraph};
use crate::loading::petgraph::first_edge_between;
use petgraph::graph::NodeIndex;
use serde::Serialize;

/// Container for the overall metrics of a route
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RouteStats {
    /// Sum of edge lengths along the route, in metres
    pub total_distance: f64,
    /// Sum of edge travel times along the route, in seconds
    pub estimated_time: f64,
}

impl RouteStats {
    pub fn new() -> RouteStats {
        RouteStats::default()
    }

    /// Update the metrics to reflect their state after traversing the
    /// provided edge
    pub fn take_step(&mut self, edata: &EdgeData) {
        self.total_distance += edata.length;
        self.estimated_time += edata.travel_time;
    }

    /// Walk the provided path, summing the attributes of the edge between each
    /// pair of consecutive nodes. Returns None if any pair is not connected.
    pub fn from_path(graph: &RoadGraph, path: &[NodeIndex]) -> Option<RouteStats> {
        let mut stats = RouteStats::new();
        for pair in path.windows(2) {
            let edata = first_edge_between(graph, pair[0], pair[1])?;
            stats.take_step(edata);
        }
        Some(stats)
    }
}
