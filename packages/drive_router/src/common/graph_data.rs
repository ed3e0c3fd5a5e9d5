//! Defines the data which is stored as weights in the petgraph graph. Every
//! attribute is populated while the graph is being built, so nothing
//! downstream of the loading module needs to deal with missing values.

use petgraph::{Directed, Graph};
use serde::{Deserialize, Serialize};

/// Speed assumed for any road which has no usable maxspeed tag, in km/h
pub const DEFAULT_SPEED_KMH: f64 = 30.0;

/// The road network used for routing. Nodes are junctions (or intermediate
/// points along a way), edges are the road segments connecting them.
pub type RoadGraph = Graph<NodeData, EdgeData, Directed, u32>;

/// Position of a single OSM node which appears in at least one drivable way
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

impl NodeData {
    /// The position of this node as a (lat, lon) tuple, which is the order
    /// used by the HTTP API and the map renderer
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Container for the metadata of a single road segment. `maxspeed` has
/// already been normalised to km/h, and `travel_time` is derived from it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub src: i64,
    pub dst: i64,
    pub highway: String,
    /// Length of the segment in metres
    pub length: f64,
    /// Speed limit in km/h
    pub maxspeed: f64,
    /// Time taken to traverse the segment in seconds
    pub travel_time: f64,
}

impl EdgeData {
    /// Create a new edge, deriving the travel time from the length and the
    /// (already normalised) speed
    pub fn new(
        src: i64,
        dst: i64,
        highway: String,
        length: f64,
        maxspeed: f64,
    ) -> EdgeData {
        EdgeData {
            src,
            dst,
            highway,
            length,
            maxspeed,
            travel_time: travel_time(length, maxspeed),
        }
    }
}

/// Convert a length in metres and a speed in km/h into the number of seconds
/// required to cover that distance
pub fn travel_time(length_m: f64, speed_kmh: f64) -> f64 {
    length_m / (speed_kmh * 1000.0 / 3600.0)
}
