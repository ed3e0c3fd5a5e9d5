pub mod geometry;
pub mod metrics;

use crate::routing::structs::metrics::RouteStats;
use serde::Serialize;

/// A completed route, in the format which is returned to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub path: Vec<(f64, f64)>,
    pub stats: RouteStats,
}
