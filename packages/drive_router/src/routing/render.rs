//! Produces a self-contained HTML page showing a route on a Leaflet map. The
//! page loads Leaflet and the OpenStreetMap tiles from their public CDNs, so
//! it can be saved or embedded as-is.

use crate::common::template::fill_template;
use crate::loading::store::GraphSnapshot;
use crate::routing::structs::geometry::RouteGeometry;
use geo::Point;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Initial zoom level of the rendered map
pub const ZOOM_START: u8 = 13;

const MAP_TEMPLATE: &str = include_str!("route_map.html");

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("node {0:?} is not in the graph")]
    MissingNode(NodeIndex),
    #[error("route contains a non-finite coordinate")]
    NonFinite,
    #[error("unable to serialise coordinates: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unable to prepare map template: {0}")]
    Template(#[from] aho_corasick::BuildError),
}

/// A rendered map, along with the (lat, lon) coordinates of the route shown
/// on it
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMap {
    pub html: String,
    pub coords: Vec<(f64, f64)>,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RenderError> {
    Ok(serde_json::to_string(value)?)
}

fn is_finite((lat, lon): &(f64, f64)) -> bool {
    lat.is_finite() && lon.is_finite()
}

fn try_render(
    geometry: RouteGeometry,
    origin: Point,
) -> Result<RouteMap, RenderError> {
    let centre = (origin.y(), origin.x());
    if !is_finite(&centre) || !geometry.coords.iter().all(is_finite) {
        return Err(RenderError::NonFinite);
    }

    let (start, end) = match (geometry.start(), geometry.end()) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(RenderError::NonFinite),
    };

    let html = fill_template(
        MAP_TEMPLATE,
        &[
            ("< centre >", to_json(&centre)?),
            ("< zoom >", ZOOM_START.to_string()),
            ("< start >", to_json(&start)?),
            ("< end >", to_json(&end)?),
            ("< coords >", to_json(&geometry.coords)?),
        ],
    )?;

    Ok(RouteMap {
        html,
        coords: geometry.coords,
    })
}

/// Draw the provided path on a map centred on the origin, with a green
/// marker at the start, a red marker at the end and a blue line between
/// them. Returns None for an empty path, or if the map could not be created.
pub fn render(
    snapshot: &GraphSnapshot,
    origin: Point,
    path: &[NodeIndex],
) -> Option<RouteMap> {
    if path.is_empty() {
        return None;
    }

    let result = RouteGeometry::from_path(&snapshot.graph, path)
        .map_err(RenderError::MissingNode)
        .and_then(|geometry| try_render(geometry, origin));

    match result {
        Ok(map) => Some(map),
        Err(e) => {
            error!("Map creation error: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::graph_data::{NodeData, RoadGraph};
    use chrono::Utc;

    fn get_test_snapshot() -> (GraphSnapshot, Vec<NodeIndex>) {
        let mut graph = RoadGraph::default();
        let a = graph.add_node(NodeData { id: 1, lat: 12.97, lon: 77.59 });
        let b = graph.add_node(NodeData { id: 2, lat: 12.98, lon: 77.6 });
        let snapshot = GraphSnapshot {
            graph,
            acquired_at: Utc::now(),
            generation: 1,
        };
        (snapshot, vec![a, b])
    }

    #[test]
    fn test_render() {
        let (snapshot, path) = get_test_snapshot();

        let map = render(&snapshot, (77.591, 12.971).into(), &path).unwrap();

        assert_eq!(map.coords, vec![(12.97, 77.59), (12.98, 77.6)]);
        assert!(map.html.contains("setView([12.971,77.591], 13)"));
        assert!(map.html.contains("L.circleMarker([12.97,77.59]"));
        assert!(map.html.contains("L.circleMarker([12.98,77.6]"));
        assert!(map.html.contains("L.polyline([[12.97,77.59],[12.98,77.6]]"));
        assert!(map.html.contains(r#"color: "blue", weight: 4, opacity: 0.8"#));
        assert!(!map.html.contains("< coords >"));
    }

    #[test]
    fn test_render_empty_path() {
        let (snapshot, _) = get_test_snapshot();

        assert_eq!(render(&snapshot, (77.59, 12.97).into(), &[]), None);
    }

    #[test]
    fn test_render_missing_node() {
        let (snapshot, _) = get_test_snapshot();

        let result = render(&snapshot, (77.59, 12.97).into(), &[NodeIndex::new(9)]);

        assert_eq!(result, None);
    }

    #[test]
    fn test_render_non_finite_origin() {
        let (snapshot, path) = get_test_snapshot();

        assert_eq!(render(&snapshot, (f64::NAN, 12.97).into(), &path), None);
    }
}
