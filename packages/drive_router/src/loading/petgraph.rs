use crate::common::graph_data::{
    DEFAULT_SPEED_KMH, EdgeData, NodeData, RoadGraph,
};
use crate::loading::overpass::{MaxSpeed, OsmElement, OsmResponse, OsmTags};
use geo::{Distance, Haversine, Point};
use indicatif::ProgressBar;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Direction(s) in which a way can be travelled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Forward,
    Reverse,
    Both,
}

impl Direction {
    /// Work out the allowed direction of travel from the tags of a way.
    /// Roundabouts are implicitly one-way.
    pub fn from_tags(tags: &OsmTags) -> Direction {
        match tags.oneway.as_deref() {
            Some("yes") | Some("true") | Some("1") => Direction::Forward,
            Some("-1") | Some("reverse") => Direction::Reverse,
            Some(_) => Direction::Both,
            None => match tags.junction.as_deref() {
                Some("roundabout") => Direction::Forward,
                _ => Direction::Both,
            },
        }
    }
}

/// Take the leading number from a speed string, e.g. "40 mph" -> 40. The
/// unit is ignored. OSM multi-values ("40;60") are treated as a list, so only
/// the first value is considered.
fn parse_speed_text(text: &str) -> Option<f64> {
    let first = text.split(';').next()?.trim();
    let numeric: String = first
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse::<f64>().ok()
}

/// Convert the raw maxspeed tag of a way into a speed in km/h. Missing,
/// unparseable and non-positive values all fall back to the default speed.
pub fn normalise_speed(raw: Option<&MaxSpeed>) -> f64 {
    let speed = match raw {
        None => None,
        Some(MaxSpeed::Number(speed)) => Some(*speed),
        Some(MaxSpeed::Text(text)) => parse_speed_text(text),
        Some(MaxSpeed::List(speeds)) => {
            return normalise_speed(speeds.first());
        }
    };

    match speed {
        Some(speed) if speed.is_finite() && speed > 0.0 => speed,
        _ => DEFAULT_SPEED_KMH,
    }
}

/// Nodes in the graph need to have associated lat/lon data. To achieve this,
/// we create a mapping for source IDs as they appear in the OSM data to
/// NodeData structs. As edges are added, these can then be retrieved and added
/// to the graph.
fn generate_node_map(osm: &OsmResponse) -> FxHashMap<i64, NodeData> {
    let mut node_map = FxHashMap::<i64, NodeData>::default();

    for elem in osm.elements.iter().filter(|e| e.elem_type == "node") {
        if let (Some(lat), Some(lon)) = (elem.lat, elem.lon) {
            node_map.insert(
                elem.id,
                NodeData {
                    id: elem.id,
                    lat,
                    lon,
                },
            );
        }
    }

    node_map
}

/// Fetch the graph index for an OSM node, adding it to the graph the first
/// time it is seen
fn get_or_add_node(
    graph: &mut RoadGraph,
    node_id_inx_map: &mut FxHashMap<i64, NodeIndex>,
    data: &NodeData,
) -> NodeIndex {
    *node_id_inx_map
        .entry(data.id)
        .or_insert_with(|| graph.add_node(*data))
}

/// Add an edge for every consecutive pair of nodes in the provided way
fn add_way(
    graph: &mut RoadGraph,
    node_map: &FxHashMap<i64, NodeData>,
    node_id_inx_map: &mut FxHashMap<i64, NodeIndex>,
    way: &OsmElement,
) {
    let (Some(node_ids), Some(tags)) = (&way.nodes, &way.tags) else {
        return;
    };

    let highway = tags.highway.clone().unwrap_or_default();
    let maxspeed = normalise_speed(tags.maxspeed.as_ref());
    let direction = Direction::from_tags(tags);

    for pair in node_ids.windows(2) {
        let (Some(src), Some(dst)) = (node_map.get(&pair[0]), node_map.get(&pair[1]))
        else {
            continue;
        };

        let src_point: Point = (src.lon, src.lat).into();
        let dst_point: Point = (dst.lon, dst.lat).into();
        let length = Haversine::distance(src_point, dst_point);

        let src_inx = get_or_add_node(graph, node_id_inx_map, src);
        let dst_inx = get_or_add_node(graph, node_id_inx_map, dst);

        if direction != Direction::Reverse {
            let edge = EdgeData::new(src.id, dst.id, highway.clone(), length, maxspeed);
            graph.add_edge(src_inx, dst_inx, edge);
        }
        if direction != Direction::Forward {
            let edge = EdgeData::new(dst.id, src.id, highway.clone(), length, maxspeed);
            graph.add_edge(dst_inx, src_inx, edge);
        }
    }
}

/// Based on the data which has been downloaded from Overpass, generate a
/// petgraph graph which can be used for route plotting. Only nodes which are
/// used by at least one way are added, in the order they are first seen.
pub fn create_graph(osm: &OsmResponse) -> RoadGraph {
    let mut graph = RoadGraph::default();

    let node_map = generate_node_map(osm);
    let mut node_id_inx_map = FxHashMap::<i64, NodeIndex>::default();

    let ways: Vec<&OsmElement> = osm
        .elements
        .iter()
        .filter(|e| e.elem_type == "way")
        .collect();

    let bar = ProgressBar::new(ways.len() as u64);
    for way in ways {
        add_way(&mut graph, &node_map, &mut node_id_inx_map, way);
        bar.inc(1);
    }
    bar.finish_and_clear();

    graph
}

/// Determine the closest node in the graph to the provided point, along with
/// its distance from the point in metres. Returns None for an empty graph.
pub fn find_nearest_node(graph: &RoadGraph, point: Point) -> Option<(NodeIndex, f64)> {
    graph
        .raw_nodes()
        .par_iter()
        .enumerate()
        .map(|(inx, node)| {
            let node_point: Point = (node.weight.lon, node.weight.lat).into();
            (inx, Haversine::distance(point, node_point))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(inx, dist)| (NodeIndex::new(inx), dist))
}

/// Retrieve the data for the edge connecting src to dst. Where several
/// parallel edges exist, the first one added to the graph is returned, even
/// if a later one is cheaper to traverse.
pub fn first_edge_between(
    graph: &RoadGraph,
    src: NodeIndex,
    dst: NodeIndex,
) -> Option<&EdgeData> {
    graph
        .edges_connecting(src, dst)
        .min_by_key(|eref| eref.id())
        .map(|eref| eref.weight())
}
