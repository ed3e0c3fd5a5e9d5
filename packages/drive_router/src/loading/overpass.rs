//! Retrieval of raw OSM road data from the Overpass API. Only drivable ways
//! are requested, along with every node they reference, so the response can
//! be turned directly into a graph.

use crate::common::bbox::BBox;
use crate::common::config::PlaceQuery;
use crate::common::error::{GraphError, GraphResult};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Ways which can't be used by a car are excluded at the source. Mirrors the
/// usual definition of a 'drive' network for OSM data.
const DRIVE_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
    r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
    r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
    r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
);

/// The area to download a road network for
#[derive(Debug, Clone, PartialEq)]
pub enum AreaQuery {
    Place(PlaceQuery),
    BBox(BBox),
}

impl AreaQuery {
    /// Generate the Overpass QL query which retrieves every drivable way in
    /// this area, along with the nodes they are made up of. Place names are
    /// looked up inside their state, so that a same-named area elsewhere is
    /// not merged in.
    pub fn to_overpass_ql(&self, timeout: Duration) -> String {
        let selection = match self {
            AreaQuery::Place(place) => format!(
                concat!(
                    "rel[\"boundary\"=\"administrative\"][\"name\"=\"{state}\"];\n",
                    "map_to_area->.stateArea;\n",
                    "rel(area.stateArea)[\"boundary\"=\"administrative\"][\"name\"=\"{city}\"];\n",
                    "map_to_area->.searchArea;\n",
                    "(\n  way{filter}(area.searchArea);\n);"
                ),
                state = place.state,
                city = place.city,
                filter = DRIVE_FILTER
            ),
            AreaQuery::BBox(bbox) => format!(
                "(\n  way{}{};\n);",
                DRIVE_FILTER,
                bbox.to_overpass_filter()
            ),
        };

        format!(
            "[out:json][timeout:{}];\n{}\n(._;>;);\nout body;",
            timeout.as_secs(),
            selection
        )
    }

    /// Short description of the area, used in log messages
    pub fn describe(&self) -> String {
        match self {
            AreaQuery::Place(place) => {
                format!("{}, {}, {}", place.city, place.state, place.country)
            }
            AreaQuery::BBox(bbox) => format!("bbox {}", bbox.to_overpass_filter()),
        }
    }
}

/// The raw value of a maxspeed tag. Overpass always provides a string, but
/// numbers and lists are accepted too so that merged or hand-written data
/// can be loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MaxSpeed {
    Number(f64),
    Text(String),
    List(Vec<MaxSpeed>),
}

/// The subset of OSM tags which are used when building the graph
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OsmTags {
    pub highway: Option<String>,
    pub oneway: Option<String>,
    pub junction: Option<String>,
    pub maxspeed: Option<MaxSpeed>,
}

/// A single node or way as returned by Overpass
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub elem_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub nodes: Option<Vec<i64>>,
    pub tags: Option<OsmTags>,
}

/// Container for the raw output of an Overpass query
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OsmResponse {
    pub elements: Vec<OsmElement>,
}

/// Anything which can provide raw road data for an area
pub trait GraphSource: Send + Sync + 'static {
    fn fetch(
        &self,
        area: &AreaQuery,
    ) -> impl Future<Output = GraphResult<OsmResponse>> + Send;
}

/// Downloads road data from an Overpass API instance
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl OverpassClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> GraphResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .user_agent(concat!("drive-router/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(OverpassClient {
            client,
            url: url.into(),
            timeout,
        })
    }
}

impl GraphSource for OverpassClient {
    async fn fetch(&self, area: &AreaQuery) -> GraphResult<OsmResponse> {
        let query = area.to_overpass_ql(self.timeout);
        debug!("Overpass query:\n{}", query);

        info!("Requesting road network for {}", area.describe());
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .body(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GraphError::Status(response.status()));
        }

        let osm: OsmResponse = response.json().await?;
        info!("Downloaded {} OSM elements", osm.elements.len());

        Ok(osm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::Region;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_place_query() {
        let area = AreaQuery::Place(Region::BENGALURU.place);

        let query = area.to_overpass_ql(Duration::from_secs(180));

        assert!(query.starts_with("[out:json][timeout:180];"));
        assert!(query.contains(r#"rel["boundary"="administrative"]["name"="Karnataka"];"#));
        assert!(query.contains(
            r#"rel(area.stateArea)["boundary"="administrative"]["name"="Bengaluru"];"#
        ));
        assert!(query.contains("map_to_area->.searchArea;"));
        assert!(query.contains("(area.searchArea)"));
        assert!(query.ends_with("(._;>;);\nout body;"));
    }

    #[test]
    fn test_bbox_query() {
        let area = AreaQuery::BBox(Region::BENGALURU.bbox);

        let query = area.to_overpass_ql(Duration::from_secs(180));

        assert!(query.contains(r#"["motorcar"!~"no"]"#));
        assert!(query.contains("(12.864,77.484,13.023,77.766);"));
        assert!(!query.contains("searchArea"));
    }

    /// maxspeed may come through as a number, a string or a list
    #[test]
    fn test_deserialize_tags() {
        let raw = json!([
            {"highway": "primary", "maxspeed": "40 mph"},
            {"highway": "primary", "maxspeed": 50},
            {"highway": "primary", "maxspeed": ["60", "70"]},
            {"highway": "primary"}
        ]);

        let tags: Vec<OsmTags> = serde_json::from_value(raw).unwrap();

        assert_eq!(tags[0].maxspeed, Some(MaxSpeed::Text("40 mph".to_string())));
        assert_eq!(tags[1].maxspeed, Some(MaxSpeed::Number(50.0)));
        assert_eq!(
            tags[2].maxspeed,
            Some(MaxSpeed::List(vec![
                MaxSpeed::Text("60".to_string()),
                MaxSpeed::Text("70".to_string())
            ]))
        );
        assert_eq!(tags[3].maxspeed, None);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        let body = json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 12.97, "lon": 77.59},
                {"type": "node", "id": 2, "lat": 12.98, "lon": 77.60},
                {"type": "way", "id": 10, "nodes": [1, 2], "tags": {"highway": "primary"}}
            ]
        });
        Mock::given(method("POST"))
            .and(body_string_contains("out body;"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client =
            OverpassClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let area = AreaQuery::BBox(Region::BENGALURU.bbox);

        let response = client.fetch(&area).await.unwrap();

        assert_eq!(response.elements.len(), 3);
        assert_eq!(response.elements[2].nodes, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_fetch_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client =
            OverpassClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let area = AreaQuery::Place(Region::BENGALURU.place);

        let result = client.fetch(&area).await;

        assert!(matches!(result, Err(GraphError::Status(status)) if status.as_u16() == 429));
    }
}
