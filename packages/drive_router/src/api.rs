//! HTTP interface of the service. Route requests are answered from whichever
//! graph snapshot is current when the request arrives; a refresh which
//! completes part-way through a request does not affect it.

use crate::common::config::{RouteRequest, UserRouteRequest};
use crate::common::template::{escape_html, fill_template};
use crate::loading::store::GraphHandle;
use crate::routing::finder::RouteFinder;
use crate::routing::render::{RouteMap, render};
use crate::routing::structs::Route;
use crate::routing::structs::metrics::RouteStats;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

const LANDING_TEMPLATE: &str = include_str!("api/landing.html");

#[derive(Clone)]
pub struct AppState {
    pub graph: GraphHandle,
    pub finder: Arc<RouteFinder>,
}

/// Failures which are reported to the client. The messages are fixed, the
/// underlying cause is only ever logged.
#[derive(Error, Debug, PartialEq)]
pub enum ApiError {
    #[error("Invalid request: origin and destination must be [lat, lng] pairs")]
    InvalidRequest,
    #[error("No path found between the given points")]
    NoPath,
    #[error("Error creating map visualization")]
    Render,
    #[error("Internal server error")]
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NoPath => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest | ApiError::Render | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the axum router, with permissive CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/shortest-path", post(shortest_path))
        .route("/shortest-path/map", post(shortest_path_map))
        .route("/", get(landing))
        .route("/{*path}", get(landing_path))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Decode and validate a route request body
fn parse_request(body: &[u8]) -> Result<RouteRequest, ApiError> {
    let user_request: UserRouteRequest = serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected route request: {}", e);
        ApiError::InvalidRequest
    })?;

    RouteRequest::try_from(user_request).map_err(|e| {
        warn!("Rejected route request: {}", e);
        ApiError::InvalidRequest
    })
}

/// Find the fastest path for a request, draw it, and work out its stats
fn plan_route(state: &AppState, request: RouteRequest) -> Result<(RouteMap, RouteStats), ApiError> {
    let snapshot = state.graph.snapshot().ok_or_else(|| {
        warn!("Route requested before any graph was loaded");
        ApiError::NoPath
    })?;

    let path = state
        .finder
        .shortest_path(&snapshot, request.origin, request.destination)
        .ok_or(ApiError::NoPath)?;

    let map = render(&snapshot, request.origin, &path).ok_or(ApiError::Render)?;

    let stats = RouteStats::from_path(&snapshot.graph, &path).ok_or_else(|| {
        error!("Path returned by the route finder is not connected");
        ApiError::Internal
    })?;

    Ok((map, stats))
}

/// Path finding is CPU bound, so it is kept off the async worker threads
async fn plan_route_blocking(state: AppState, body: Bytes) -> Result<(RouteMap, RouteStats), ApiError> {
    let request = parse_request(&body)?;

    tokio::task::spawn_blocking(move || plan_route(&state, request))
        .await
        .map_err(|e| {
            error!("Route planning task failed: {}", e);
            ApiError::Internal
        })?
}

async fn shortest_path(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Route>, ApiError> {
    let (map, stats) = plan_route_blocking(state, body).await?;

    Ok(Json(Route {
        path: map.coords,
        stats,
    }))
}

async fn shortest_path_map(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Html<String>, ApiError> {
    let (map, _) = plan_route_blocking(state, body).await?;

    Ok(Html(map.html))
}

/// Informational page, echoing back the path which was requested
fn landing_page(path: &str) -> Html<String> {
    let page = fill_template(LANDING_TEMPLATE, &[("< path >", escape_html(path))])
        .unwrap_or_else(|e| {
            error!("Unable to prepare landing page: {}", e);
            LANDING_TEMPLATE.to_string()
        });
    Html(page)
}

async fn landing() -> Html<String> {
    landing_page("")
}

async fn landing_path(Path(path): Path<String>) -> Html<String> {
    landing_page(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::petgraph::create_graph;
    use crate::loading::store::tests::get_test_osm;
    use approx::assert_relative_eq;
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::Utc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn get_test_state(with_graph: bool) -> AppState {
        let graph = GraphHandle::default();
        if with_graph {
            graph.install(create_graph(&get_test_osm()), Utc::now());
        }
        AppState {
            graph,
            finder: Arc::new(RouteFinder::new(1000, 5000.0)),
        }
    }

    async fn post_json(state: AppState, uri: &str, body: String) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_page(uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();

        let response = build_router(get_test_state(false))
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_shortest_path_ok() {
        let body = json!({"origin": [12.970, 77.590], "destination": [12.970, 77.600]});

        let (status, text) =
            post_json(get_test_state(true), "/shortest-path", body.to_string()).await;
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value["path"],
            json!([[12.970, 77.590], [12.970, 77.595], [12.970, 77.600]])
        );

        // Both edges are ~542m long and travelled at 30km/h
        let distance = value["stats"]["total_distance"].as_f64().unwrap();
        let time = value["stats"]["estimated_time"].as_f64().unwrap();
        assert!((distance - 1084.0).abs() < 5.0);
        assert_relative_eq!(time, distance / (30.0 / 3.6), epsilon = 1e-6);
    }

    /// Identical origin and destination give a single point with no length
    #[tokio::test]
    async fn test_shortest_path_same_point() {
        let body = json!({"origin": [12.970, 77.590], "destination": [12.970, 77.590]});

        let (status, text) =
            post_json(get_test_state(true), "/shortest-path", body.to_string()).await;
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["path"], json!([[12.970, 77.590]]));
        assert_eq!(value["stats"]["total_distance"], json!(0.0));
        assert_eq!(value["stats"]["estimated_time"], json!(0.0));
    }

    #[tokio::test]
    async fn test_shortest_path_mid_ocean() {
        let body = json!({"origin": [12.970, 77.590], "destination": [0.0, -30.0]});

        let (status, text) =
            post_json(get_test_state(true), "/shortest-path", body.to_string()).await;
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["error"], "No path found between the given points");
    }

    /// Until a graph has been loaded, nothing can be routed
    #[tokio::test]
    async fn test_shortest_path_no_graph() {
        let body = json!({"origin": [12.970, 77.590], "destination": [12.970, 77.600]});

        let (status, _) =
            post_json(get_test_state(false), "/shortest-path", body.to_string()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shortest_path_missing_origin() {
        let body = json!({"destination": [12.970, 77.600]});

        let (status, text) =
            post_json(get_test_state(true), "/shortest-path", body.to_string()).await;
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], ApiError::InvalidRequest.to_string());
    }

    #[tokio::test]
    async fn test_shortest_path_malformed_json() {
        let (status, text) =
            post_json(get_test_state(true), "/shortest-path", "{not json".to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // Parser details are not passed back to the client
        assert!(!text.contains("line"));
    }

    #[tokio::test]
    async fn test_shortest_path_bad_coordinates() {
        let body = json!({"origin": [12.970, 77.590, 1.0], "destination": [91.0, 77.600]});

        let (status, _) =
            post_json(get_test_state(true), "/shortest-path", body.to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_shortest_path_map() {
        let body = json!({"origin": [12.970, 77.590], "destination": [12.965, 77.600]});

        let (status, text) =
            post_json(get_test_state(true), "/shortest-path/map", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("L.polyline("));
        assert!(text.contains("setView([12.97,77.59], 13)"));
    }

    #[tokio::test]
    async fn test_landing_page() {
        let (status, text) = get_page("/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("The server is running and healthy."));
    }

    #[tokio::test]
    async fn test_landing_page_echoes_path() {
        let (status, text) = get_page("/foo/bar").await;

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("<strong>foo/bar</strong>"));
    }

    #[tokio::test]
    async fn test_landing_page_escapes_path() {
        let (status, text) = get_page("/%3Cscript%3Ealert(1)%3C/script%3E").await;

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!text.contains("<script>"));
    }

    /// The route endpoint only accepts POST
    #[tokio::test]
    async fn test_shortest_path_get() {
        let (status, _) = get_page("/shortest-path").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
