use axum::serve;
use clap::Parser;
use drive_router::api::{AppState, build_router};
use drive_router::common::config::{Region, ServiceConfig};
use drive_router::loading::overpass::OverpassClient;
use drive_router::loading::store::{GraphStore, spawn_refresher};
use drive_router::logging::init_logger;
use drive_router::routing::finder::RouteFinder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = ServiceConfig::parse();

    if let Err(err) = init_logger() {
        eprintln!("Unable to set up logging: {}", err);
    }

    let client = OverpassClient::new(config.overpass_url.clone(), config.overpass_timeout())
        .expect("Error creating the Overpass client!");

    let store = Arc::new(GraphStore::new(
        client,
        Region::BENGALURU,
        config.cache_file.clone(),
        config.refresh_interval(),
    ));

    let now = Instant::now();
    match store.ensure_fresh().await {
        Ok(outcome) => info!("Road network ready ({:?}) in {:.2?}", outcome, now.elapsed()),
        Err(err) => error!(
            "Unable to load the road network, routes will fail until a refresh succeeds: {}",
            err
        ),
    }
    if store.needs_refresh() && store.graph().is_some() {
        warn!("Serving an out of date road network");
    }

    let _refresher = spawn_refresher(Arc::clone(&store));

    let state = AppState {
        graph: store.handle(),
        finder: Arc::new(RouteFinder::new(
            config.nearest_cache_capacity,
            config.max_snap_distance,
        )),
    };
    let router = build_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| panic!("Error binding to {}: {}", addr, err));
    info!("Listening on {}", addr);

    serve(listener, router).await.expect("Error serving API!");
}
