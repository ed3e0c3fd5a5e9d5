use thiserror::Error;

/// Errors which can occur while acquiring, persisting or restoring the road
/// network
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Overpass API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Downloaded road network for {0} contains no drivable roads")]
    EmptyGraph(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to encode or decode the graph cache: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Graph cache is not usable: {0}")]
    CacheFormat(String),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type GraphResult<T> = Result<T, GraphError>;
