//! This module contains the structs which configure the service. The
//! ServiceConfig is read once at startup from the command line and the
//! environment, while UserRouteRequest/RouteRequest represent a single routing
//! request as received by the API and after validation.

use crate::common::bbox::BBox;
use chrono::TimeDelta;
use clap::Parser;
use geo::Point;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Options which control how the service runs. Every option can be set either
/// as a command line flag or through the named environment variable.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "drive-router", about = "Fastest driving routes over HTTP")]
pub struct ServiceConfig {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Location of the persisted road network
    #[arg(long, env = "GRAPH_CACHE_FILE", default_value = "bengaluru_graph.bin")]
    pub cache_file: PathBuf,

    /// Age in seconds after which the road network is re-acquired
    #[arg(
        long,
        env = "GRAPH_REFRESH_SECS",
        default_value_t = 24 * 60 * 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,

    /// Overpass API endpoint used to download the road network
    #[arg(
        long,
        env = "OVERPASS_URL",
        default_value = "https://overpass-api.de/api/interpreter"
    )]
    pub overpass_url: String,

    /// Timeout for a single Overpass download, in seconds
    #[arg(long, env = "OVERPASS_TIMEOUT_SECS", default_value_t = 300)]
    pub overpass_timeout_secs: u64,

    /// Number of coordinate -> node lookups to remember
    #[arg(long, env = "NEAREST_CACHE_CAPACITY", default_value_t = 1000)]
    pub nearest_cache_capacity: usize,

    /// Coordinates further than this many metres from any road are treated
    /// as being outside of the network
    #[arg(long, env = "MAX_SNAP_DISTANCE_M", default_value_t = 5000.0)]
    pub max_snap_distance: f64,
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn overpass_timeout(&self) -> Duration {
        Duration::from_secs(self.overpass_timeout_secs)
    }
}

/// Converts a std Duration into the chrono equivalent, saturating for
/// intervals too large to represent
pub fn to_time_delta(interval: Duration) -> TimeDelta {
    TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX)
}

/// A named place, as understood by OSM administrative boundaries
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub city: &'static str,
    pub state: &'static str,
    pub country: &'static str,
}

/// The area served by this instance. The place query is tried first, with
/// the bounding box acting as a fallback if it cannot be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub place: PlaceQuery,
    pub bbox: BBox,
}

impl Region {
    pub const BENGALURU: Region = Region {
        name: "bengaluru",
        place: PlaceQuery {
            city: "Bengaluru",
            state: "Karnataka",
            country: "India",
        },
        bbox: BBox::from_edges(13.023, 12.864, 77.766, 77.484),
    };
}

/// Stores the user's route request exactly as it is received from the API.
/// Coordinates are provided as [lat, lng] pairs.
#[derive(Deserialize, Debug, PartialEq)]
pub struct UserRouteRequest {
    pub origin: [f64; 2],
    pub destination: [f64; 2],
}

/// Raised when a request contains a coordinate which cannot exist
#[derive(Error, Debug, PartialEq)]
#[error("coordinate ({lat}, {lng}) is out of range")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lng: f64,
}

/// Stores the user's route request in a format which can be used in the rest
/// of this package. Note that geo points are (x, y), i.e. (lng, lat).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub origin: Point,
    pub destination: Point,
}

/// Validate a single [lat, lng] pair and convert it into a Point
fn to_point(pair: [f64; 2]) -> Result<Point, InvalidCoordinate> {
    let [lat, lng] = pair;
    let valid = lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);

    match valid {
        true => Ok(Point::new(lng, lat)),
        false => Err(InvalidCoordinate { lat, lng }),
    }
}

impl TryFrom<UserRouteRequest> for RouteRequest {
    type Error = InvalidCoordinate;

    fn try_from(request: UserRouteRequest) -> Result<Self, Self::Error> {
        Ok(RouteRequest {
            origin: to_point(request.origin)?,
            destination: to_point(request.destination)?,
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    /// With nothing on the command line, the defaults should match the
    /// documented behaviour of the service
    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::try_parse_from(["drive-router"])
            .expect("defaults should parse");

        assert_eq!(config.cache_file, PathBuf::from("bengaluru_graph.bin"));
        assert_eq!(config.refresh_interval(), Duration::from_secs(86400));
        assert_eq!(config.nearest_cache_capacity, 1000);
    }

    #[test]
    fn test_service_config_flags() {
        let config = ServiceConfig::try_parse_from([
            "drive-router",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--refresh-interval-secs",
            "60",
        ])
        .expect("flags should parse");

        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
    }

    /// A zero interval would have the refresher downloading continuously
    #[test]
    fn test_service_config_zero_refresh_interval() {
        let result = ServiceConfig::try_parse_from([
            "drive-router",
            "--refresh-interval-secs",
            "0",
        ]);

        assert!(result.is_err());
    }

    /// Check conversion from UserRouteRequest to RouteRequest swaps the
    /// coordinates into (x, y) order
    #[test]
    fn test_user_request_to_route_request() {
        let user_request = UserRouteRequest {
            origin: [12.97, 77.59],
            destination: [12.93, 77.62],
        };

        let target = RouteRequest {
            origin: Point::new(77.59, 12.97),
            destination: Point::new(77.62, 12.93),
        };

        let result = RouteRequest::try_from(user_request);

        assert_eq!(result, Ok(target));
    }

    #[test]
    fn test_user_request_out_of_range() {
        let user_request = UserRouteRequest {
            origin: [12.97, 77.59],
            destination: [95.0, 77.62],
        };

        let result = RouteRequest::try_from(user_request);

        assert_eq!(
            result,
            Err(InvalidCoordinate {
                lat: 95.0,
                lng: 77.62
            })
        );
    }
}
