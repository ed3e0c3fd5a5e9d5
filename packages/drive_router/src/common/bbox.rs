//! Defines a struct to represent a bounding box, which is used to represent
//! a 2d square(ish) on the planet's surface. This is used as the fallback
//! area when downloading the road network by place name fails.

/// A bounding box for geographical data. Contains the minimum and maximum
/// latitudes & longitudes, defining a 'rectangle' on the surface of the Earth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BBox {
    /// Create a new bounding box from its four edges, in the order in which
    /// they are usually quoted for a city
    pub const fn from_edges(north: f64, south: f64, east: f64, west: f64) -> Self {
        BBox {
            min_lat: south,
            min_lon: west,
            max_lat: north,
            max_lon: east,
        }
    }

    /// Format the bounding box as an Overpass QL filter, which expects
    /// (south, west, north, east)
    pub fn to_overpass_filter(&self) -> String {
        format!(
            "({},{},{},{})",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}
