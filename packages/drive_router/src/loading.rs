//! This module focuses on retrieving the road network from the Overpass API,
//! turning it into a petgraph graph object, and keeping a copy of it on disk.

pub mod cache_file;
pub mod overpass;
pub mod petgraph;
pub mod store;
