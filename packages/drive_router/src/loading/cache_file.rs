//! Persistence of the road network between restarts. The file starts with a
//! fixed magic number and a versioned header, so that a file written by an
//! incompatible build (or for a different region) is rejected before any
//! attempt is made to decode the graph itself.

use crate::common::error::{GraphError, GraphResult};
use crate::common::graph_data::RoadGraph;
use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const MAGIC: [u8; 4] = *b"DRGR";

/// Bump this whenever NodeData, EdgeData or the header change shape
pub const CACHE_VERSION: u32 = 1;

/// Everything after the version number. Its layout belongs to a single
/// CACHE_VERSION, so it is only decoded once the version has been checked.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct CacheHeader {
    /// Unix timestamp (seconds) at which the graph was downloaded
    acquired_at: i64,
    region: String,
}

/// A road network as stored on disk, along with the time it was downloaded
#[derive(Debug, Clone)]
pub struct CachedGraph {
    pub acquired_at: DateTime<Utc>,
    pub graph: RoadGraph,
}

/// Fixed-width integers, so the magic number and version always occupy the
/// same bytes at the start of the file
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Decoding is bounded by the size of the file, so a corrupt length prefix
/// is reported as an error instead of triggering a huge allocation
fn read_with_limit<T, R>(reader: &mut R, limit: u64) -> GraphResult<T>
where
    T: serde::de::DeserializeOwned,
    R: std::io::Read,
{
    Ok(codec().with_limit(limit).deserialize_from(reader)?)
}

/// The file is written next to its final location, then moved into place so
/// that a crash part-way through never leaves a truncated cache behind
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write the provided graph to disk, replacing any existing cache file
pub fn write_cache(path: &Path, region: &str, cached: &CachedGraph) -> GraphResult<()> {
    let header = CacheHeader {
        acquired_at: cached.acquired_at.timestamp(),
        region: region.to_string(),
    };

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        codec().serialize_into(&mut writer, &MAGIC)?;
        codec().serialize_into(&mut writer, &CACHE_VERSION)?;
        codec().serialize_into(&mut writer, &header)?;
        codec().serialize_into(&mut writer, &cached.graph)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Read a graph back from disk. Fails if the file is missing or corrupt, was
/// written by a different version of the format, or belongs to a different
/// region.
pub fn read_cache(path: &Path, region: &str) -> GraphResult<CachedGraph> {
    let file = File::open(path)?;
    let limit = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let magic: [u8; 4] = read_with_limit(&mut reader, limit)?;
    if magic != MAGIC {
        return Err(GraphError::CacheFormat(format!(
            "{} is not a graph cache file",
            path.display()
        )));
    }

    let version: u32 = read_with_limit(&mut reader, limit)?;
    if version != CACHE_VERSION {
        return Err(GraphError::CacheFormat(format!(
            "version {} found, {} expected",
            version, CACHE_VERSION
        )));
    }

    let header: CacheHeader = read_with_limit(&mut reader, limit)?;
    if header.region != region {
        return Err(GraphError::CacheFormat(format!(
            "cache holds {}, not {}",
            header.region, region
        )));
    }

    let acquired_at = DateTime::from_timestamp(header.acquired_at, 0).ok_or_else(|| {
        GraphError::CacheFormat(format!("invalid timestamp {}", header.acquired_at))
    })?;

    let graph: RoadGraph = read_with_limit(&mut reader, limit)?;

    Ok(CachedGraph { acquired_at, graph })
}
