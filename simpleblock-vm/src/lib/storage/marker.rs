use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;
use crate::persist::PersistentMap;

/// Key whose presence means the store holds a fully initialised disk. Its
/// value names the encoding and geometry, so that a store is never read with
/// the wrong one.
pub const MARKER_KEY: &str = "simpleblock-disk";

fn marker_value(format: &str, geometry: Geometry) -> String {
    format!("{}:{}", format, geometry)
}

/// Returns whether the store already holds a disk in this format and
/// geometry. A disk in any other format or geometry is an error.
pub fn check<M: PersistentMap>(map: &M, format: &str, geometry: Geometry) -> DiskResult<bool> {
    if !map.has(MARKER_KEY)? {
        return Ok(false);
    }
    let expected = marker_value(format, geometry);
    match map.get(MARKER_KEY)? {
        Some(found) if found == expected => Ok(true),
        Some(found) => Err(DiskError::FormatMismatch { expected, found }),
        None => Ok(false),
    }
}

pub fn write<M: PersistentMap>(map: &mut M, format: &str, geometry: Geometry) -> DiskResult<()> {
    map.set(MARKER_KEY, &marker_value(format, geometry))
}

/// Build a fresh disk in the store with `init`, then mark it. If building
/// fails part way, the store is emptied again so that a later attempt starts
/// from scratch.
pub fn initialise<M, F>(map: &mut M, format: &str, geometry: Geometry, init: F) -> DiskResult<()>
    where M: PersistentMap,
          F: FnOnce(&mut M) -> DiskResult<()>
{
    let result = init(map).and_then(|()| write(map, format, geometry));
    if result.is_err() {
        // Report the failure to build, not any failure to clean up.
        let _ = map.clear();
    }
    result
}
