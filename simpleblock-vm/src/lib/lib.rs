pub mod cache;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod import;
pub mod persist;
pub mod storage;

pub use crate::config::{Disk, DiskConfig};
pub use crate::error::{DiskError, DiskResult};
pub use crate::geometry::Geometry;

#[cfg(test)]
pub fn init_test_logging() {
    // The logger can only be initialised once, but we don't know the order of
    // tests. Therefore we ignore the result.
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Trace,
                                        simplelog::Config::default());
}
