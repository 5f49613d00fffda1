use std::io;
use thiserror::Error;

pub type DiskResult<T> = Result<T, DiskError>;

/// Everything that can go wrong between the controller and the persistent
/// store. None of these are fatal to a running device: configuration errors
/// downgrade the backend, the rest are reported to whoever asked.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("invalid geometry {sector_count}x{sector_size} (each must be between 1 and 65536)")]
    InvalidGeometry { sector_count: u32, sector_size: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown storage backend '{0}'")]
    UnknownBackend(String),

    #[error("persistent storage is unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("store holds a '{found}' disk, expected '{expected}'")]
    FormatMismatch { expected: String, found: String },

    #[error("image is {actual} bytes, but the disk is {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("address out of range: sector {sector}, byte {byte}")]
    OutOfRange { sector: u32, byte: u32 },

    #[error("stored entry '{key}' is missing or corrupt")]
    CorruptEntry { key: String },

    #[error("storage quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("device is not ready")]
    NotReady,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to watch directory: {0}")]
    Watch(#[from] notify::Error),
}
