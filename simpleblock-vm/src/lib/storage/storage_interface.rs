use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::cache::DiskCache;
use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;

/// The available storage strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Hex,
    Words,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Hex => "hex",
            BackendKind::Words => "words",
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, BackendKind::Memory)
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = DiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(BackendKind::Memory),
            "hex" | "persistent-hex" => Ok(BackendKind::Hex),
            "words" | "persistent-words" => Ok(BackendKind::Words),
            _ => Err(DiskError::UnknownBackend(s.to_string())),
        }
    }
}

/// A byte-addressable disk image with some strategy for keeping it.
pub trait StorageBackend {
    fn kind(&self) -> BackendKind;

    /// The cache mirroring the full image.
    fn cache(&self) -> &DiskCache;

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8>;
    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()>;

    /// Zero the whole disk.
    fn clear_disk(&mut self) -> DiskResult<()>;

    /// Replace the whole disk with `bytes`, which must be exactly the size of
    /// the disk. On a size mismatch the disk is left untouched. Once the size
    /// is accepted the cache holds the new image even if writing it to the
    /// store then fails; the store may hold a mix of old and new entries until
    /// a later `flush` succeeds.
    fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()>;

    /// Push the entire cached image out to wherever this backend keeps it.
    fn flush(&mut self) -> DiskResult<()>;

    /// Push out any writes that are still buffered. Cheaper than `flush`.
    fn sync(&mut self) -> DiskResult<()> {
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.cache().geometry()
    }

    fn export_image(&self) -> Vec<u8> {
        self.cache().export_image()
    }

    fn download_link(&self) -> String {
        self.cache().download_link()
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for Box<S> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn cache(&self) -> &DiskCache {
        (**self).cache()
    }

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        (**self).get_byte(sector, byte)
    }

    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        (**self).set_byte(sector, byte, value)
    }

    fn clear_disk(&mut self) -> DiskResult<()> {
        (**self).clear_disk()
    }

    fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()> {
        (**self).load_data(bytes)
    }

    fn flush(&mut self) -> DiskResult<()> {
        (**self).flush()
    }

    fn sync(&mut self) -> DiskResult<()> {
        (**self).sync()
    }

    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    fn export_image(&self) -> Vec<u8> {
        (**self).export_image()
    }

    fn download_link(&self) -> String {
        (**self).download_link()
    }
}
