use super::storage_interface::*;
use crate::cache::DiskCache;
use crate::error::DiskResult;
use crate::geometry::Geometry;

/// Non-persistent storage: the cache is the disk.
pub struct MemoryStorage {
    cache: DiskCache,
}

impl MemoryStorage {
    pub fn new(geometry: Geometry) -> Self {
        MemoryStorage {
            cache: DiskCache::new(geometry),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        self.cache.get_byte(sector, byte)
    }

    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        self.cache.set_byte(sector, byte, value)
    }

    fn clear_disk(&mut self) -> DiskResult<()> {
        self.cache.clear();
        Ok(())
    }

    fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()> {
        self.cache.load_data(bytes)?;
        self.flush()
    }

    fn flush(&mut self) -> DiskResult<()> {
        // Nowhere to flush to.
        Ok(())
    }
}
