use log::{debug, info, warn};
use simpleblock_utils::hexcode;

use super::marker;
use super::storage_interface::*;
use crate::cache::DiskCache;
use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;
use crate::persist::PersistentMap;

const FORMAT: &str = "hex";

/// Persistent storage keeping one entry per sector, each byte written as two
/// hex digits.
///
/// The store is slow, so all reads come from the cache and writes are
/// buffered per sector. The buffered sector is written out when:
/// - its last byte is written (the usual case for a guest copying a whole
///   sector front to back),
/// - a write lands in a different sector,
/// - `sync` or `flush` is called, or the backend is dropped.
/// The entry is always re-encoded from the cache, so the order in which the
/// bytes of a sector were written does not matter.
pub struct HexStorage<M: PersistentMap> {
    map: M,
    cache: DiskCache,
    buffered: Option<u32>,
}

fn sector_key(sector: u32) -> String {
    format!("s{}", sector)
}

impl<M: PersistentMap> HexStorage<M> {
    /// Open the disk held in `map`, creating an empty one if there is none.
    pub fn open(mut map: M, geometry: Geometry) -> DiskResult<Self> {
        let sector_size = geometry.sector_size() as usize;

        if !marker::check(&map, FORMAT, geometry)? {
            info!("Creating {} hex disk. This can take some time.", geometry);
            let empty_sector = hexcode::encode_bytes(&vec![0; sector_size]);
            marker::initialise(&mut map, FORMAT, geometry, |map| {
                for sector in 0..geometry.sector_count() {
                    if sector % 256 == 0 {
                        debug!("Writing sector {}...", sector);
                    }
                    map.set(&sector_key(sector), &empty_sector)?;
                }
                Ok(())
            })?;
        }

        let mut cache = DiskCache::new(geometry);
        for sector in 0..geometry.sector_count() {
            if sector % 256 == 0 {
                debug!("Caching sector {}...", sector);
            }
            let key = sector_key(sector);
            let bytes = map.get(&key)?
                .and_then(|value| hexcode::decode_bytes(&value, sector_size))
                .ok_or(DiskError::CorruptEntry { key })?;
            cache.set_sector(sector, &bytes)?;
        }

        Ok(HexStorage {
            map,
            cache,
            buffered: None,
        })
    }

    /// The sector with writes not yet in the store, if any.
    pub fn buffered_sector(&self) -> Option<u32> {
        self.buffered
    }

    fn write_sector(&mut self, sector: u32) -> DiskResult<()> {
        let value = hexcode::encode_bytes(self.cache.sector(sector)?);
        self.map.set(&sector_key(sector), &value)?;
        debug!("Flushed sector {}.", sector);
        Ok(())
    }

    fn write_all_sectors(&mut self) -> DiskResult<()> {
        self.buffered = None;
        for sector in 0..self.cache.geometry().sector_count() {
            self.write_sector(sector)?;
        }
        Ok(())
    }
}

impl<M: PersistentMap> StorageBackend for HexStorage<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Hex
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        self.cache.get_byte(sector, byte)
    }

    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        self.cache.set_byte(sector, byte, value)?;

        if self.buffered != Some(sector) {
            self.sync()?;
            self.buffered = Some(sector);
        }
        if byte == self.cache.geometry().sector_size() - 1 {
            self.sync()?;
        }
        Ok(())
    }

    fn clear_disk(&mut self) -> DiskResult<()> {
        self.cache.clear();
        self.write_all_sectors()
    }

    fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()> {
        self.cache.load_data(bytes)?;
        self.flush()
    }

    fn flush(&mut self) -> DiskResult<()> {
        self.write_all_sectors()
    }

    fn sync(&mut self) -> DiskResult<()> {
        if let Some(sector) = self.buffered {
            self.write_sector(sector)?;
            self.buffered = None;
        }
        Ok(())
    }
}

impl<M: PersistentMap> Drop for HexStorage<M> {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!("Lost buffered writes: {}", e);
        }
    }
}
