use log::{debug, info, trace};
use simpleblock_utils::hexcode;

use super::marker;
use super::storage_interface::*;
use crate::cache::DiskCache;
use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;
use crate::persist::PersistentMap;

const FORMAT: &str = "words";

/// Bytes in a stored word.
pub const WORD_SIZE: u32 = 4;

const EMPTY_WORD: &str = "00000000";

/// Persistent storage keeping one entry per 32-bit word, as eight hex digits.
///
/// Byte `4k + p` of a sector lives in bits `8p..8p+8` of word `k`. Every read
/// and write goes to the store: a write is a read-modify-write of the whole
/// word. The cache only mirrors the image for export.
pub struct WordStorage<M: PersistentMap> {
    map: M,
    cache: DiskCache,
}

fn word_key(sector: u32, word: u32) -> String {
    format!("d,{},{}", sector, word)
}

fn words_per_sector(geometry: Geometry) -> u32 {
    (geometry.sector_size() + WORD_SIZE - 1) / WORD_SIZE
}

fn shift(byte: u32) -> u32 {
    8 * (byte % WORD_SIZE)
}

impl<M: PersistentMap> WordStorage<M> {
    /// Open the disk held in `map`, creating an empty one if there is none.
    pub fn open(mut map: M, geometry: Geometry) -> DiskResult<Self> {
        if !marker::check(&map, FORMAT, geometry)? {
            info!("Creating {} word disk. This can take some time.", geometry);
            marker::initialise(&mut map, FORMAT, geometry, |map| {
                for sector in 0..geometry.sector_count() {
                    if sector % 256 == 0 {
                        debug!("Writing sector {}...", sector);
                    }
                    for word in 0..words_per_sector(geometry) {
                        map.set(&word_key(sector, word), EMPTY_WORD)?;
                    }
                }
                Ok(())
            })?;
        }

        let mut storage = WordStorage {
            map,
            cache: DiskCache::new(geometry),
        };
        for sector in 0..geometry.sector_count() {
            for word in 0..words_per_sector(geometry) {
                let value = storage.read_word(&word_key(sector, word))?;
                for byte in (word * WORD_SIZE)..((word + 1) * WORD_SIZE).min(geometry.sector_size()) {
                    storage.cache.set_byte(sector, byte, (value >> shift(byte)) as u8)?;
                }
            }
        }
        Ok(storage)
    }

    fn read_word(&self, key: &str) -> DiskResult<u32> {
        self.map.get(key)?
            .and_then(|value| hexcode::decode_word(&value))
            .ok_or_else(|| DiskError::CorruptEntry { key: key.to_string() })
    }

    fn write_all_words(&mut self) -> DiskResult<()> {
        let geometry = self.cache.geometry();
        for sector in 0..geometry.sector_count() {
            let words = self.cache.sector(sector)?
                .chunks(WORD_SIZE as usize)
                .map(|chunk| {
                    chunk.iter().rev().fold(0u32, |acc, &b| (acc << 8) | b as u32)
                })
                .collect::<Vec<_>>();
            for (word, value) in words.into_iter().enumerate() {
                self.map.set(&word_key(sector, word as u32), &hexcode::encode_word(value))?;
            }
        }
        debug!("Flushed all words.");
        Ok(())
    }
}

impl<M: PersistentMap> StorageBackend for WordStorage<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Words
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        self.cache.geometry().offset(sector, byte)?;
        let key = word_key(sector, byte / WORD_SIZE);
        trace!("Reading word {}", key);
        let word = self.read_word(&key)?;
        Ok((word >> shift(byte)) as u8)
    }

    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        self.cache.geometry().offset(sector, byte)?;
        let key = word_key(sector, byte / WORD_SIZE);
        trace!("Writing word {}:{:#04X}", key, value);
        let word = self.read_word(&key)?;
        let word = (word & !(0xFF << shift(byte))) | ((value as u32) << shift(byte));
        self.map.set(&key, &hexcode::encode_word(word))?;
        self.cache.set_byte(sector, byte, value)
    }

    fn clear_disk(&mut self) -> DiskResult<()> {
        self.cache.clear();
        self.flush()
    }

    fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()> {
        self.cache.load_data(bytes)?;
        self.flush()
    }

    fn flush(&mut self) -> DiskResult<()> {
        self.write_all_words()
    }
}
