use std::cell::RefCell;
use std::collections::HashMap;

use super::storage_interface::*;
use crate::cache::DiskCache;
use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;

/// A call made to a `MockStorage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Get { sector: u32, byte: u32 },
    Set { sector: u32, byte: u32, value: u8 },
}

/// A mock backend that accepts any 16-bit address, answers reads from a table
/// of seeded values, and records every call. Used when testing the
/// controller.
pub struct MockStorage {
    cache: DiskCache,
    seeded: HashMap<(u32, u32), u8>,
    calls: RefCell<Vec<MockCall>>,
    fail: bool,
}

impl MockStorage {
    pub fn new() -> Self {
        MockStorage {
            cache: DiskCache::new(Geometry::new(1, 1).unwrap()),
            seeded: HashMap::new(),
            calls: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    /// A mock whose every access fails with an addressing error.
    pub fn failing() -> Self {
        MockStorage {
            fail: true,
            ..Self::new()
        }
    }

    pub fn seed(&mut self, sector: u32, byte: u32, value: u8) {
        self.seeded.insert((sector, byte), value);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }
}

impl StorageBackend for MockStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        self.calls.borrow_mut().push(MockCall::Get { sector, byte });
        if self.fail {
            return Err(DiskError::OutOfRange { sector, byte });
        }
        Ok(self.seeded.get(&(sector, byte)).copied().unwrap_or(0))
    }

    fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        self.calls.borrow_mut().push(MockCall::Set { sector, byte, value });
        if self.fail {
            return Err(DiskError::OutOfRange { sector, byte });
        }
        self.seeded.insert((sector, byte), value);
        Ok(())
    }

    fn clear_disk(&mut self) -> DiskResult<()> {
        self.seeded.clear();
        Ok(())
    }

    fn load_data(&mut self, _bytes: &[u8]) -> DiskResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> DiskResult<()> {
        Ok(())
    }
}
