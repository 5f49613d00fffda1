use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use super::persist_interface::*;
use crate::error::DiskResult;

struct Inner {
    entries: AHashMap<String, String>,
    usage: usize,
    quota: usize,
    writes: usize,
}

/// A volatile store living in this process.
///
/// Clones are handles onto the same entries, so a test can hand one to a
/// backend, keep another to inspect what was written, and later reopen a
/// fresh backend on the "same" store.
#[derive(Clone)]
pub struct MemoryMap {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    pub fn with_quota(quota: usize) -> Self {
        MemoryMap {
            inner: Rc::new(RefCell::new(Inner {
                entries: AHashMap::new(),
                usage: 0,
                quota,
                writes: 0,
            })),
        }
    }

    /// Number of successful `set` calls since creation.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentMap for MemoryMap {
    fn get(&self, key: &str) -> DiskResult<Option<String>> {
        Ok(self.inner.borrow().entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> DiskResult<()> {
        let mut inner = self.inner.borrow_mut();
        let old_cost = inner.entries.get(key).map_or(0, |old| entry_cost(key, old));
        inner.usage = charge(inner.usage, inner.quota, old_cost, entry_cost(key, value))?;
        inner.entries.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> DiskResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.usage = 0;
        Ok(())
    }

    fn has(&self, key: &str) -> DiskResult<bool> {
        Ok(self.inner.borrow().entries.contains_key(key))
    }

    fn usage(&self) -> usize {
        self.inner.borrow().usage
    }

    fn quota(&self) -> usize {
        self.inner.borrow().quota
    }
}
