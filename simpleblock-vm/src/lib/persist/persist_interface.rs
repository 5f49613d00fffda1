use crate::error::{DiskError, DiskResult};

/// Default capacity of a store, matching what browsers grant web storage.
pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

/// A slow, string-only, capacity-bounded key-value store. Only the
/// persistent storage backends talk to one.
pub trait PersistentMap {
    fn get(&self, key: &str) -> DiskResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> DiskResult<()>;
    fn clear(&mut self) -> DiskResult<()>;

    fn has(&self, key: &str) -> DiskResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Bytes currently charged against the quota.
    fn usage(&self) -> usize;
    fn quota(&self) -> usize;
}

impl<M: PersistentMap + ?Sized> PersistentMap for Box<M> {
    fn get(&self, key: &str) -> DiskResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> DiskResult<()> {
        (**self).set(key, value)
    }

    fn clear(&mut self) -> DiskResult<()> {
        (**self).clear()
    }

    fn has(&self, key: &str) -> DiskResult<bool> {
        (**self).has(key)
    }

    fn usage(&self) -> usize {
        (**self).usage()
    }

    fn quota(&self) -> usize {
        (**self).quota()
    }
}

/// Bytes charged for one entry. Like web storage, every character of the key
/// and value costs two bytes; everything we store is ASCII.
pub fn entry_cost(key: &str, value: &str) -> usize {
    2 * (key.len() + value.len())
}

/// Work out the usage after replacing an entry costing `old_cost` with one
/// costing `new_cost`, failing if that would exceed the quota. An entry can
/// cost more than was counted for it if its file grew behind our back.
pub(super) fn charge(usage: usize, quota: usize,
                     old_cost: usize, new_cost: usize) -> DiskResult<usize> {
    let needed = usage.saturating_sub(old_cost) + new_cost;
    if needed > quota {
        return Err(DiskError::QuotaExceeded { needed, quota });
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge() {
        assert_eq!(charge(0, 100, 0, 40).unwrap(), 40);
        assert_eq!(charge(40, 100, 40, 100).unwrap(), 100);
        assert!(matches!(charge(40, 100, 0, 61),
                         Err(DiskError::QuotaExceeded { needed: 101, quota: 100 })));
        // Replacing an entry that was undercounted never wraps around.
        assert_eq!(charge(10, 100, 30, 20).unwrap(), 20);
    }
}
