use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::persist_interface::*;
use crate::error::{DiskError, DiskResult};

/// A durable store on the host filesystem: one `.entry` file per key inside a
/// directory. Every `set` goes through a temporary file that is renamed into
/// place, so an entry is either the old value or the new one. Any other files
/// in the directory are never counted, read or removed.
pub struct DirMap {
    dir_path: PathBuf,
    usage: usize,
    quota: usize,
}

impl DirMap {
    /// Open (creating if necessary) the store in the given directory.
    pub fn open(dir_path: impl Into<PathBuf>, quota: usize) -> DiskResult<Self> {
        let dir_path = dir_path.into();
        fs::create_dir_all(&dir_path)?;

        // Recompute the usage from whatever is already there.
        let mut usage = 0;
        let mut entries = 0;
        for dir_entry in fs::read_dir(&dir_path)? {
            let dir_entry = dir_entry?;
            let key = match dir_entry.file_name().to_str().and_then(unescape_key) {
                Some(key) => key,
                None => continue,  // Not one of ours.
            };
            let len = dir_entry.metadata()?.len() as usize;
            usage += 2 * (key.len() + len);
            entries += 1;
        }
        info!("Opened store '{}' with {} entries ({} of {} bytes used).",
              dir_path.display(), entries, usage, quota);

        Ok(DirMap {
            dir_path,
            usage,
            quota,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir_path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir_path.join(escape_key(key))
    }
}

impl PersistentMap for DirMap {
    fn get(&self, key: &str) -> DiskResult<Option<String>> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(DiskError::CorruptEntry { key: key.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> DiskResult<()> {
        let path = self.entry_path(key);
        let old_cost = match fs::metadata(&path) {
            Ok(meta) => 2 * (key.len() + meta.len() as usize),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let usage = charge(self.usage, self.quota, old_cost, entry_cost(key, value))?;

        let mut file = NamedTempFile::new_in(&self.dir_path)?;
        file.write_all(value.as_bytes())?;
        file.persist(&path).map_err(|e| e.error)?;
        self.usage = usage;
        Ok(())
    }

    fn clear(&mut self) -> DiskResult<()> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.dir_path)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_name().to_str().and_then(unescape_key).is_some() {
                fs::remove_file(dir_entry.path())?;
                removed += 1;
            }
        }
        debug!("Cleared {} entries from '{}'.", removed, self.dir_path.display());
        self.usage = 0;
        Ok(())
    }

    fn usage(&self) -> usize {
        self.usage
    }

    fn quota(&self) -> usize {
        self.quota
    }
}

/// Extension marking a file as one of the store's entries.
const ENTRY_EXTENSION: &str = ".entry";

/// Turn a key into a safe file name: anything other than ASCII alphanumerics,
/// '-' and '_' becomes `%XX`, and the entry extension is appended.
fn escape_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + ENTRY_EXTENSION.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name.push_str(ENTRY_EXTENSION);
    name
}

/// Reverse `escape_key`. Returns `None` for names it could not have produced,
/// such as the temporary files from an interrupted `set` or anything the user
/// keeps in the same directory.
fn unescape_key(name: &str) -> Option<String> {
    let name = name.strip_suffix(ENTRY_EXTENSION)?;
    let mut bytes = Vec::with_capacity(name.len());
    let mut iter = name.bytes();
    while let Some(byte) = iter.next() {
        match byte {
            b'%' => {
                let hex = [iter.next()?, iter.next()?];
                let hex = std::str::from_utf8(&hex).ok()?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
            }
            b'-' | b'_' => bytes.push(byte),
            _ if byte.is_ascii_alphanumeric() => bytes.push(byte),
            _ => return None,
        }
    }
    if bytes.is_empty() {
        return None;
    }
    String::from_utf8(bytes).ok()
}
