//! Storage backends: the strategies that actually hold the disk image.
//!
//! Every backend owns a `DiskCache` mirroring the full image. The persistent
//! ones additionally write through to a `PersistentMap`, each with its own
//! incompatible encoding:
//!
//! - `storage_memory`: the cache and nothing else; lost on exit.
//! - `storage_hex`: one entry per sector, two hex digits per byte.
//! - `storage_words`: one entry per 4-byte word. Far more store operations per
//!   byte; only useful as a slow fallback.

mod marker;
mod storage_hex;
mod storage_interface;
mod storage_memory;
mod storage_words;

pub use storage_hex::HexStorage;
pub use storage_interface::*;
pub use storage_memory::MemoryStorage;
pub use storage_words::WordStorage;

// Mock implementation for testing.
#[cfg(test)]
mod storage_mock;
#[cfg(test)]
pub use storage_mock::{MockCall, MockStorage};

use log::{info, warn};

use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;
use crate::persist::PersistentMap;

/// A backend together with the reason it is not the one that was asked for,
/// if any.
pub struct OpenedBackend {
    pub backend: Box<dyn StorageBackend>,
    pub warning: Option<DiskError>,
}

/// Open the backend named by `choice`. This never fails: if the choice is
/// unknown or the persistent store cannot be used, an in-memory backend is
/// returned instead and the problem is reported as a warning.
pub fn open_backend(choice: &str,
                    store: Option<Box<dyn PersistentMap>>,
                    geometry: Geometry) -> OpenedBackend {
    match choice.parse::<BackendKind>() {
        Ok(kind) => open_backend_kind(kind, store, geometry),
        Err(e) => fall_back(e, geometry),
    }
}

/// Open a backend of the given kind, falling back to memory like
/// `open_backend`.
pub fn open_backend_kind(kind: BackendKind,
                         store: Option<Box<dyn PersistentMap>>,
                         geometry: Geometry) -> OpenedBackend {
    let result = match (kind, store) {
        (BackendKind::Memory, _) => {
            info!("Using in-memory storage ({}).", geometry);
            return OpenedBackend {
                backend: Box::new(MemoryStorage::new(geometry)),
                warning: None,
            };
        }
        (_, None) => Err(DiskError::PersistenceUnavailable(
            format!("no store was provided for the '{}' backend", kind))),
        (BackendKind::Hex, Some(store)) => HexStorage::open(store, geometry)
            .map(|b| Box::new(b) as Box<dyn StorageBackend>),
        (BackendKind::Words, Some(store)) => WordStorage::open(store, geometry)
            .map(|b| Box::new(b) as Box<dyn StorageBackend>),
    };
    match result {
        Ok(backend) => {
            info!("Using {} storage ({}).", kind, geometry);
            OpenedBackend { backend, warning: None }
        }
        Err(e) => fall_back(e, geometry),
    }
}

fn fall_back(reason: DiskError, geometry: Geometry) -> OpenedBackend {
    warn!("{}; falling back to non-persistent memory storage.", reason);
    OpenedBackend {
        backend: Box::new(MemoryStorage::new(geometry)),
        warning: Some(reason),
    }
}

/// Shared checks that every backend must pass.
#[cfg(test)]
pub(crate) fn check_backend_contract(backend: &mut dyn StorageBackend) {
    let geometry = backend.geometry();
    let last_sector = geometry.sector_count() - 1;
    let last_byte = geometry.sector_size() - 1;

    // Round trip at the corners and somewhere in the middle.
    let addresses = [(0, 0), (0, last_byte), (last_sector, 0),
                     (last_sector, last_byte), (last_sector / 2, last_byte / 2)];
    for (i, &(sector, byte)) in addresses.iter().enumerate() {
        let value = 0xA0 + i as u8;
        backend.set_byte(sector, byte, value).unwrap();
        assert_eq!(backend.get_byte(sector, byte).unwrap(), value);
    }
    for (i, &(sector, byte)) in addresses.iter().enumerate() {
        assert_eq!(backend.get_byte(sector, byte).unwrap(), 0xA0 + i as u8);
    }

    // Out of range fails without panicking.
    assert!(matches!(backend.get_byte(last_sector + 1, 0), Err(DiskError::OutOfRange { .. })));
    assert!(matches!(backend.get_byte(0, last_byte + 1), Err(DiskError::OutOfRange { .. })));
    assert!(matches!(backend.set_byte(0, last_byte + 1, 1), Err(DiskError::OutOfRange { .. })));

    // Export then import changes nothing.
    let image = backend.export_image();
    assert_eq!(image.len(), geometry.image_len());
    backend.load_data(&image).unwrap();
    assert_eq!(backend.export_image(), image);

    // A wrongly sized image is rejected and changes nothing.
    assert!(matches!(backend.load_data(&image[1..]), Err(DiskError::SizeMismatch { .. })));
    assert_eq!(backend.export_image(), image);

    // Clearing zeroes everything.
    backend.clear_disk().unwrap();
    for sector in 0..geometry.sector_count() {
        for byte in 0..geometry.sector_size() {
            assert_eq!(backend.get_byte(sector, byte).unwrap(), 0);
        }
    }
}
