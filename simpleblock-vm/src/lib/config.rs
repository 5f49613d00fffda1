use log::info;

use crate::controller::{PortMapping, SimpleBlockController, DEFAULT_BASE_PORT};
use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;
use crate::persist::PersistentMap;
use crate::storage::{open_backend_kind, BackendKind, OpenedBackend, StorageBackend};

/// Everything needed to bring up a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskConfig {
    pub geometry: Geometry,
    pub base_port: u16,
    pub backend: BackendKind,
}

impl Default for DiskConfig {
    fn default() -> Self {
        DiskConfig {
            geometry: Geometry::default(),
            base_port: DEFAULT_BASE_PORT,
            backend: BackendKind::Hex,
        }
    }
}

/// A disk attached to its ports, plus why its backend is not the configured
/// one, if it isn't.
pub struct Disk {
    pub ports: PortMapping<Box<dyn StorageBackend>>,
    pub warning: Option<DiskError>,
}

impl DiskConfig {
    /// Open the backend and attach a controller at the configured port. Only a
    /// bad port is fatal; backend problems downgrade to memory and are
    /// reported in `warning`.
    pub fn open(&self, store: Option<Box<dyn PersistentMap>>) -> DiskResult<Disk> {
        let OpenedBackend { backend, warning } =
            open_backend_kind(self.backend, store, self.geometry);
        let ports = PortMapping::new(self.base_port, SimpleBlockController::new(backend))?;
        info!("Disk attached at port {:#06X} ({}, {}).",
              self.base_port, ports.controller().backend().kind(), self.geometry);
        Ok(Disk { ports, warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_test_logging;
    use crate::persist::MemoryMap;

    #[test]
    fn test_default() {
        let config = DiskConfig::default();
        assert_eq!(config.geometry.sector_count(), 2048);
        assert_eq!(config.geometry.sector_size(), 512);
        assert_eq!(config.base_port, 0x3F0);
        assert_eq!(config.backend, BackendKind::Hex);
    }

    #[test]
    fn test_open() {
        init_test_logging();
        let config = DiskConfig {
            geometry: Geometry::new(4, 16).unwrap(),
            ..DiskConfig::default()
        };
        let disk = config.open(Some(Box::new(MemoryMap::new()))).unwrap();
        assert!(disk.warning.is_none());
        assert_eq!(disk.ports.base(), 0x3F0);
        assert_eq!(disk.ports.controller().backend().kind(), BackendKind::Hex);
    }

    #[test]
    fn test_open_without_store_falls_back() {
        init_test_logging();
        let disk = DiskConfig::default().open(None).unwrap();
        assert!(matches!(disk.warning, Some(DiskError::PersistenceUnavailable(_))));
        assert_eq!(disk.ports.controller().backend().kind(), BackendKind::Memory);
    }

    #[test]
    fn test_bad_port() {
        init_test_logging();
        let config = DiskConfig {
            base_port: 0x3F3,
            backend: BackendKind::Memory,
            ..DiskConfig::default()
        };
        assert!(matches!(config.open(None), Err(DiskError::InvalidConfig(_))));
    }
}
