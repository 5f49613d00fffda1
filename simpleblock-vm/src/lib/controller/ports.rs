use std::ops::Range;

use log::trace;

use super::SimpleBlockController;
use crate::error::{DiskError, DiskResult};
use crate::storage::StorageBackend;

pub const DEFAULT_BASE_PORT: u16 = 0x3F0;

// Offsets from the base port claimed for each direction.
pub const READ_PORTS: Range<u16> = 0..2;   // STATUS, VAL
pub const WRITE_PORTS: Range<u16> = 1..6;  // VAL, OPMODE, SECLOC, BYTELOC, DO_OP

/// A controller attached to the I/O port space at an 8-aligned base port.
/// The register index is the low 3 bits of the port number.
pub struct PortMapping<S> {
    base: u16,
    controller: SimpleBlockController<S>,
}

impl<S: StorageBackend> PortMapping<S> {
    pub fn new(base: u16, controller: SimpleBlockController<S>) -> DiskResult<Self> {
        if base & 7 != 0 {
            return Err(DiskError::InvalidConfig(
                format!("base port {:#06X} is not 8-aligned", base)));
        }
        Ok(PortMapping { base, controller })
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn controller(&self) -> &SimpleBlockController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SimpleBlockController<S> {
        &mut self.controller
    }

    pub fn into_controller(self) -> SimpleBlockController<S> {
        self.controller
    }

    /// Read from a port. `None` means the port does not belong to this device.
    pub fn read_port(&mut self, port: u16) -> Option<u8> {
        if !self.claims(port, READ_PORTS) {
            return None;
        }
        Some(self.controller.read_register((port & 7) as u8))
    }

    /// Write to a port, returning whether this device handled it.
    pub fn write_port(&mut self, port: u16, value: u8) -> bool {
        if !self.claims(port, WRITE_PORTS) {
            return false;
        }
        self.controller.write_register((port & 7) as u8, value);
        true
    }

    fn claims(&self, port: u16, offsets: Range<u16>) -> bool {
        let claimed = port.checked_sub(self.base)
            .map_or(false, |offset| offsets.contains(&offset));
        if !claimed {
            trace!("port {:#06X} not claimed", port);
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::*;
    use crate::init_test_logging;
    use crate::storage::{MockCall, MockStorage};

    fn mapping(base: u16) -> PortMapping<MockStorage> {
        PortMapping::new(base, SimpleBlockController::new(MockStorage::new())).unwrap()
    }

    #[test]
    fn test_unaligned_base_rejected() {
        for base in [0x3F1, 0x3F4, 0x3F7, 0x0001] {
            let result = PortMapping::new(base, SimpleBlockController::new(MockStorage::new()));
            assert!(matches!(result, Err(DiskError::InvalidConfig(_))));
        }
        assert_eq!(mapping(0xFFF8).read_port(0xFFF9), Some(0x00));
        assert_eq!(mapping(0x1F0).base(), 0x1F0);
    }

    #[test]
    fn test_read_range() {
        init_test_logging();
        let mut ports = mapping(DEFAULT_BASE_PORT);
        assert_eq!(ports.read_port(0x3F0), Some(0x00));
        assert_eq!(ports.read_port(0x3F1), Some(0x00));
        for port in [0x000, 0x3EF, 0x3F2, 0x3F3, 0x3F5, 0x3F7, 0x3F8, 0x7F0] {
            assert_eq!(ports.read_port(port), None);
        }
    }

    #[test]
    fn test_write_range() {
        init_test_logging();
        let mut ports = mapping(DEFAULT_BASE_PORT);
        assert!(!ports.write_port(0x3F0, 0xFF));
        assert_eq!(ports.controller().status(), Status::Ready);
        for port in 0x3F1..0x3F6 {
            assert!(ports.write_port(port, 0x00));
        }
        assert!(!ports.write_port(0x3F6, 0x00));
        assert!(!ports.write_port(0x3F7, 0x00));
        assert!(!ports.write_port(0x3EF, 0x00));
        assert!(!ports.write_port(0x3F9, 0x00));
    }

    #[test]
    fn test_ports_reach_registers() {
        init_test_logging();
        let mut storage = MockStorage::new();
        storage.seed(0x0001, 0x0102, 0x77);
        let controller = SimpleBlockController::new(storage);
        let mut ports = PortMapping::new(0x1F0, controller).unwrap();

        assert!(ports.write_port(0x1F0 + REGISTER_OPMODE as u16, OPMODE_READ));
        assert_eq!(ports.read_port(0x1F0), Some(0xFF));
        ports.write_port(0x1F3, 0x00);
        ports.write_port(0x1F3, 0x01);
        ports.write_port(0x1F4, 0x01);
        ports.write_port(0x1F4, 0x02);
        ports.write_port(0x1F5, 0xFF);
        assert_eq!(ports.read_port(0x1F1), Some(0x77));
        assert_eq!(ports.read_port(0x1F0), Some(0x00));

        let controller = ports.into_controller();
        assert_eq!(controller.backend().calls(),
                   vec![MockCall::Get { sector: 1, byte: 0x0102 }]);
    }
}
