//! The SimpleBlock controller: a byte-at-a-time block device driven entirely
//! through six registers.
//!
//! A guest reads a byte by writing OPMODE=READ (locking the device), pushing
//! the sector and byte addresses high byte first into SECLOC and BYTELOC,
//! writing DO_OP, then reading VAL (which unlocks the device). A write is the
//! same with OPMODE=WRITE and a VAL write before DO_OP; the device unlocks as
//! soon as the write is done.

mod ports;

pub use ports::{PortMapping, DEFAULT_BASE_PORT, READ_PORTS, WRITE_PORTS};

use log::{debug, trace, warn};

use crate::error::DiskError;
use crate::storage::StorageBackend;

// Register indices.
pub const REGISTER_STATUS: u8 = 0;   // R: status.
pub const REGISTER_VAL: u8 = 1;      // R/W: data; reading unlocks.
pub const REGISTER_OPMODE: u8 = 2;   // W: operation; writing locks.
pub const REGISTER_SECLOC: u8 = 3;   // W: sector address shift pair.
pub const REGISTER_BYTELOC: u8 = 4;  // W: byte address shift pair.
pub const REGISTER_DO_OP: u8 = 5;    // W: execute.

// Operation codes.
pub const OPMODE_READ: u8 = 0x00;
pub const OPMODE_WRITE: u8 = 0xFF;

/// Returned when reading a register that cannot be read.
pub const INVALID_REGISTER: u8 = 0xFF;

/// The status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Locked,
}

impl Status {
    pub fn as_byte(&self) -> u8 {
        match self {
            Status::Ready => 0x00,
            Status::Locked => 0xFF,
        }
    }
}

/// Two byte registers where each write pushes the previous value up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ShiftPair {
    hi: u8,
    lo: u8,
}

impl ShiftPair {
    fn push(&mut self, value: u8) {
        self.hi = self.lo;
        self.lo = value;
    }

    fn value(&self) -> u32 {
        u16::from_be_bytes([self.hi, self.lo]) as u32
    }
}

/// The register file and the backend it operates on.
pub struct SimpleBlockController<S> {
    backend: S,
    status: Status,
    val: u8,
    operation: u8,
    secloc: ShiftPair,
    byteloc: ShiftPair,
    fault: Option<DiskError>,
}

impl<S: StorageBackend> SimpleBlockController<S> {
    /// Construct a ready controller operating on the given backend.
    pub fn new(backend: S) -> Self {
        SimpleBlockController {
            backend,
            status: Status::Ready,
            val: 0,
            operation: OPMODE_READ,
            secloc: ShiftPair::default(),
            byteloc: ShiftPair::default(),
            fault: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    /// Take the error from the most recent failed operation, if any. The
    /// guest never sees these; they are for the host.
    pub fn take_fault(&mut self) -> Option<DiskError> {
        self.fault.take()
    }

    /// Handle a register read.
    pub fn read_register(&mut self, register: u8) -> u8 {
        let value = match register {
            REGISTER_STATUS => self.status.as_byte(),
            REGISTER_VAL => {
                self.status = Status::Ready;
                self.val
            }
            _ => INVALID_REGISTER,
        };
        trace!("read reg{}: {:#04X}", register, value);
        value
    }

    /// Handle a register write. Writes to unknown registers are ignored.
    pub fn write_register(&mut self, register: u8, value: u8) {
        trace!("write reg{}: {:#04X}", register, value);
        match register {
            REGISTER_VAL => self.val = value,
            REGISTER_OPMODE => {
                // Unknown operations are kept and simply never execute.
                self.operation = value;
                self.status = Status::Locked;
            }
            REGISTER_SECLOC => self.secloc.push(value),
            REGISTER_BYTELOC => self.byteloc.push(value),
            REGISTER_DO_OP => self.execute(),
            _ => {}
        }
    }

    fn execute(&mut self) {
        let sector = self.secloc.value();
        let byte = self.byteloc.value();

        match self.operation {
            OPMODE_READ => {
                debug!("do_op: READ sector {} byte {}", sector, byte);
                // Stays locked until the guest collects the byte from VAL.
                self.val = match self.backend.get_byte(sector, byte) {
                    Ok(value) => value,
                    Err(e) => {
                        self.record_fault(e);
                        INVALID_REGISTER
                    }
                };
            }
            OPMODE_WRITE => {
                debug!("do_op: WRITE sector {} byte {}: {:#04X}", sector, byte, self.val);
                if let Err(e) = self.backend.set_byte(sector, byte, self.val) {
                    self.record_fault(e);
                }
                self.status = Status::Ready;
            }
            other => debug!("do_op: ignoring unknown operation {:#04X}", other),
        }
    }

    fn record_fault(&mut self, e: DiskError) {
        warn!("Disk operation failed: {}", e);
        self.fault = Some(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::init_test_logging;
    use crate::storage::{MemoryStorage, MockCall, MockStorage};

    /// Set both address pairs the way the guest driver does: high byte first.
    fn set_address<S: StorageBackend>(c: &mut SimpleBlockController<S>, sector: u16, byte: u16) {
        let [sec_hi, sec_lo] = sector.to_be_bytes();
        let [byte_hi, byte_lo] = byte.to_be_bytes();
        c.write_register(REGISTER_SECLOC, sec_hi);
        c.write_register(REGISTER_SECLOC, sec_lo);
        c.write_register(REGISTER_BYTELOC, byte_hi);
        c.write_register(REGISTER_BYTELOC, byte_lo);
    }

    #[test]
    fn test_initial_state() {
        let mut c = SimpleBlockController::new(MockStorage::new());
        assert_eq!(c.status(), Status::Ready);
        assert_eq!(c.read_register(REGISTER_STATUS), 0x00);
        assert_eq!(c.read_register(REGISTER_VAL), 0);
    }

    #[test]
    fn test_shift_pairs_assemble_addresses() {
        init_test_logging();
        let mut storage = MockStorage::new();
        storage.seed(0x1234, 0x0BCD, 0x5A);
        let mut c = SimpleBlockController::new(storage);

        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        c.write_register(REGISTER_SECLOC, 0x12);
        c.write_register(REGISTER_SECLOC, 0x34);
        c.write_register(REGISTER_BYTELOC, 0x0B);
        c.write_register(REGISTER_BYTELOC, 0xCD);
        c.write_register(REGISTER_DO_OP, 0xFF);

        assert_eq!(c.read_register(REGISTER_VAL), 0x5A);
        assert_eq!(c.backend().calls(), vec![MockCall::Get { sector: 0x1234, byte: 0x0BCD }]);
    }

    #[test]
    fn test_shift_pair_keeps_last_two_writes() {
        init_test_logging();
        let mut c = SimpleBlockController::new(MockStorage::new());
        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        for value in [0xAA, 0xBB, 0x01, 0x02] {
            c.write_register(REGISTER_SECLOC, value);
        }
        c.write_register(REGISTER_BYTELOC, 0x07);
        c.write_register(REGISTER_DO_OP, 0xFF);
        // Only one BYTELOC write: the high byte is still zero.
        assert_eq!(c.backend().calls(), vec![MockCall::Get { sector: 0x0102, byte: 0x0007 }]);
    }

    #[test]
    fn test_read_stays_locked_until_val_read() {
        init_test_logging();
        let mut storage = MockStorage::new();
        storage.seed(3, 9, 0xC3);
        let mut c = SimpleBlockController::new(storage);

        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        assert_eq!(c.status(), Status::Locked);
        set_address(&mut c, 3, 9);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.read_register(REGISTER_STATUS), 0xFF);
        assert_eq!(c.read_register(REGISTER_STATUS), 0xFF);

        assert_eq!(c.read_register(REGISTER_VAL), 0xC3);
        assert_eq!(c.read_register(REGISTER_STATUS), 0x00);
    }

    #[test]
    fn test_write_unlocks_immediately() {
        init_test_logging();
        let mut c = SimpleBlockController::new(MockStorage::new());

        c.write_register(REGISTER_OPMODE, OPMODE_WRITE);
        assert_eq!(c.status(), Status::Locked);
        c.write_register(REGISTER_VAL, 0x42);
        set_address(&mut c, 0x0102, 0x01FF);
        c.write_register(REGISTER_DO_OP, 0xFF);

        assert_eq!(c.status(), Status::Ready);
        assert_eq!(c.backend().calls(),
                   vec![MockCall::Set { sector: 0x0102, byte: 0x01FF, value: 0x42 }]);
    }

    #[test]
    fn test_unknown_registers() {
        init_test_logging();
        let mut c = SimpleBlockController::new(MockStorage::new());
        c.write_register(REGISTER_VAL, 0x10);
        for register in [REGISTER_OPMODE, REGISTER_SECLOC, REGISTER_BYTELOC,
                         REGISTER_DO_OP, 6, 7, 0xFF] {
            assert_eq!(c.read_register(register), INVALID_REGISTER);
        }
        // Reading an invalid register did not unlock or change anything.
        c.write_register(REGISTER_OPMODE, OPMODE_WRITE);
        assert_eq!(c.read_register(6), INVALID_REGISTER);
        assert_eq!(c.status(), Status::Locked);

        // Writes to unknown registers are ignored.
        c.write_register(REGISTER_STATUS, 0x00);
        c.write_register(6, 0x00);
        c.write_register(7, 0x00);
        assert_eq!(c.status(), Status::Locked);
        assert!(c.backend().calls().is_empty());
        assert_eq!(c.read_register(REGISTER_VAL), 0x10);
    }

    #[test]
    fn test_unknown_operation_does_nothing() {
        init_test_logging();
        let mut c = SimpleBlockController::new(MockStorage::new());
        c.write_register(REGISTER_OPMODE, 0x7F);
        assert_eq!(c.status(), Status::Locked);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert!(c.backend().calls().is_empty());
        assert_eq!(c.status(), Status::Locked);
        c.read_register(REGISTER_VAL);
        assert_eq!(c.status(), Status::Ready);
    }

    #[test]
    fn test_faults_are_recorded() {
        init_test_logging();
        let mut c = SimpleBlockController::new(MockStorage::failing());

        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        set_address(&mut c, 1, 2);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.read_register(REGISTER_VAL), INVALID_REGISTER);
        assert!(matches!(c.take_fault(), Some(DiskError::OutOfRange { sector: 1, byte: 2 })));
        assert!(c.take_fault().is_none());

        c.write_register(REGISTER_OPMODE, OPMODE_WRITE);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.status(), Status::Ready);
        assert!(c.take_fault().is_some());
    }

    #[test]
    fn test_against_real_storage() {
        init_test_logging();
        let storage = MemoryStorage::new(Geometry::new(300, 512).unwrap());
        let mut c = SimpleBlockController::new(storage);

        c.write_register(REGISTER_OPMODE, OPMODE_WRITE);
        c.write_register(REGISTER_VAL, 0x99);
        set_address(&mut c, 275, 511);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.backend().get_byte(275, 511).unwrap(), 0x99);

        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.read_register(REGISTER_VAL), 0x99);

        // Past the end of the disk.
        c.write_register(REGISTER_OPMODE, OPMODE_READ);
        set_address(&mut c, 300, 0);
        c.write_register(REGISTER_DO_OP, 0xFF);
        assert_eq!(c.read_register(REGISTER_VAL), INVALID_REGISTER);
        assert!(matches!(c.take_fault(), Some(DiskError::OutOfRange { .. })));
    }
}
