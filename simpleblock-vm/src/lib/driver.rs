//! The guest's side of the port protocol, for driving a device from the host
//! exactly as a kernel would.

use log::debug;

use crate::controller::*;
use crate::error::{DiskError, DiskResult};
use crate::storage::StorageBackend;

/// Offsets of each register from the base port.
const STATUS: u16 = REGISTER_STATUS as u16;
const VAL: u16 = REGISTER_VAL as u16;
const OPMODE: u16 = REGISTER_OPMODE as u16;
const SECLOC: u16 = REGISTER_SECLOC as u16;
const BYTELOC: u16 = REGISTER_BYTELOC as u16;
const DO_OP: u16 = REGISTER_DO_OP as u16;

/// Drives one `PortMapping` through port reads and writes only.
pub struct GuestDriver<'a, S> {
    ports: &'a mut PortMapping<S>,
}

impl<'a, S: StorageBackend> GuestDriver<'a, S> {
    pub fn new(ports: &'a mut PortMapping<S>) -> Self {
        GuestDriver { ports }
    }

    pub fn read_byte(&mut self, sector: u32, byte: u32) -> DiskResult<u8> {
        self.begin(OPMODE_READ, sector, byte)?;
        self.outb(DO_OP, 0xFF);
        let value = self.inb(VAL);
        self.check_fault()?;
        Ok(value)
    }

    pub fn write_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        self.begin(OPMODE_WRITE, sector, byte)?;
        self.outb(VAL, value);
        self.outb(DO_OP, 0xFF);
        self.check_fault()
    }

    /// Read `count` whole sectors starting at `start`.
    pub fn read_sectors(&mut self, start: u32, count: u32) -> DiskResult<Vec<u8>> {
        let end = self.check_sectors(start, count)?;
        let sector_size = self.sector_size();
        let mut buf = Vec::with_capacity(count as usize * sector_size as usize);
        for sector in start..end {
            debug!("Reading sector {}", sector);
            for byte in 0..sector_size {
                buf.push(self.read_byte(sector, byte)?);
            }
        }
        Ok(buf)
    }

    /// Write whole sectors starting at `start`. A trailing partial sector is
    /// written as far as it goes.
    pub fn write_sectors(&mut self, start: u32, data: &[u8]) -> DiskResult<()> {
        let sector_size = self.sector_size() as usize;
        let count = u32::try_from((data.len() + sector_size - 1) / sector_size)
            .map_err(|_| DiskError::OutOfRange { sector: u32::MAX, byte: 0 })?;
        self.check_sectors(start, count)?;
        for (sector, chunk) in (start..).zip(data.chunks(sector_size)) {
            debug!("Writing sector {}", sector);
            for (byte, value) in (0..).zip(chunk) {
                self.write_byte(sector, byte, *value)?;
            }
        }
        Ok(())
    }

    /// Check that `count` sectors from `start` are all on the disk, returning
    /// the end of the run.
    fn check_sectors(&self, start: u32, count: u32) -> DiskResult<u32> {
        let sector_count = self.ports.controller().backend().geometry().sector_count();
        match start.checked_add(count) {
            Some(end) if end <= sector_count => Ok(end),
            _ => Err(DiskError::OutOfRange { sector: start.saturating_add(count), byte: 0 }),
        }
    }

    fn sector_size(&self) -> u32 {
        self.ports.controller().backend().geometry().sector_size()
    }

    /// Check the device is ready, select the operation and load the address.
    fn begin(&mut self, operation: u8, sector: u32, byte: u32) -> DiskResult<()> {
        let (sector16, byte16) = match (u16::try_from(sector), u16::try_from(byte)) {
            (Ok(s), Ok(b)) => (s, b),
            _ => return Err(DiskError::OutOfRange { sector, byte }),
        };
        if self.inb(STATUS) != Status::Ready.as_byte() {
            return Err(DiskError::NotReady);
        }
        self.outb(OPMODE, operation);
        let [sec_hi, sec_lo] = sector16.to_be_bytes();
        self.outb(SECLOC, sec_hi);
        self.outb(SECLOC, sec_lo);
        let [byte_hi, byte_lo] = byte16.to_be_bytes();
        self.outb(BYTELOC, byte_hi);
        self.outb(BYTELOC, byte_lo);
        Ok(())
    }

    fn check_fault(&mut self) -> DiskResult<()> {
        match self.ports.controller_mut().take_fault() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn inb(&mut self, offset: u16) -> u8 {
        let port = self.ports.base() + offset;
        self.ports.read_port(port).unwrap_or(INVALID_REGISTER)
    }

    fn outb(&mut self, offset: u16, value: u8) {
        let port = self.ports.base() + offset;
        self.ports.write_port(port, value);
    }
}
