use std::fmt::{Display, Formatter};

use crate::error::{DiskError, DiskResult};

pub const DEFAULT_SECTOR_COUNT: u32 = 2048;
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// The controller addresses sectors and bytes with 16 bits each.
pub const MAX_DIMENSION: u32 = 0x10000;

/// The fixed shape of a disk: `sector_count` sectors of `sector_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    sector_count: u32,
    sector_size: u32,
}

impl Geometry {
    pub fn new(sector_count: u32, sector_size: u32) -> DiskResult<Self> {
        let valid = |n: u32| (1..=MAX_DIMENSION).contains(&n);
        if !valid(sector_count) || !valid(sector_size) {
            return Err(DiskError::InvalidGeometry { sector_count, sector_size });
        }
        Ok(Self { sector_count, sector_size })
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Total size of the disk image in bytes.
    pub fn image_len(&self) -> usize {
        self.sector_count as usize * self.sector_size as usize
    }

    /// Flat image index of the given address, or an error if either
    /// coordinate is outside the disk.
    pub fn offset(&self, sector: u32, byte: u32) -> DiskResult<usize> {
        if sector >= self.sector_count || byte >= self.sector_size {
            return Err(DiskError::OutOfRange { sector, byte });
        }
        Ok(sector as usize * self.sector_size as usize + byte as usize)
    }

    /// Image index range covered by one sector.
    pub fn sector_range(&self, sector: u32) -> DiskResult<std::ops::Range<usize>> {
        let start = self.offset(sector, 0)?;
        Ok(start..start + self.sector_size as usize)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            sector_count: DEFAULT_SECTOR_COUNT,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.sector_count, self.sector_size)
    }
}
