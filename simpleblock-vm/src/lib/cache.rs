use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{DiskError, DiskResult};
use crate::geometry::Geometry;

/// MIME prefix of the links produced by `DiskCache::download_link`.
pub const DOWNLOAD_LINK_PREFIX: &str = "data:application/octet-stream;base64,";

/// A full in-memory mirror of a disk image. Reads and writes are always
/// O(1) regardless of how slow the backend behind it is.
pub struct DiskCache {
    geometry: Geometry,
    data: Vec<u8>,
}

impl DiskCache {
    /// Construct a zero-filled cache.
    pub fn new(geometry: Geometry) -> Self {
        DiskCache {
            geometry,
            data: vec![0; geometry.image_len()],
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn get_byte(&self, sector: u32, byte: u32) -> DiskResult<u8> {
        Ok(self.data[self.geometry.offset(sector, byte)?])
    }

    pub fn set_byte(&mut self, sector: u32, byte: u32, value: u8) -> DiskResult<()> {
        let index = self.geometry.offset(sector, byte)?;
        self.data[index] = value;
        Ok(())
    }

    /// Borrow a whole sector.
    pub fn sector(&self, sector: u32) -> DiskResult<&[u8]> {
        Ok(&self.data[self.geometry.sector_range(sector)?])
    }

    /// Overwrite a whole sector; `bytes` must be exactly one sector long.
    pub fn set_sector(&mut self, sector: u32, bytes: &[u8]) -> DiskResult<()> {
        let range = self.geometry.sector_range(sector)?;
        if bytes.len() != range.len() {
            return Err(DiskError::SizeMismatch {
                expected: range.len(),
                actual: bytes.len(),
            });
        }
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Zero the whole image.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Replace the whole image. The image is only replaced if `bytes` is
    /// exactly the size of the disk; otherwise nothing changes.
    pub fn load_data(&mut self, bytes: &[u8]) -> DiskResult<()> {
        if bytes.len() != self.data.len() {
            return Err(DiskError::SizeMismatch {
                expected: self.data.len(),
                actual: bytes.len(),
            });
        }
        self.data.copy_from_slice(bytes);
        Ok(())
    }

    /// A copy of the whole image.
    pub fn export_image(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// A `data:` URL containing the whole image, ready to be offered as a
    /// download.
    pub fn download_link(&self) -> String {
        let encoded = STANDARD.encode(&self.data);
        let mut link = String::with_capacity(DOWNLOAD_LINK_PREFIX.len() + encoded.len());
        link.push_str(DOWNLOAD_LINK_PREFIX);
        link.push_str(&encoded);
        link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> DiskCache {
        DiskCache::new(Geometry::new(4, 8).unwrap())
    }

    #[test]
    fn test_starts_zeroed() {
        let cache = small();
        assert_eq!(cache.as_bytes().len(), 32);
        assert!(cache.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_byte_addressing() {
        let mut cache = small();
        cache.set_byte(2, 3, 0xAB).unwrap();
        assert_eq!(cache.get_byte(2, 3).unwrap(), 0xAB);
        assert_eq!(cache.as_bytes()[2 * 8 + 3], 0xAB);
        assert_eq!(cache.sector(2).unwrap(), &[0, 0, 0, 0xAB, 0, 0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let mut cache = small();
        assert!(matches!(cache.get_byte(4, 0), Err(DiskError::OutOfRange { .. })));
        assert!(matches!(cache.get_byte(0, 8), Err(DiskError::OutOfRange { .. })));
        assert!(matches!(cache.set_byte(0xFFFF, 0, 1), Err(DiskError::OutOfRange { .. })));
        // Byte 8 of sector 0 must not alias byte 0 of sector 1.
        assert!(cache.set_byte(0, 8, 1).is_err());
        assert_eq!(cache.get_byte(1, 0).unwrap(), 0);
    }

    #[test]
    fn test_load_data_size_mismatch() {
        let mut cache = small();
        cache.set_byte(0, 0, 7).unwrap();
        for len in [0, 31, 33] {
            match cache.load_data(&vec![0xFF; len]) {
                Err(DiskError::SizeMismatch { expected, actual }) => {
                    assert_eq!(expected, 32);
                    assert_eq!(actual, len);
                }
                other => panic!("Expected size mismatch, got {:?}", other),
            }
        }
        // Nothing was overwritten.
        assert_eq!(cache.get_byte(0, 0).unwrap(), 7);
        assert!(cache.as_bytes()[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_export_import() {
        let mut cache = small();
        let image: Vec<u8> = (0..32).collect();
        cache.load_data(&image).unwrap();
        assert_eq!(cache.export_image(), image);
        assert_eq!(cache.get_byte(3, 7).unwrap(), 31);

        let exported = cache.export_image();
        cache.load_data(&exported).unwrap();
        assert_eq!(cache.export_image(), image);

        cache.clear();
        assert!(cache.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(cache.geometry(), Geometry::new(4, 8).unwrap());
    }

    #[test]
    fn test_download_link() {
        let mut cache = DiskCache::new(Geometry::new(1, 3).unwrap());
        cache.load_data(b"abc").unwrap();
        assert_eq!(cache.download_link(), "data:application/octet-stream;base64,YWJj");
    }

    #[test]
    fn test_set_sector() {
        let mut cache = small();
        cache.set_sector(1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(cache.get_byte(1, 7).unwrap(), 8);
        assert!(cache.set_sector(1, &[1, 2, 3]).is_err());
        assert!(cache.set_sector(4, &[0; 8]).is_err());
    }
}
