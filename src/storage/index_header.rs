//! Index resource header: the 28-byte little-endian header occupying page
//! 0 of every index file.
//!
//! ```text
//! Offset  Size  Description
//! 0       4     magic 0xBADC0FFE
//! 4       4     version (currently 0)
//! 8       4     page size in bytes
//! 12      4     indexed column number
//! 16      4     root page number (0 = none yet)
//! 20      4     first leaf page number (0 = none yet)
//! 24      4     attribute flags (bit 0 = unique)
//! ```
//!
//! The layout is exhaustive at 28 bytes; there is no room for (and this
//! header carries no) checksum field, unlike the teacher's 44-byte header.

use crate::error::{Result, StorageError};
use crate::types::PageSize;

pub const MAGIC: u32 = crate::types::HEADER_MAGIC;
pub const INDEX_HEADER_SIZE: usize = 28;

const UNIQUE_BIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub page_size: PageSize,
    pub indexed_column_number: u32,
    /// 0 means no root page has been allocated yet.
    pub root_page_number: u32,
    /// 0 means no leaf page has been allocated yet.
    pub first_leaf_page_number: u32,
    pub unique: bool,
}

impl IndexHeader {
    pub fn new(page_size: PageSize, indexed_column_number: u32, unique: bool) -> Self {
        Self {
            page_size,
            indexed_column_number,
            root_page_number: 0,
            first_leaf_page_number: 0,
            unique,
        }
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INDEX_HEADER_SIZE {
            return Err(StorageError::invalid_index_file("header too short"));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(StorageError::invalid_index_file("bad magic"));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != 0 {
            return Err(StorageError::invalid_index_file(format!(
                "unsupported index version: {version}"
            )));
        }
        let page_size_bytes = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let page_size = PageSize::from_bytes(page_size_bytes)?;
        let indexed_column_number = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let root_page_number = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let first_leaf_page_number = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        let flags = u32::from_le_bytes(bytes[24..28].try_into().unwrap());

        Ok(Self {
            page_size,
            indexed_column_number,
            root_page_number,
            first_leaf_page_number,
            unique: flags & UNIQUE_BIT != 0,
        })
    }

    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..INDEX_HEADER_SIZE].fill(0);
        bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&(self.page_size.bytes() as u32).to_le_bytes());
        bytes[12..16].copy_from_slice(&self.indexed_column_number.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.root_page_number.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.first_leaf_page_number.to_le_bytes());
        let flags: u32 = if self.unique { UNIQUE_BIT } else { 0 };
        bytes[24..28].copy_from_slice(&flags.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut header = IndexHeader::new(PageSize::Kb4, 2, true);
        header.root_page_number = 1;
        header.first_leaf_page_number = 1;

        let mut bytes = vec![0u8; INDEX_HEADER_SIZE];
        header.write(&mut bytes);

        let restored = IndexHeader::read(&bytes).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; INDEX_HEADER_SIZE];
        assert!(IndexHeader::read(&bytes).is_err());
    }

    #[test]
    fn rejects_unsupported_page_size() {
        let mut header = IndexHeader::new(PageSize::Kb4, 0, false);
        let mut bytes = vec![0u8; INDEX_HEADER_SIZE];
        header.write(&mut bytes);
        bytes[8..12].copy_from_slice(&1234u32.to_le_bytes());
        assert!(IndexHeader::read(&bytes).is_err());
    }
}
