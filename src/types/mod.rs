//! Common types used throughout the storage engine: page identifiers, the
//! closed enumeration of page sizes and page/record kinds, and the typed
//! field codec (`Kind`, `Field`, `Tuple`) that every higher layer encodes
//! and decodes through.

mod date;
mod field;
mod kind;
mod page_id;
mod rid;
mod time;
mod tuple;

pub use date::DateValue;
pub use field::Field;
pub use kind::Kind;
pub use page_id::PageId;
pub use rid::Rid;
pub use time::TimeValue;
pub use tuple::Tuple;

use crate::error::{Result, StorageError};

/// The generic index-page magic stamped into bytes 0-3 of every page other
/// than page 0 (the resource header).
pub const PAGE_MAGIC: u32 = 0xFEED_FACE;

/// The resource header's own magic, stamped into page 0.
pub const HEADER_MAGIC: u32 = 0xBADC_0FFE;

/// Closed enumeration of supported page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PageSize {
    Kb4,
    Kb8,
    Kb16,
    Kb32,
}

impl PageSize {
    pub const fn bytes(self) -> usize {
        match self {
            PageSize::Kb4 => 4096,
            PageSize::Kb8 => 8192,
            PageSize::Kb16 => 16384,
            PageSize::Kb32 => 32768,
        }
    }

    pub fn from_bytes(bytes: u32) -> Result<Self> {
        match bytes {
            4096 => Ok(PageSize::Kb4),
            8192 => Ok(PageSize::Kb8),
            16384 => Ok(PageSize::Kb16),
            32768 => Ok(PageSize::Kb32),
            other => Err(StorageError::bad_format(format!(
                "unsupported page size: {other} bytes"
            ))),
        }
    }
}

/// Page type code stamped at offset 8 of the generic index-page header.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    InnerNode = 1,
    LeafNode = 2,
}

impl PageType {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(PageType::InnerNode),
            2 => Ok(PageType::LeafNode),
            other => Err(StorageError::bad_format(format!(
                "unknown page type code: {other}"
            ))),
        }
    }

    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn is_leaf(self) -> bool {
        matches!(self, PageType::LeafNode)
    }

    pub const fn is_inner(self) -> bool {
        matches!(self, PageType::InnerNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_round_trips_known_values() {
        for ps in [PageSize::Kb4, PageSize::Kb8, PageSize::Kb16, PageSize::Kb32] {
            assert_eq!(PageSize::from_bytes(ps.bytes() as u32).unwrap(), ps);
        }
    }

    #[test]
    fn page_size_rejects_unknown_values() {
        assert!(PageSize::from_bytes(1234).is_err());
    }

    #[test]
    fn page_type_round_trips() {
        assert_eq!(PageType::from_code(1).unwrap(), PageType::InnerNode);
        assert_eq!(PageType::from_code(2).unwrap(), PageType::LeafNode);
        assert!(PageType::from_code(3).is_err());
        assert!(PageType::InnerNode.is_inner());
        assert!(PageType::LeafNode.is_leaf());
    }
}
