//! Scalar kinds and their fixed binary layouts.
//!
//! `Kind` is the closed set of field types the codec understands. Each
//! variant carries enough information (e.g. the declared length of a
//! `Char`/`Varchar`) to compute its on-disk byte width.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Closed set of scalar kinds supported by the typed field codec.
///
/// Little-endian throughout; see the crate-level docs for the byte layout
/// and NULL sentinel of each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    /// Fixed-length string of `n` UTF-16-style code units (2 bytes each).
    Char(u16),
    /// Variable-length string, at most `n` code units.
    Varchar(u16),
    Date,
    Time,
    Timestamp,
    Rid,
}

impl Kind {
    /// Byte length of this kind on disk, if fixed. `Varchar` has no fixed
    /// width: its length is implicit in the encoded slice.
    pub fn fixed_byte_len(self) -> Option<usize> {
        match self {
            Kind::SmallInt => Some(2),
            Kind::Int => Some(4),
            Kind::BigInt => Some(8),
            Kind::Float => Some(4),
            Kind::Double => Some(8),
            Kind::Char(n) => Some(2 * n as usize),
            Kind::Varchar(_) => None,
            Kind::Date => Some(4),
            Kind::Time => Some(8),
            Kind::Timestamp => Some(8),
            Kind::Rid => Some(8),
        }
    }

    /// The maximum number of bytes a value of this kind can ever encode to
    /// (for `Varchar`, its declared upper bound).
    pub fn max_byte_len(self) -> usize {
        match self {
            Kind::Varchar(n) => 2 * n as usize,
            other => other.fixed_byte_len().expect("non-varchar kinds are fixed width"),
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Kind::SmallInt | Kind::Int | Kind::BigInt | Kind::Float | Kind::Double
        )
    }

    /// Byte width usable as a fixed-width B+-Tree index key. The index
    /// never stores variable-length keys (see crate Non-goals), so
    /// `Varchar` is rejected here even though it is a valid `Kind` for
    /// tuple fields generally.
    pub fn key_byte_len(self) -> Result<usize> {
        self.fixed_byte_len().ok_or_else(|| {
            StorageError::illegal_operation("VARCHAR cannot be used as a fixed-width index key")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths_match_spec() {
        assert_eq!(Kind::SmallInt.fixed_byte_len(), Some(2));
        assert_eq!(Kind::Int.fixed_byte_len(), Some(4));
        assert_eq!(Kind::BigInt.fixed_byte_len(), Some(8));
        assert_eq!(Kind::Float.fixed_byte_len(), Some(4));
        assert_eq!(Kind::Double.fixed_byte_len(), Some(8));
        assert_eq!(Kind::Char(10).fixed_byte_len(), Some(20));
        assert_eq!(Kind::Varchar(10).fixed_byte_len(), None);
        assert_eq!(Kind::Date.fixed_byte_len(), Some(4));
        assert_eq!(Kind::Time.fixed_byte_len(), Some(8));
        assert_eq!(Kind::Timestamp.fixed_byte_len(), Some(8));
        assert_eq!(Kind::Rid.fixed_byte_len(), Some(8));
    }

    #[test]
    fn varchar_rejected_as_key() {
        assert!(Kind::Varchar(4).key_byte_len().is_err());
        assert!(Kind::Int.key_byte_len().is_ok());
    }

    #[test]
    fn arithmetic_kinds() {
        assert!(Kind::Int.is_arithmetic());
        assert!(Kind::Double.is_arithmetic());
        assert!(!Kind::Char(4).is_arithmetic());
        assert!(!Kind::Rid.is_arithmetic());
    }
}
