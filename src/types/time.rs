//! TIME: an 8-byte little-endian (local ms-of-day, UTC offset ms) pair.

use crate::error::{Result, StorageError};

const MS_PER_HOUR: i32 = 3_600_000;
const MAX_OFFSET_MS: i32 = 12 * MS_PER_HOUR;

/// Packed TIME representation: low 32 bits are milliseconds since local
/// midnight, high 32 bits are the UTC offset in milliseconds (bounded to
/// +/- 12h). NULL is the all-ones bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeValue {
    ms_of_day: u32,
    offset_ms: i32,
}

impl TimeValue {
    /// Construct and validate a TIME from clock components.
    pub fn new(hour: u32, minute: u32, second: u32, ms: u32, offset_ms: i32) -> Result<Self> {
        if hour > 23 {
            return Err(StorageError::bad_format(format!("hour out of range: {hour}")));
        }
        if minute > 59 {
            return Err(StorageError::bad_format(format!("minute out of range: {minute}")));
        }
        if second > 59 {
            return Err(StorageError::bad_format(format!("second out of range: {second}")));
        }
        if ms > 999 {
            return Err(StorageError::bad_format(format!("millisecond out of range: {ms}")));
        }
        if offset_ms.unsigned_abs() > MAX_OFFSET_MS as u32 {
            return Err(StorageError::bad_format(format!(
                "UTC offset out of range: {offset_ms}ms"
            )));
        }
        let ms_of_day = hour * 3_600_000 + minute * 60_000 + second * 1_000 + ms;
        Ok(Self {
            ms_of_day,
            offset_ms,
        })
    }

    pub const fn null() -> Self {
        Self {
            ms_of_day: u32::MAX,
            offset_ms: -1,
        }
    }

    pub fn is_null(self) -> bool {
        self.ms_of_day == u32::MAX && self.offset_ms == -1
    }

    pub const fn ms_of_day(self) -> u32 {
        self.ms_of_day
    }

    pub const fn offset_ms(self) -> i32 {
        self.offset_ms
    }

    /// Ordering/comparison value: ms-of-day normalized to UTC.
    pub fn utc_ms_of_day(self) -> i64 {
        self.ms_of_day as i64 - self.offset_ms as i64
    }

    pub fn encode(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.ms_of_day.to_le_bytes());
        buf[4..8].copy_from_slice(&self.offset_ms.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(StorageError::bad_format("TIME requires 8 bytes"));
        }
        let ms_of_day = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let offset_ms = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        Ok(Self {
            ms_of_day,
            offset_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_roundtrip() {
        let t = TimeValue::new(13, 45, 30, 500, -18_000_000).unwrap();
        let decoded = TimeValue::decode(&t.encode()).unwrap();
        assert_eq!(t, decoded);
        assert_eq!(decoded.ms_of_day(), 13 * 3_600_000 + 45 * 60_000 + 30_000 + 500);
        assert_eq!(decoded.offset_ms(), -18_000_000);
    }

    #[test]
    fn time_null_sentinel() {
        assert!(TimeValue::null().is_null());
        assert_eq!(TimeValue::null().encode(), [0xFF; 8]);
    }

    #[test]
    fn time_rejects_out_of_range() {
        assert!(TimeValue::new(24, 0, 0, 0, 0).is_err());
        assert!(TimeValue::new(0, 60, 0, 0, 0).is_err());
        assert!(TimeValue::new(0, 0, 0, 0, 13 * MS_PER_HOUR).is_err());
        assert!(TimeValue::new(0, 0, 0, 0, -13 * MS_PER_HOUR).is_err());
        assert!(TimeValue::new(0, 0, 0, 0, 12 * MS_PER_HOUR).is_ok());
    }
}
