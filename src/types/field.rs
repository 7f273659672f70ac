//! The typed scalar value and its binary codec.
//!
//! `Field` is the runtime value corresponding to a `Kind`: every byte that
//! ever reaches disk in the layers above passes through `encode`/`decode`
//! here. NULL is never an out-of-band tag — it is a specific bit pattern of
//! the value itself, per kind (see the table in the crate's data model).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Result, StorageError};
use crate::types::date::DateValue;
use crate::types::kind::Kind;
use crate::types::rid::Rid;
use crate::types::time::TimeValue;

/// A typed scalar value.
///
/// `Char`/`Varchar` store their UTF-16-style code units as raw little-endian
/// byte pairs, matching the on-disk representation exactly; no separate
/// decoding step is needed to re-encode one.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Char(u16, Vec<u8>),
    Varchar(u16, Vec<u8>),
    Date(DateValue),
    Time(TimeValue),
    Timestamp(i64),
    Rid(Rid),
}

impl Field {
    pub fn kind(&self) -> Kind {
        match self {
            Field::SmallInt(_) => Kind::SmallInt,
            Field::Int(_) => Kind::Int,
            Field::BigInt(_) => Kind::BigInt,
            Field::Float(_) => Kind::Float,
            Field::Double(_) => Kind::Double,
            Field::Char(n, _) => Kind::Char(*n),
            Field::Varchar(n, _) => Kind::Varchar(*n),
            Field::Date(_) => Kind::Date,
            Field::Time(_) => Kind::Time,
            Field::Timestamp(_) => Kind::Timestamp,
            Field::Rid(_) => Kind::Rid,
        }
    }

    /// Number of bytes this value occupies when encoded. For `Varchar` this
    /// is the length of its current contents, not its declared maximum.
    pub fn byte_length(&self) -> usize {
        match self {
            Field::Char(_, bytes) => bytes.len(),
            Field::Varchar(_, bytes) => bytes.len(),
            other => other
                .kind()
                .fixed_byte_len()
                .expect("non-string kinds are fixed width"),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Field::SmallInt(v) => *v == i16::MIN,
            Field::Int(v) => *v == i32::MIN,
            Field::BigInt(v) => *v == i64::MIN,
            Field::Float(v) => v.is_nan(),
            Field::Double(v) => v.is_nan(),
            Field::Char(_, bytes) => bytes.len() >= 2 && bytes[0] == 0 && bytes[1] == 0,
            Field::Varchar(_, bytes) => bytes.is_empty(),
            Field::Date(d) => d.is_null(),
            Field::Time(t) => t.is_null(),
            Field::Timestamp(v) => *v == i64::MIN,
            Field::Rid(_) => false,
        }
    }

    // --- constructors -----------------------------------------------

    pub fn null_small_int() -> Self {
        Field::SmallInt(i16::MIN)
    }
    pub fn null_int() -> Self {
        Field::Int(i32::MIN)
    }
    pub fn null_big_int() -> Self {
        Field::BigInt(i64::MIN)
    }
    pub fn null_float() -> Self {
        Field::Float(f32::NAN)
    }
    pub fn null_double() -> Self {
        Field::Double(f64::NAN)
    }
    pub fn null_char(n: u16) -> Self {
        Field::Char(n, vec![0u8; 2 * n as usize])
    }
    pub fn null_varchar(n: u16) -> Self {
        Field::Varchar(n, Vec::new())
    }
    pub fn null_date() -> Self {
        Field::Date(DateValue::null())
    }
    pub fn null_time() -> Self {
        Field::Time(TimeValue::null())
    }
    pub fn null_timestamp() -> Self {
        Field::Timestamp(i64::MIN)
    }

    pub fn date(year: i32, month: i32, day: i32) -> Result<Self> {
        Ok(Field::Date(DateValue::new(year, month, day)?))
    }

    pub fn time(hour: u32, minute: u32, second: u32, ms: u32, offset_ms: i32) -> Result<Self> {
        Ok(Field::Time(TimeValue::new(hour, minute, second, ms, offset_ms)?))
    }

    /// Construct a TIMESTAMP from calendar components via a proleptic
    /// Gregorian calendar in UTC.
    pub fn timestamp(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        ms: u32,
    ) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| StorageError::bad_format(format!("invalid date {year}-{month}-{day}")))?;
        let time = NaiveTime::from_hms_milli_opt(hour, minute, second, ms).ok_or_else(|| {
            StorageError::bad_format(format!("invalid time {hour}:{minute}:{second}.{ms}"))
        })?;
        let dt = NaiveDateTime::new(date, time);
        Ok(Field::Timestamp(dt.and_utc().timestamp_millis()))
    }

    fn str_to_units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn units_to_bytes(units: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(units.len() * 2);
        for u in units {
            bytes.extend_from_slice(&u.to_le_bytes());
        }
        bytes
    }

    fn bytes_to_string(bytes: &[u8]) -> String {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }

    /// Parse a value from its string representation for the given kind.
    /// `Kind::Char`/`Kind::Varchar` carry their own declared length.
    pub fn from_string(kind: Kind, s: &str) -> Result<Self> {
        match kind {
            Kind::SmallInt => {
                let v: i16 = s
                    .parse()
                    .map_err(|_| StorageError::bad_format(format!("not a SMALL_INT: {s}")))?;
                Ok(Field::SmallInt(v))
            }
            Kind::Int => {
                let v: i32 = s
                    .parse()
                    .map_err(|_| StorageError::bad_format(format!("not an INT: {s}")))?;
                Ok(Field::Int(v))
            }
            Kind::BigInt => {
                let v: i64 = s
                    .parse()
                    .map_err(|_| StorageError::bad_format(format!("not a BIG_INT: {s}")))?;
                Ok(Field::BigInt(v))
            }
            Kind::Float => {
                let v: f32 = s
                    .parse()
                    .map_err(|_| StorageError::bad_format(format!("not a FLOAT: {s}")))?;
                Ok(Field::Float(v))
            }
            Kind::Double => {
                let v: f64 = s
                    .parse()
                    .map_err(|_| StorageError::bad_format(format!("not a DOUBLE: {s}")))?;
                Ok(Field::Double(v))
            }
            Kind::Char(n) => {
                let units = Self::str_to_units(s);
                if units.len() > n as usize {
                    return Err(StorageError::bad_format(format!(
                        "CHAR({n}) value too long: {} units",
                        units.len()
                    )));
                }
                let mut padded = units;
                padded.resize(n as usize, b' ' as u16);
                Ok(Field::Char(n, Self::units_to_bytes(&padded)))
            }
            Kind::Varchar(n) => {
                let units = Self::str_to_units(s);
                if units.len() > n as usize {
                    return Err(StorageError::bad_format(format!(
                        "VARCHAR({n}) value too long: {} units",
                        units.len()
                    )));
                }
                Ok(Field::Varchar(n, Self::units_to_bytes(&units)))
            }
            Kind::Date | Kind::Time | Kind::Timestamp => Err(StorageError::illegal_operation(
                "DATE/TIME/TIMESTAMP are not constructed from a plain string; use the dedicated constructors",
            )),
            Kind::Rid => Rid::from_string(s).map(Field::Rid),
        }
    }

    pub fn encode_as_string(&self) -> String {
        match self {
            Field::SmallInt(v) => v.to_string(),
            Field::Int(v) => v.to_string(),
            Field::BigInt(v) => v.to_string(),
            Field::Float(v) => v.to_string(),
            Field::Double(v) => v.to_string(),
            Field::Char(_, bytes) => Self::bytes_to_string(bytes),
            Field::Varchar(_, bytes) => Self::bytes_to_string(bytes),
            Field::Date(d) => format!("{:04}-{:02}-{:02}", d.year(), d.month() + 1, d.day()),
            Field::Time(t) => format!("{}ms@{}ms", t.ms_of_day(), t.offset_ms()),
            Field::Timestamp(v) => v.to_string(),
            Field::Rid(r) => r.to_string(),
        }
    }

    /// Encode this value's bytes into `buf` starting at `offset`, returning
    /// the number of bytes written.
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> Result<usize> {
        let write = |buf: &mut [u8], offset: usize, bytes: &[u8]| -> Result<usize> {
            if offset + bytes.len() > buf.len() {
                return Err(StorageError::bad_format("encode target buffer too small"));
            }
            buf[offset..offset + bytes.len()].copy_from_slice(bytes);
            Ok(bytes.len())
        };
        match self {
            Field::SmallInt(v) => write(buf, offset, &v.to_le_bytes()),
            Field::Int(v) => write(buf, offset, &v.to_le_bytes()),
            Field::BigInt(v) => write(buf, offset, &v.to_le_bytes()),
            Field::Float(v) => write(buf, offset, &v.to_le_bytes()),
            Field::Double(v) => write(buf, offset, &v.to_le_bytes()),
            Field::Char(_, bytes) => write(buf, offset, bytes),
            Field::Varchar(_, bytes) => write(buf, offset, bytes),
            Field::Date(d) => write(buf, offset, &d.encode()),
            Field::Time(t) => write(buf, offset, &t.encode()),
            Field::Timestamp(v) => write(buf, offset, &v.to_le_bytes()),
            Field::Rid(r) => write(buf, offset, &r.encode()),
        }
    }

    /// Decode a value of `kind` from `len` bytes of `buf` at `offset`. For
    /// fixed-width kinds `len` must equal the declared width; for `Varchar`
    /// it is the run's actual current length.
    pub fn decode(kind: Kind, buf: &[u8], offset: usize, len: usize) -> Result<Self> {
        if offset + len > buf.len() {
            return Err(StorageError::bad_format("decode source slice too small"));
        }
        let slice = &buf[offset..offset + len];
        match kind {
            Kind::SmallInt => Ok(Field::SmallInt(i16::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("SMALL_INT requires 2 bytes"))?,
            ))),
            Kind::Int => Ok(Field::Int(i32::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("INT requires 4 bytes"))?,
            ))),
            Kind::BigInt => Ok(Field::BigInt(i64::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("BIG_INT requires 8 bytes"))?,
            ))),
            Kind::Float => Ok(Field::Float(f32::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("FLOAT requires 4 bytes"))?,
            ))),
            Kind::Double => Ok(Field::Double(f64::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("DOUBLE requires 8 bytes"))?,
            ))),
            Kind::Char(n) => {
                // NULL marker is checked on the raw bytes before any other
                // interpretation, per the kind's contract.
                if slice.len() >= 2 && slice[0] == 0 && slice[1] == 0 {
                    return Ok(Field::null_char(n));
                }
                Ok(Field::Char(n, slice.to_vec()))
            }
            Kind::Varchar(n) => Ok(Field::Varchar(n, slice.to_vec())),
            Kind::Date => Ok(Field::Date(DateValue::decode(slice)?)),
            Kind::Time => Ok(Field::Time(TimeValue::decode(slice)?)),
            Kind::Timestamp => Ok(Field::Timestamp(i64::from_le_bytes(
                slice.try_into().map_err(|_| StorageError::bad_format("TIMESTAMP requires 8 bytes"))?,
            ))),
            Kind::Rid => Ok(Field::Rid(Rid::decode(slice)?)),
        }
    }

    /// Total order: -1/0/1, NULL sorts below any non-NULL value of the same
    /// kind.
    pub fn compare(a: &Field, b: &Field) -> Result<i32> {
        if std::mem::discriminant(&a.kind()) != std::mem::discriminant(&b.kind()) {
            return Err(StorageError::illegal_operation(
                "cannot compare fields of different kinds",
            ));
        }
        let (a_null, b_null) = (a.is_null(), b.is_null());
        if a_null || b_null {
            return Ok(match (a_null, b_null) {
                (true, true) => 0,
                (true, false) => -1,
                (false, true) => 1,
                (false, false) => unreachable!(),
            });
        }
        let ord = match (a, b) {
            (Field::SmallInt(x), Field::SmallInt(y)) => x.cmp(y),
            (Field::Int(x), Field::Int(y)) => x.cmp(y),
            (Field::BigInt(x), Field::BigInt(y)) => x.cmp(y),
            (Field::Float(x), Field::Float(y)) => {
                x.partial_cmp(y).expect("NULL (NaN) already excluded above")
            }
            (Field::Double(x), Field::Double(y)) => {
                x.partial_cmp(y).expect("NULL (NaN) already excluded above")
            }
            (Field::Char(_, x), Field::Char(_, y)) => x.cmp(y),
            (Field::Varchar(_, x), Field::Varchar(_, y)) => x.cmp(y),
            (Field::Date(x), Field::Date(y)) => x.cmp(y),
            (Field::Time(x), Field::Time(y)) => x.utc_ms_of_day().cmp(&y.utc_ms_of_day()),
            (Field::Timestamp(x), Field::Timestamp(y)) => x.cmp(y),
            (Field::Rid(x), Field::Rid(y)) => x.cmp(y),
            _ => return Err(StorageError::illegal_operation("mismatched kinds in compare")),
        };
        Ok(match ord {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        })
    }

    fn require_arithmetic(&self, other: &Field) -> Result<()> {
        if !self.kind().is_arithmetic() {
            return Err(StorageError::illegal_operation(format!(
                "{:?} does not support arithmetic",
                self.kind()
            )));
        }
        if std::mem::discriminant(&self.kind()) != std::mem::discriminant(&other.kind()) {
            return Err(StorageError::illegal_operation(
                "arithmetic requires operands of the same kind",
            ));
        }
        Ok(())
    }

    /// In-place addition. Does not check either operand for NULL: applying
    /// this to a NULL sentinel silently produces a non-sentinel value.
    pub fn add(&mut self, other: &Field) -> Result<()> {
        self.require_arithmetic(other)?;
        match (self, other) {
            (Field::SmallInt(a), Field::SmallInt(b)) => *a = a.wrapping_add(*b),
            (Field::Int(a), Field::Int(b)) => *a = a.wrapping_add(*b),
            (Field::BigInt(a), Field::BigInt(b)) => *a = a.wrapping_add(*b),
            (Field::Float(a), Field::Float(b)) => *a += b,
            (Field::Double(a), Field::Double(b)) => *a += b,
            _ => unreachable!("require_arithmetic already matched kinds"),
        }
        Ok(())
    }

    pub fn sub(&mut self, other: &Field) -> Result<()> {
        self.require_arithmetic(other)?;
        match (self, other) {
            (Field::SmallInt(a), Field::SmallInt(b)) => *a = a.wrapping_sub(*b),
            (Field::Int(a), Field::Int(b)) => *a = a.wrapping_sub(*b),
            (Field::BigInt(a), Field::BigInt(b)) => *a = a.wrapping_sub(*b),
            (Field::Float(a), Field::Float(b)) => *a -= b,
            (Field::Double(a), Field::Double(b)) => *a -= b,
            _ => unreachable!("require_arithmetic already matched kinds"),
        }
        Ok(())
    }

    pub fn mul(&mut self, other: &Field) -> Result<()> {
        self.require_arithmetic(other)?;
        match (self, other) {
            (Field::SmallInt(a), Field::SmallInt(b)) => *a = a.wrapping_mul(*b),
            (Field::Int(a), Field::Int(b)) => *a = a.wrapping_mul(*b),
            (Field::BigInt(a), Field::BigInt(b)) => *a = a.wrapping_mul(*b),
            (Field::Float(a), Field::Float(b)) => *a *= b,
            (Field::Double(a), Field::Double(b)) => *a *= b,
            _ => unreachable!("require_arithmetic already matched kinds"),
        }
        Ok(())
    }

    /// Integer division by zero fails with `IllegalOperation`; float
    /// division by zero follows IEEE-754 (yields infinity or NaN), matching
    /// the kind's normal semantics rather than being treated as a NULL
    /// check.
    pub fn div(&mut self, other: &Field) -> Result<()> {
        self.require_arithmetic(other)?;
        match (self, other) {
            (Field::SmallInt(a), Field::SmallInt(b)) => {
                if *b == 0 {
                    return Err(StorageError::illegal_operation("division by zero"));
                }
                *a = a.wrapping_div(*b);
            }
            (Field::Int(a), Field::Int(b)) => {
                if *b == 0 {
                    return Err(StorageError::illegal_operation("division by zero"));
                }
                *a = a.wrapping_div(*b);
            }
            (Field::BigInt(a), Field::BigInt(b)) => {
                if *b == 0 {
                    return Err(StorageError::illegal_operation("division by zero"));
                }
                *a = a.wrapping_div(*b);
            }
            (Field::Float(a), Field::Float(b)) => *a /= b,
            (Field::Double(a), Field::Double(b)) => *a /= b,
            _ => unreachable!("require_arithmetic already matched kinds"),
        }
        Ok(())
    }

    /// Cast to `i64`, losing range silently for kinds wider or narrower than
    /// the target (including NaN, which truncates to 0 per Rust's `as`
    /// semantics).
    pub fn as_long(&self) -> Result<i64> {
        match self {
            Field::SmallInt(v) => Ok(*v as i64),
            Field::Int(v) => Ok(*v as i64),
            Field::BigInt(v) => Ok(*v),
            Field::Float(v) => Ok(*v as i64),
            Field::Double(v) => Ok(*v as i64),
            _ => Err(StorageError::illegal_operation(format!(
                "{:?} has no long representation",
                self.kind()
            ))),
        }
    }

    /// Cast to `f64`, losing precision silently where applicable.
    pub fn as_double(&self) -> Result<f64> {
        match self {
            Field::SmallInt(v) => Ok(*v as f64),
            Field::Int(v) => Ok(*v as f64),
            Field::BigInt(v) => Ok(*v as f64),
            Field::Float(v) => Ok(*v as f64),
            Field::Double(v) => Ok(*v),
            _ => Err(StorageError::illegal_operation(format!(
                "{:?} has no double representation",
                self.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_int_scenario() {
        let f = Field::Int(-2876);
        let mut buf = [0u8; 4];
        f.encode(&mut buf, 0).unwrap();
        assert_eq!(buf, [0xC4, 0xF4, 0xFF, 0xFF]);
        let decoded = Field::decode(Kind::Int, &buf, 0, 4).unwrap();
        assert_eq!(decoded, Field::Int(-2876));
    }

    #[test]
    fn null_sentinels() {
        assert!(Field::null_small_int().is_null());
        assert!(Field::null_int().is_null());
        assert!(Field::null_big_int().is_null());
        assert!(Field::null_float().is_null());
        assert!(Field::null_double().is_null());
        assert!(Field::null_char(4).is_null());
        assert!(Field::null_varchar(4).is_null());
        assert!(Field::null_date().is_null());
        assert!(Field::null_time().is_null());
        assert!(Field::null_timestamp().is_null());
        assert!(!Field::Rid(Rid::from_parts(0, 0)).is_null());
    }

    #[test]
    fn char_decode_checks_null_marker_first() {
        let bytes = vec![0u8; 8];
        let decoded = Field::decode(Kind::Char(4), &bytes, 0, 8).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn char_from_string_pads_with_spaces() {
        let f = Field::from_string(Kind::Char(5), "ab").unwrap();
        assert_eq!(f.encode_as_string(), "ab   ");
    }

    #[test]
    fn char_from_string_rejects_overflow() {
        assert!(Field::from_string(Kind::Char(2), "abc").is_err());
    }

    #[test]
    fn varchar_length_is_implicit_in_slice() {
        let f = Field::from_string(Kind::Varchar(10), "hi").unwrap();
        assert_eq!(f.byte_length(), 4);
    }

    #[test]
    fn compare_orders_null_below_non_null() {
        let null = Field::null_int();
        let value = Field::Int(0);
        assert_eq!(Field::compare(&null, &value).unwrap(), -1);
        assert_eq!(Field::compare(&value, &null).unwrap(), 1);
        assert_eq!(Field::compare(&null, &null).unwrap(), 0);
    }

    #[test]
    fn compare_rejects_mismatched_kinds() {
        let a = Field::Int(1);
        let b = Field::BigInt(1);
        assert!(Field::compare(&a, &b).is_err());
    }

    #[test]
    fn rid_never_null_and_ordered_by_combined_value() {
        let lo = Field::Rid(Rid::from_parts(1, 500));
        let hi = Field::Rid(Rid::from_parts(2, 0));
        assert_eq!(Field::compare(&lo, &hi).unwrap(), -1);
    }

    #[test]
    fn arithmetic_does_not_check_null() {
        let mut f = Field::null_int();
        f.add(&Field::Int(1)).unwrap();
        assert_eq!(f, Field::Int(i32::MIN + 1));
        assert!(!f.is_null());
    }

    #[test]
    fn arithmetic_rejects_non_arithmetic_kind() {
        let mut f = Field::from_string(Kind::Char(2), "ab").unwrap();
        assert!(f.add(&Field::from_string(Kind::Char(2), "cd").unwrap()).is_err());
    }

    #[test]
    fn division_by_zero_is_illegal_operation() {
        let mut f = Field::Int(10);
        assert!(f.div(&Field::Int(0)).is_err());
    }

    #[test]
    fn float_division_by_zero_is_infinity() {
        let mut f = Field::Double(1.0);
        f.div(&Field::Double(0.0)).unwrap();
        assert!(matches!(f, Field::Double(v) if v.is_infinite()));
    }

    #[test]
    fn as_long_and_as_double_lose_range_silently() {
        let f = Field::Double(3.9);
        assert_eq!(f.as_long().unwrap(), 3);
        let f = Field::BigInt(i64::MAX);
        assert!(f.as_double().unwrap() > 0.0);
    }

    #[test]
    fn timestamp_round_trip_via_calendar_components() {
        let f = Field::timestamp(2024, 2, 29, 12, 0, 0, 250).unwrap();
        let mut buf = [0u8; 8];
        f.encode(&mut buf, 0).unwrap();
        let decoded = Field::decode(Kind::Timestamp, &buf, 0, 8).unwrap();
        assert_eq!(f, decoded);
    }

    #[test]
    fn timestamp_rejects_invalid_calendar_date() {
        assert!(Field::timestamp(2023, 2, 29, 0, 0, 0, 0).is_err());
    }
}
