use std::borrow::Cow;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::num::TryFromIntError;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::{Tz, UTC};
use uuid::Uuid;

use super::types::Type;
use crate::{Error, Result};


/// Days since the Unix epoch, the physical form of the `Date` column type.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug, Default)]
pub struct Date(pub u16);

impl From<NaiveDate> for Date {
    fn from(other: NaiveDate) -> Self {
        #[expect(clippy::cast_possible_truncation)]
        #[expect(clippy::cast_sign_loss)]
        Self(other.signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days()
            as u16)
    }
}

impl From<Date> for NaiveDate {
    fn from(date: Date) -> Self {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + Duration::days(i64::from(date.0))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", NaiveDate::from(*self).format("%Y-%m-%d"))
    }
}

/// Seconds since the Unix epoch, stamped with the column or server timezone.
/// The physical form of the `DateTime` column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateTime(pub Tz, pub u32);

impl Default for DateTime {
    fn default() -> Self { Self(UTC, 0) }
}

impl TryFrom<DateTime> for chrono::DateTime<Tz> {
    type Error = TryFromIntError;

    fn try_from(date: DateTime) -> Result<Self, TryFromIntError> {
        Ok(date.0.timestamp_opt(date.1.into(), 0).unwrap())
    }
}

impl TryFrom<chrono::DateTime<Tz>> for DateTime {
    type Error = TryFromIntError;

    fn try_from(other: chrono::DateTime<Tz>) -> Result<Self, TryFromIntError> {
        Ok(Self(other.timezone(), u32::try_from(other.timestamp())?))
    }
}

impl TryFrom<chrono::DateTime<Utc>> for DateTime {
    type Error = TryFromIntError;

    fn try_from(other: chrono::DateTime<Utc>) -> Result<Self, TryFromIntError> {
        Ok(Self(UTC, other.timestamp().try_into()?))
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.0.timestamp_opt(i64::from(self.1), 0).unwrap();
        write!(f, "{}", date.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Ticks of `10^-P` seconds since the Unix epoch, the physical form of the
/// `DateTime64(P)` column type. Carries its precision alongside the raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateTime64(pub Tz, pub u64, pub usize);

impl Default for DateTime64 {
    fn default() -> Self { Self(UTC, 0, 0) }
}

#[expect(clippy::cast_possible_truncation)]
impl DateTime64 {
    #[must_use]
    pub fn seconds(&self) -> u64 { self.1 / 10u64.pow(self.2 as u32) }

    /// Ticks below one second, in units of `10^-P` seconds.
    #[must_use]
    pub fn subseconds(&self) -> u64 { self.1 % 10u64.pow(self.2 as u32) }

    /// # Errors
    ///
    /// Returns an error if the timestamp cannot be converted to a u64.
    pub fn try_from_utc(
        other: chrono::DateTime<Utc>,
        precision: usize,
    ) -> Result<Self, TryFromIntError> {
        let precision_u32 = precision as u32;
        let seconds: u64 = other.timestamp().try_into()?;
        let sub_seconds: u64 = u64::from(other.timestamp_subsec_nanos());
        let total = seconds * 10u64.pow(precision_u32) + sub_seconds / 10u64.pow(9 - precision_u32);
        Ok(Self(UTC, total, precision))
    }
}

impl TryFrom<DateTime64> for chrono::DateTime<Tz> {
    type Error = TryFromIntError;

    fn try_from(date: DateTime64) -> Result<Self, TryFromIntError> {
        #[expect(clippy::cast_possible_truncation)]
        let precision = date.2 as u32;
        let seconds = date.1 / 10u64.pow(precision);
        let units = date.1 % 10u64.pow(precision);
        let units_ns = units * 10u64.pow(9 - precision);
        Ok(date.0.timestamp_opt(seconds.try_into()?, units_ns.try_into()?).unwrap())
    }
}

impl fmt::Display for DateTime64 {
    #[expect(clippy::cast_possible_wrap)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.0.timestamp_opt(self.seconds() as i64, 0).unwrap();
        write!(f, "{}", date.format("%Y-%m-%d %H:%M:%S"))?;
        if self.2 > 0 {
            write!(f, ".{:0width$}", self.subseconds(), width = self.2)?;
        }
        Ok(())
    }
}

/// A single decoded value.
///
/// Decoding is strict about width: a `UInt8` column yields [`Value::UInt8`],
/// never a widened integer. `Enum8` and `Enum16` columns yield their
/// underlying [`Value::Int8`] / [`Value::Int16`] discriminants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Raw bytes. `ClickHouse` strings are not required to be valid UTF-8.
    String(Vec<u8>),
    Uuid(Uuid),
    Date(Date),
    DateTime(DateTime),
    DateTime64(DateTime64),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    /// Scale and raw mantissa. The logical value is `mantissa / 10^scale`.
    Decimal32(usize, i32),
    Decimal64(usize, i64),
    Decimal128(usize, i128),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Substitutes the column type's zero value for `Null` so the value slot
    /// under a raised null mask still carries a fixed-width encoding.
    pub(crate) fn justify_null_ref(&self, type_: &Type) -> Cow<'_, Value> {
        if self.is_null() {
            Cow::Owned(type_.strip_null().default_value())
        } else {
            Cow::Borrowed(self)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int8(x) => write!(f, "{x}"),
            Value::Int16(x) => write!(f, "{x}"),
            Value::Int32(x) => write!(f, "{x}"),
            Value::Int64(x) => write!(f, "{x}"),
            Value::Int128(x) => write!(f, "{x}"),
            Value::UInt8(x) => write!(f, "{x}"),
            Value::UInt16(x) => write!(f, "{x}"),
            Value::UInt32(x) => write!(f, "{x}"),
            Value::UInt64(x) => write!(f, "{x}"),
            Value::Float32(x) => write!(f, "{x}"),
            Value::Float64(x) => write!(f, "{x}"),
            Value::String(x) => write!(f, "{}", String::from_utf8_lossy(x)),
            Value::Uuid(x) => write!(f, "{x}"),
            Value::Date(x) => write!(f, "{x}"),
            Value::DateTime(x) => write!(f, "{x}"),
            Value::DateTime64(x) => write!(f, "{x}"),
            Value::Ipv4(x) => write!(f, "{x}"),
            Value::Ipv6(x) => write!(f, "{x}"),
            Value::Decimal32(scale, raw) => format_decimal(f, i128::from(*raw), *scale),
            Value::Decimal64(scale, raw) => format_decimal(f, i128::from(*raw), *scale),
            Value::Decimal128(scale, raw) => format_decimal(f, *raw, *scale),
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn format_decimal(f: &mut fmt::Formatter<'_>, raw: i128, scale: usize) -> fmt::Result {
    if scale == 0 {
        return write!(f, "{raw}");
    }
    let divisor = 10u128.pow(scale as u32);
    let sign = if raw < 0 { "-" } else { "" };
    let abs = raw.unsigned_abs();
    write!(f, "{sign}{}.{:0width$}", abs / divisor, abs % divisor, width = scale)
}

/// Parses decimal text into a raw mantissa at `scale`. Fractional digits
/// beyond the scale are truncated; missing digits are zero-filled.
pub(crate) fn parse_decimal(text: &str, scale: usize) -> Result<i128> {
    let malformed = || Error::Encoding(format!("malformed decimal: {text}"));
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let mut frac = frac_part.to_string();
    frac.truncate(scale);
    while frac.len() < scale {
        frac.push('0');
    }

    let mut raw = 0i128;
    for b in int_part.bytes().chain(frac.bytes()) {
        raw = raw
            .checked_mul(10)
            .and_then(|r| r.checked_add(i128::from(b - b'0')))
            .ok_or_else(|| Error::Encoding(format!("decimal overflow: {text}")))?;
    }
    Ok(sign * raw)
}

macro_rules! impl_value_from {
    ($source:ty, $variant:ident) => {
        impl From<$source> for Value {
            fn from(value: $source) -> Self { Value::$variant(value) }
        }
    };
}

impl_value_from!(i8, Int8);
impl_value_from!(i16, Int16);
impl_value_from!(i32, Int32);
impl_value_from!(i64, Int64);
impl_value_from!(i128, Int128);
impl_value_from!(u8, UInt8);
impl_value_from!(u16, UInt16);
impl_value_from!(u32, UInt32);
impl_value_from!(u64, UInt64);
impl_value_from!(f32, Float32);
impl_value_from!(f64, Float64);
impl_value_from!(Vec<u8>, String);
impl_value_from!(Uuid, Uuid);
impl_value_from!(Date, Date);
impl_value_from!(DateTime, DateTime);
impl_value_from!(DateTime64, DateTime64);
impl_value_from!(Ipv4Addr, Ipv4);
impl_value_from!(Ipv6Addr, Ipv6);

impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::String(value.as_bytes().to_vec()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Value::String(value.into_bytes()) }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self { Value::Date(value.into()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
