use std::net::{Ipv4Addr, Ipv6Addr};

use chrono_tz::{Tz, UTC};
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use super::values::{Date, DateTime, DateTime64, Value, parse_decimal};
use crate::io::{ByteReader, ByteWriter};
use crate::{Error, Result};

#[cfg(test)]
mod tests;

/// A column type, parsed from the type text the server sends in block heads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Uuid,
    Date,
    DateTime,
    DateTime64(usize),
    Ipv4,
    Ipv6,
    /// Variant lists are not retained; values decode to their underlying
    /// `Int8` discriminants.
    Enum8,
    Enum16,
    /// Bare `Decimal32`/`Decimal64` type names, stored as floats on the wire.
    Decimal32,
    Decimal64,
    /// Precision and scale. Precision picks the wire width, scale the
    /// mantissa interpretation.
    Decimal(usize, usize),
    Nullable(Box<Type>),
}

/// Fixed-width storage classes the column codecs read and write. Every
/// logical [`Type`] maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Physical {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Uuid,
}

fn unsupported(text: &str) -> Error {
    Error::Encoding(format!("unsupported column type: {text}"))
}

/// Extracts the argument text of `prefix(args)` out of the original string,
/// matching the prefix case-insensitively against the lowered copy.
fn param_args<'a>(lowered: &str, original: &'a str, prefix: &str) -> Option<&'a str> {
    (lowered.starts_with(prefix) && lowered.ends_with(')'))
        .then(|| &original[prefix.len()..original.len() - 1])
}

impl Type {
    /// Parses type text as it appears in a block head, e.g.
    /// `Nullable(FixedString(16))` or `Decimal(18, 4)`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let lowered = text.to_ascii_lowercase();

        if let Some(inner) = param_args(&lowered, text, "nullable(") {
            let inner = Type::parse(inner)?;
            if inner.is_nullable() {
                return Err(Error::Encoding(format!("nested Nullable in column type: {text}")));
            }
            return Ok(Type::Nullable(Box::new(inner)));
        }

        let plain = match lowered.as_str() {
            "int8" => Some(Type::Int8),
            "int16" => Some(Type::Int16),
            "int32" => Some(Type::Int32),
            "int64" => Some(Type::Int64),
            "int128" => Some(Type::Int128),
            "uint8" => Some(Type::UInt8),
            "uint16" => Some(Type::UInt16),
            "uint32" => Some(Type::UInt32),
            "uint64" => Some(Type::UInt64),
            "float32" => Some(Type::Float32),
            "float64" => Some(Type::Float64),
            "string" => Some(Type::String),
            "uuid" => Some(Type::Uuid),
            "date" => Some(Type::Date),
            "datetime" => Some(Type::DateTime),
            "ipv4" => Some(Type::Ipv4),
            "ipv6" => Some(Type::Ipv6),
            "decimal32" => Some(Type::Decimal32),
            "decimal64" => Some(Type::Decimal64),
            _ => None,
        };
        if let Some(type_) = plain {
            return Ok(type_);
        }

        if let Some(args) = param_args(&lowered, text, "fixedstring(") {
            let n = args.trim().parse::<usize>().map_err(|_| unsupported(text))?;
            if n == 0 {
                return Err(unsupported(text));
            }
            return Ok(Type::FixedString(n));
        }
        if let Some(args) = param_args(&lowered, text, "datetime64(") {
            let precision = args.trim().parse::<usize>().map_err(|_| unsupported(text))?;
            if precision > 9 {
                return Err(Error::Encoding(format!(
                    "DateTime64 precision out of range: {text}"
                )));
            }
            return Ok(Type::DateTime64(precision));
        }
        if let Some(args) = param_args(&lowered, text, "decimal(") {
            let (p, s) = args.split_once(',').ok_or_else(|| unsupported(text))?;
            let precision = p.trim().parse::<usize>().map_err(|_| unsupported(text))?;
            let scale = s.trim().parse::<usize>().map_err(|_| unsupported(text))?;
            if precision == 0 || precision > 38 || scale > precision {
                return Err(Error::Encoding(format!(
                    "Decimal precision/scale out of range: {text}"
                )));
            }
            return Ok(Type::Decimal(precision, scale));
        }
        if param_args(&lowered, text, "enum8(").is_some() {
            return Ok(Type::Enum8);
        }
        if param_args(&lowered, text, "enum16(").is_some() {
            return Ok(Type::Enum16);
        }

        Err(unsupported(text))
    }

    #[must_use]
    pub fn strip_null(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            _ => self,
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool { matches!(self, Type::Nullable(_)) }

    pub(crate) fn physical(&self) -> Physical {
        match self {
            Type::Int8 | Type::Enum8 => Physical::Int8,
            Type::Int16 | Type::Enum16 => Physical::Int16,
            Type::Int32 => Physical::Int32,
            Type::Int64 => Physical::Int64,
            Type::Int128 => Physical::Int128,
            Type::UInt8 => Physical::UInt8,
            Type::UInt16 | Type::Date => Physical::UInt16,
            Type::UInt32 | Type::DateTime | Type::Ipv4 => Physical::UInt32,
            Type::UInt64 | Type::DateTime64(_) => Physical::UInt64,
            Type::Float32 | Type::Decimal32 => Physical::Float32,
            Type::Float64 | Type::Decimal64 => Physical::Float64,
            Type::String => Physical::String,
            Type::FixedString(n) => Physical::FixedString(*n),
            Type::Ipv6 => Physical::FixedString(16),
            Type::Uuid => Physical::Uuid,
            Type::Decimal(precision, _) => match precision {
                1..=9 => Physical::Int32,
                10..=18 => Physical::Int64,
                _ => Physical::Int128,
            },
            Type::Nullable(inner) => inner.physical(),
        }
    }

    /// The zero value encoded into slots masked out as null.
    pub(crate) fn default_value(&self) -> Value {
        match self {
            Type::Int8 | Type::Enum8 => Value::Int8(0),
            Type::Int16 | Type::Enum16 => Value::Int16(0),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::Int128 => Value::Int128(0),
            Type::UInt8 => Value::UInt8(0),
            Type::UInt16 => Value::UInt16(0),
            Type::UInt32 => Value::UInt32(0),
            Type::UInt64 => Value::UInt64(0),
            Type::Float32 | Type::Decimal32 => Value::Float32(0.0),
            Type::Float64 | Type::Decimal64 => Value::Float64(0.0),
            Type::String | Type::FixedString(_) => Value::String(vec![]),
            Type::Uuid => Value::Uuid(Uuid::nil()),
            Type::Date => Value::Date(Date(0)),
            Type::DateTime => Value::DateTime(DateTime::default()),
            Type::DateTime64(precision) => Value::DateTime64(DateTime64(UTC, 0, *precision)),
            Type::Ipv4 => Value::Ipv4(Ipv4Addr::UNSPECIFIED),
            Type::Ipv6 => Value::Ipv6(Ipv6Addr::UNSPECIFIED),
            Type::Decimal(_, scale) => match self.physical() {
                Physical::Int32 => Value::Decimal32(*scale, 0),
                Physical::Int64 => Value::Decimal64(*scale, 0),
                _ => Value::Decimal128(*scale, 0),
            },
            Type::Nullable(_) => Value::Null,
        }
    }
}

/// Reads one column of `rows` values. For `Nullable` columns a fresh mask
/// comes first, one byte per row, then the values; masked slots decode like
/// any other and are then replaced with `Value::Null`.
pub(crate) async fn decode_column<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    type_: &Type,
    rows: usize,
    tz: Tz,
) -> Result<Vec<Value>> {
    if rows == 0 {
        return Ok(vec![]);
    }

    if let Type::Nullable(inner) = type_ {
        // if mask[i] == 0, item is present
        let mask = reader.read_fixed(rows).await?.to_vec();
        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            out.push(decode_value(reader, inner, tz).await?);
        }
        for (i, mask) in mask.iter().enumerate() {
            if *mask != 0 {
                out[i] = Value::Null;
            }
        }
        return Ok(out);
    }

    let mut out = Vec::with_capacity(rows);
    for _ in 0..rows {
        out.push(decode_value(reader, type_, tz).await?);
    }
    Ok(out)
}

async fn decode_value<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    type_: &Type,
    tz: Tz,
) -> Result<Value> {
    Ok(match type_.physical() {
        Physical::Int8 => Value::Int8(i8::from_le_bytes(reader.read_array().await?)),
        Physical::Int16 => Value::Int16(i16::from_le_bytes(reader.read_array().await?)),
        Physical::Int32 => {
            let v = i32::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::Decimal(_, scale) => Value::Decimal32(*scale, v),
                _ => Value::Int32(v),
            }
        }
        Physical::Int64 => {
            let v = i64::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::Decimal(_, scale) => Value::Decimal64(*scale, v),
                _ => Value::Int64(v),
            }
        }
        Physical::Int128 => {
            let v = i128::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::Decimal(_, scale) => Value::Decimal128(*scale, v),
                _ => Value::Int128(v),
            }
        }
        Physical::UInt8 => Value::UInt8(reader.read_u8().await?),
        Physical::UInt16 => {
            let v = u16::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::Date => Value::Date(Date(v)),
                _ => Value::UInt16(v),
            }
        }
        Physical::UInt32 => {
            let v = u32::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::DateTime => Value::DateTime(DateTime(tz, v)),
                Type::Ipv4 => Value::Ipv4(Ipv4Addr::from(v)),
                _ => Value::UInt32(v),
            }
        }
        Physical::UInt64 => {
            let v = u64::from_le_bytes(reader.read_array().await?);
            match type_ {
                Type::DateTime64(precision) => Value::DateTime64(DateTime64(tz, v, *precision)),
                _ => Value::UInt64(v),
            }
        }
        Physical::Float32 => {
            Value::Float32(f32::from_bits(u32::from_le_bytes(reader.read_array().await?)))
        }
        Physical::Float64 => {
            Value::Float64(f64::from_bits(u64::from_le_bytes(reader.read_array().await?)))
        }
        Physical::String => Value::String(reader.read_string().await?),
        Physical::FixedString(n) => {
            let bytes = reader.read_fixed(n).await?;
            match type_ {
                Type::Ipv6 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(bytes);
                    Value::Ipv6(Ipv6Addr::from(octets))
                }
                // Padding is preserved; values came back exactly N bytes wide.
                _ => Value::String(bytes.to_vec()),
            }
        }
        Physical::Uuid => {
            let high = u64::from_le_bytes(reader.read_array().await?);
            let low = u64::from_le_bytes(reader.read_array().await?);
            Value::Uuid(Uuid::from_u64_pair(high, low))
        }
    })
}

/// Writes one column of values, mask first for `Nullable` columns. `Null` in
/// a non-nullable column is rejected.
pub(crate) fn encode_column<W: AsyncWrite + Unpin>(
    writer: &mut ByteWriter<W>,
    name: &str,
    type_: &Type,
    values: &[Value],
) -> Result<()> {
    if let Type::Nullable(inner) = type_ {
        let mask = values.iter().map(|value| u8::from(value.is_null())).collect::<Vec<u8>>();
        writer.write_raw(&mask);
        for value in values {
            encode_value(writer, name, inner, value.justify_null_ref(inner).as_ref())?;
        }
        return Ok(());
    }

    for value in values {
        if value.is_null() {
            return Err(Error::Encoding(format!(
                "null value for non-nullable column `{name}`"
            )));
        }
        encode_value(writer, name, type_, value)?;
    }
    Ok(())
}

fn encode_value<W: AsyncWrite + Unpin>(
    writer: &mut ByteWriter<W>,
    name: &str,
    type_: &Type,
    value: &Value,
) -> Result<()> {
    match (type_, value) {
        (Type::Int8 | Type::Enum8, Value::Int8(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::Int16 | Type::Enum16, Value::Int16(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::Int32, Value::Int32(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::Int64, Value::Int64(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::Int128, Value::Int128(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::UInt8, Value::UInt8(x)) => writer.write_u8(*x),
        (Type::UInt16, Value::UInt16(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::UInt32, Value::UInt32(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::UInt64, Value::UInt64(x)) => writer.write_raw(&x.to_le_bytes()),
        (Type::Float32 | Type::Decimal32, Value::Float32(x)) => {
            writer.write_raw(&x.to_bits().to_le_bytes());
        }
        (Type::Float64 | Type::Decimal64, Value::Float64(x)) => {
            writer.write_raw(&x.to_bits().to_le_bytes());
        }
        (Type::String, Value::String(bytes)) => writer.write_string(bytes)?,
        (Type::FixedString(n), Value::String(bytes)) => {
            // Longer values truncate, shorter values pad with zeroes.
            if bytes.len() >= *n {
                writer.write_raw(&bytes[..*n]);
            } else {
                writer.write_raw(bytes);
                for _ in 0..(*n - bytes.len()) {
                    writer.write_u8(0);
                }
            }
        }
        (Type::Uuid, Value::Uuid(x)) => {
            let (high, low) = x.as_u64_pair();
            writer.write_raw(&high.to_le_bytes());
            writer.write_raw(&low.to_le_bytes());
        }
        (Type::Date, Value::Date(x)) => writer.write_raw(&x.0.to_le_bytes()),
        (Type::DateTime, Value::DateTime(x)) => writer.write_raw(&x.1.to_le_bytes()),
        (Type::DateTime64(precision), Value::DateTime64(x)) => {
            if x.2 != *precision {
                return Err(Error::Encoding(format!(
                    "DateTime64 precision mismatch for column `{name}`: value has {}, column \
                     wants {precision}",
                    x.2
                )));
            }
            writer.write_raw(&x.1.to_le_bytes());
        }
        (Type::Ipv4, Value::Ipv4(x)) => writer.write_raw(&u32::from(*x).to_le_bytes()),
        (Type::Ipv6, Value::Ipv6(x)) => writer.write_raw(&x.octets()),
        (Type::Decimal(_, scale), _) => {
            let raw = decimal_raw(type_, *scale, value)?;
            match type_.physical() {
                Physical::Int32 => {
                    let raw = i32::try_from(raw).map_err(|_| decimal_overflow(name, value))?;
                    writer.write_raw(&raw.to_le_bytes());
                }
                Physical::Int64 => {
                    let raw = i64::try_from(raw).map_err(|_| decimal_overflow(name, value))?;
                    writer.write_raw(&raw.to_le_bytes());
                }
                _ => writer.write_raw(&raw.to_le_bytes()),
            }
        }
        _ => {
            return Err(Error::Encoding(format!(
                "cannot encode {value:?} as {type_:?} for column `{name}`"
            )));
        }
    }
    Ok(())
}

fn decimal_overflow(name: &str, value: &Value) -> Error {
    Error::Encoding(format!("decimal overflow for column `{name}`: {value:?}"))
}

/// Produces the raw mantissa for a `Decimal(P, S)` column. Accepts decimal
/// values at the matching scale, decimal text, and integers, which are
/// scaled up by `10^S`.
#[expect(clippy::cast_possible_truncation)]
fn decimal_raw(type_: &Type, scale: usize, value: &Value) -> Result<i128> {
    let scaled_int = |x: i128| {
        x.checked_mul(10i128.pow(scale as u32))
            .ok_or_else(|| Error::Encoding(format!("decimal overflow: {value:?} at scale {scale}")))
    };
    match value {
        Value::Decimal32(s, raw) if *s == scale => Ok(i128::from(*raw)),
        Value::Decimal64(s, raw) if *s == scale => Ok(i128::from(*raw)),
        Value::Decimal128(s, raw) if *s == scale => Ok(*raw),
        Value::Decimal32(..) | Value::Decimal64(..) | Value::Decimal128(..) => Err(
            Error::Encoding(format!("decimal scale mismatch: {value:?} for {type_:?}")),
        ),
        Value::String(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::Encoding("decimal text is not UTF-8".to_string()))?;
            parse_decimal(text, scale)
        }
        Value::Int8(x) => scaled_int(i128::from(*x)),
        Value::Int16(x) => scaled_int(i128::from(*x)),
        Value::Int32(x) => scaled_int(i128::from(*x)),
        Value::Int64(x) => scaled_int(i128::from(*x)),
        Value::Int128(x) => scaled_int(*x),
        Value::UInt8(x) => scaled_int(i128::from(*x)),
        Value::UInt16(x) => scaled_int(i128::from(*x)),
        Value::UInt32(x) => scaled_int(i128::from(*x)),
        Value::UInt64(x) => scaled_int(i128::from(*x)),
        _ => Err(Error::Encoding(format!("cannot encode {value:?} as {type_:?}"))),
    }
}
