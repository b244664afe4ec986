use std::io::Cursor;
use std::time::Duration;

use chrono_tz::Tz;

use super::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn reader(bytes: Vec<u8>) -> ByteReader<Cursor<Vec<u8>>> {
    ByteReader::new(Cursor::new(bytes), TIMEOUT)
}

async fn encoded(type_: &Type, values: &[Value]) -> Vec<u8> {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    encode_column(&mut writer, "col", type_, values).unwrap();
    writer.flush().await.unwrap();
    writer.into_inner().into_inner()
}

async fn decoded(type_: &Type, rows: usize, bytes: Vec<u8>) -> Vec<Value> {
    decode_column(&mut reader(bytes), type_, rows, UTC).await.unwrap()
}

#[test]
fn parse_plain_names() {
    assert_eq!(Type::parse("Int8").unwrap(), Type::Int8);
    assert_eq!(Type::parse("UInt64").unwrap(), Type::UInt64);
    assert_eq!(Type::parse("Int128").unwrap(), Type::Int128);
    assert_eq!(Type::parse("Float64").unwrap(), Type::Float64);
    assert_eq!(Type::parse("String").unwrap(), Type::String);
    assert_eq!(Type::parse("UUID").unwrap(), Type::Uuid);
    assert_eq!(Type::parse("IPv4").unwrap(), Type::Ipv4);
    assert_eq!(Type::parse("IPv6").unwrap(), Type::Ipv6);
    assert_eq!(Type::parse("Date").unwrap(), Type::Date);
    assert_eq!(Type::parse("DateTime").unwrap(), Type::DateTime);
    assert_eq!(Type::parse("Decimal32").unwrap(), Type::Decimal32);
    assert_eq!(Type::parse("Decimal64").unwrap(), Type::Decimal64);
}

#[test]
fn parse_ignores_case_and_whitespace() {
    assert_eq!(Type::parse("  uint16 ").unwrap(), Type::UInt16);
    assert_eq!(Type::parse("DATETIME64( 3 )").unwrap(), Type::DateTime64(3));
    assert_eq!(Type::parse("nullable(int32)").unwrap(), Type::Nullable(Box::new(Type::Int32)));
}

#[test]
fn parse_parameterized() {
    assert_eq!(Type::parse("FixedString(16)").unwrap(), Type::FixedString(16));
    assert_eq!(Type::parse("DateTime64(9)").unwrap(), Type::DateTime64(9));
    assert_eq!(Type::parse("Decimal(18, 4)").unwrap(), Type::Decimal(18, 4));
    assert_eq!(Type::parse("Decimal(38,10)").unwrap(), Type::Decimal(38, 10));
    assert_eq!(Type::parse("Enum8('a' = 1, 'b' = 2)").unwrap(), Type::Enum8);
    assert_eq!(Type::parse("Enum16('x' = 300)").unwrap(), Type::Enum16);
    assert_eq!(
        Type::parse("Nullable(FixedString(8))").unwrap(),
        Type::Nullable(Box::new(Type::FixedString(8)))
    );
}

#[test]
fn parse_rejects_bad_types() {
    assert!(Type::parse("Array(Int8)").is_err());
    assert!(Type::parse("FixedString(0)").is_err());
    assert!(Type::parse("FixedString(x)").is_err());
    assert!(Type::parse("DateTime64(10)").is_err());
    assert!(Type::parse("Decimal(0, 0)").is_err());
    assert!(Type::parse("Decimal(39, 2)").is_err());
    assert!(Type::parse("Decimal(6, 7)").is_err());
    assert!(Type::parse("Nullable(Nullable(Int8))").is_err());
    assert!(Type::parse("").is_err());

    let err = Type::parse("LowCardinality(String)").unwrap_err();
    assert!(err.to_string().contains("unsupported column type: LowCardinality(String)"));
}

#[test]
fn decimal_width_follows_precision() {
    assert_eq!(Type::Decimal(9, 2).physical(), Physical::Int32);
    assert_eq!(Type::Decimal(10, 2).physical(), Physical::Int64);
    assert_eq!(Type::Decimal(18, 4).physical(), Physical::Int64);
    assert_eq!(Type::Decimal(19, 4).physical(), Physical::Int128);
    assert_eq!(Type::Decimal(38, 10).physical(), Physical::Int128);
}

#[tokio::test]
async fn int128_boundaries() {
    let min: i128 = "-170141183460469231731687303715884105728".parse().unwrap();
    let max: i128 = "170141183460469231731687303715884105727".parse().unwrap();
    let values = vec![
        Value::Int128(min),
        Value::Int128(-1),
        Value::Int128(0),
        Value::Int128(max),
    ];
    let bytes = encoded(&Type::Int128, &values).await;
    assert_eq!(&bytes[..16], &i128::MIN.to_le_bytes());
    assert_eq!(&bytes[16..32], &(-1_i128).to_le_bytes());
    assert_eq!(decoded(&Type::Int128, 4, bytes).await, values);
}

#[tokio::test]
async fn nullable_mask_precedes_values() {
    let values = vec![Value::Int32(1), Value::Null, Value::Int32(3)];
    let type_ = Type::Nullable(Box::new(Type::Int32));

    let bytes = encoded(&type_, &values).await;
    // Mask bytes, then all three value slots with a zero in the null slot.
    assert_eq!(bytes, vec![0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0]);

    assert_eq!(decoded(&type_, 3, bytes).await, values);
}

#[tokio::test]
async fn null_in_plain_column_rejected() {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    let err = encode_column(&mut writer, "age", &Type::Int32, &[Value::Null]).unwrap_err();
    assert!(err.to_string().contains("null value for non-nullable column `age`"));
}

#[tokio::test]
async fn uuid_words_little_endian_high_first() {
    let id = uuid::Uuid::from_u64_pair(0x1122_3344_5566_7788, 0x99AA_BBCC_DDEE_FF00);
    let bytes = encoded(&Type::Uuid, &[Value::Uuid(id)]).await;
    assert_eq!(
        bytes,
        vec![
            0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB,
            0xAA, 0x99
        ]
    );
    assert_eq!(decoded(&Type::Uuid, 1, bytes).await, vec![Value::Uuid(id)]);
}

#[tokio::test]
async fn ip_addresses() {
    let v4: std::net::Ipv4Addr = "1.2.3.4".parse().unwrap();
    let bytes = encoded(&Type::Ipv4, &[Value::Ipv4(v4)]).await;
    // u32 0x01020304 in little endian order.
    assert_eq!(bytes, vec![4, 3, 2, 1]);
    assert_eq!(decoded(&Type::Ipv4, 1, bytes).await, vec![Value::Ipv4(v4)]);

    let v6: std::net::Ipv6Addr = "2001:db8::1".parse().unwrap();
    let bytes = encoded(&Type::Ipv6, &[Value::Ipv6(v6)]).await;
    assert_eq!(bytes, v6.octets());
    assert_eq!(decoded(&Type::Ipv6, 1, bytes).await, vec![Value::Ipv6(v6)]);
}

#[tokio::test]
async fn datetime_stamped_with_timezone() {
    let stamp = 1_650_585_600_u32;
    let values =
        decode_column(&mut reader(stamp.to_le_bytes().to_vec()), &Type::DateTime, 1, Tz::UTC)
            .await
            .unwrap();
    assert_eq!(values, vec![Value::DateTime(DateTime(Tz::UTC, stamp))]);

    let values = decode_column(
        &mut reader(stamp.to_le_bytes().to_vec()),
        &Type::DateTime,
        1,
        Tz::America__New_York,
    )
    .await
    .unwrap();
    assert_eq!(values, vec![Value::DateTime(DateTime(Tz::America__New_York, stamp))]);
}

#[tokio::test]
async fn datetime64_carries_column_precision() {
    let raw = 1_234_500_u64;
    let values =
        decoded(&Type::DateTime64(3), 1, raw.to_le_bytes().to_vec()).await;
    assert_eq!(values, vec![Value::DateTime64(DateTime64(UTC, raw, 3))]);
}

#[tokio::test]
async fn datetime64_precision_mismatch_rejected() {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    let err = encode_column(
        &mut writer,
        "ts",
        &Type::DateTime64(3),
        &[Value::DateTime64(DateTime64(UTC, 5, 6))],
    )
    .unwrap_err();
    assert!(err.to_string().contains("precision mismatch"));
}

#[tokio::test]
async fn enum_decodes_to_discriminant() {
    let values = decoded(&Type::Enum8, 2, vec![1, 255]).await;
    assert_eq!(values, vec![Value::Int8(1), Value::Int8(-1)]);

    let values = decoded(&Type::Enum16, 1, vec![0x2C, 0x01]).await;
    assert_eq!(values, vec![Value::Int16(300)]);
}

#[tokio::test]
async fn fixed_string_pads_and_truncates() {
    let type_ = Type::FixedString(4);
    let bytes = encoded(&type_, &[Value::String(b"ab".to_vec())]).await;
    assert_eq!(bytes, b"ab\0\0");

    let bytes = encoded(&type_, &[Value::String(b"abcdef".to_vec())]).await;
    assert_eq!(bytes, b"abcd");

    // Decode keeps the full width, padding included.
    let values = decoded(&type_, 1, b"ab\0\0".to_vec()).await;
    assert_eq!(values, vec![Value::String(b"ab\0\0".to_vec())]);
}

#[tokio::test]
async fn decimal_text_round_trip() {
    let type_ = Type::Decimal(18, 4);
    let bytes = encoded(&type_, &[Value::String(b"123.4500".to_vec())]).await;
    assert_eq!(bytes, 1_234_500_i64.to_le_bytes());

    let values = decoded(&type_, 1, bytes).await;
    assert_eq!(values, vec![Value::Decimal64(4, 1_234_500)]);
    assert_eq!(values[0].to_string(), "123.4500");
}

#[tokio::test]
async fn decimal_integers_scaled_up() {
    let bytes = encoded(&Type::Decimal(9, 2), &[Value::Int32(5)]).await;
    assert_eq!(bytes, 500_i32.to_le_bytes());

    let bytes = encoded(&Type::Decimal(38, 10), &[Value::Int64(-2)]).await;
    assert_eq!(bytes, (-20_000_000_000_i128).to_le_bytes());
}

#[tokio::test]
async fn decimal_scale_mismatch_rejected() {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    let err =
        encode_column(&mut writer, "amount", &Type::Decimal(18, 4), &[Value::Decimal64(2, 150)])
            .unwrap_err();
    assert!(err.to_string().contains("decimal scale mismatch"));
}

#[tokio::test]
async fn decimal_overflowing_width_rejected() {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    let err = encode_column(
        &mut writer,
        "amount",
        &Type::Decimal(9, 2),
        &[Value::String(b"999999999999".to_vec())],
    )
    .unwrap_err();
    assert!(err.to_string().contains("decimal overflow"));
}

#[tokio::test]
async fn bare_decimal_names_are_floats() {
    let bytes = encoded(&Type::Decimal32, &[Value::Float32(1.5)]).await;
    assert_eq!(bytes, 1.5_f32.to_bits().to_le_bytes());
    assert_eq!(decoded(&Type::Decimal32, 1, bytes).await, vec![Value::Float32(1.5)]);
}

#[tokio::test]
async fn float_bits_preserved() {
    let values = vec![Value::Float64(f64::NAN), Value::Float64(f64::NEG_INFINITY)];
    let bytes = encoded(&Type::Float64, &values).await;
    let out = decoded(&Type::Float64, 2, bytes).await;
    match (&out[0], &out[1]) {
        (Value::Float64(a), Value::Float64(b)) => {
            assert!(a.is_nan());
            assert_eq!(*b, f64::NEG_INFINITY);
        }
        other => panic!("unexpected values: {other:?}"),
    }
}

#[tokio::test]
async fn mismatched_value_rejected() {
    let mut writer = ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT);
    let err =
        encode_column(&mut writer, "id", &Type::UInt64, &[Value::Int32(5)]).unwrap_err();
    assert!(err.to_string().contains("cannot encode"));
    assert!(err.to_string().contains("column `id`"));
}

#[tokio::test]
async fn zero_rows_reads_nothing() {
    let values = decoded(&Type::Int32, 0, vec![]).await;
    assert!(values.is_empty());
}
