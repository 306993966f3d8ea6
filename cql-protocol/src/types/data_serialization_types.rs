use num_bigint::BigInt;
use std::io::{self, Cursor};
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::FromCursor;
use crate::types::decimal::Decimal;
use crate::types::duration::Duration;
use crate::types::{
    try_f32_from_bytes, try_f64_from_bytes, try_i16_from_bytes, try_i32_from_bytes,
    try_i64_from_bytes, CBytes, CInt, INT_LEN,
};

// https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec#L813

const FALSE_BYTE: u8 = 0;

#[inline]
fn width_error(type_name: &str, expected: usize, actual: usize) -> Error {
    Error::General(format!(
        "Invalid {type_name} value: expected {expected} bytes, got {actual}"
    ))
}

// Decodes `ascii` data, rejecting non-ASCII bytes
pub fn decode_ascii(bytes: &[u8]) -> Result<String> {
    if !bytes.is_ascii() {
        return Err("Invalid ascii value: non-ASCII bytes found".into());
    }

    decode_varchar(bytes)
}

// Decodes `varchar` data
#[inline]
pub fn decode_varchar(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

// Decodes `bigint` data
#[inline]
pub fn decode_bigint(bytes: &[u8]) -> Result<i64> {
    try_i64_from_bytes(bytes).map_err(|_| width_error("bigint", 8, bytes.len()))
}

// Decodes `boolean` data
#[inline]
pub fn decode_boolean(bytes: &[u8]) -> Result<bool> {
    match bytes {
        [byte] => Ok(*byte != FALSE_BYTE),
        _ => Err(width_error("boolean", 1, bytes.len())),
    }
}

// Decodes `int` data
#[inline]
pub fn decode_int(bytes: &[u8]) -> Result<i32> {
    try_i32_from_bytes(bytes).map_err(|_| width_error("int", 4, bytes.len()))
}

// Decodes `date` data
//    0: -5877641-06-23
// 2^31: 1970-1-1
// 2^32: 5881580-07-11
#[inline]
pub fn decode_date(bytes: &[u8]) -> Result<u32> {
    decode_int(bytes).map(|value| value as u32)
}

// Decodes `decimal` data
pub fn decode_decimal(bytes: &[u8]) -> Result<Decimal> {
    if bytes.len() < INT_LEN {
        return Err(width_error("decimal", INT_LEN, bytes.len()));
    }

    let (scale, unscaled) = bytes.split_at(INT_LEN);
    let scale = decode_int(scale)?;
    let unscaled = decode_varint(unscaled)?;

    Ok(Decimal::new(unscaled, scale))
}

// Decodes `double` data
#[inline]
pub fn decode_double(bytes: &[u8]) -> Result<f64> {
    try_f64_from_bytes(bytes).map_err(|_| width_error("double", 8, bytes.len()))
}

// Decodes `float` data
#[inline]
pub fn decode_float(bytes: &[u8]) -> Result<f32> {
    try_f32_from_bytes(bytes).map_err(|_| width_error("float", 4, bytes.len()))
}

// Decodes `inet` data
#[inline]
pub fn decode_inet(bytes: &[u8]) -> Result<IpAddr> {
    crate::types::decode_inet(bytes)
}

// Decodes `timestamp` data: milliseconds since the unix epoch
#[inline]
pub fn decode_timestamp(bytes: &[u8]) -> Result<i64> {
    try_i64_from_bytes(bytes).map_err(|_| width_error("timestamp", 8, bytes.len()))
}

// Decodes `time` data: nanoseconds since midnight
#[inline]
pub fn decode_time(bytes: &[u8]) -> Result<i64> {
    try_i64_from_bytes(bytes).map_err(|_| width_error("time", 8, bytes.len()))
}

// Decodes `smallint` data
#[inline]
pub fn decode_smallint(bytes: &[u8]) -> Result<i16> {
    try_i16_from_bytes(bytes).map_err(|_| width_error("smallint", 2, bytes.len()))
}

// Decodes `tinyint` data
#[inline]
pub fn decode_tinyint(bytes: &[u8]) -> Result<i8> {
    match bytes {
        [byte] => Ok(*byte as i8),
        _ => Err(width_error("tinyint", 1, bytes.len())),
    }
}

// Decodes `uuid` and `timeuuid` data
#[inline]
pub fn decode_uuid(bytes: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(bytes).map_err(Into::into)
}

// Decodes `varint` data
#[inline]
pub fn decode_varint(bytes: &[u8]) -> Result<BigInt> {
    Ok(BigInt::from_signed_bytes_be(bytes))
}

// Decodes `duration` data
#[inline]
pub fn decode_duration(bytes: &[u8]) -> Result<Duration> {
    Duration::from_bytes(bytes)
}

/// Splits a collection body into its `[int]` element count and the cursor positioned at the
/// first element.
pub fn decode_collection_len<'a>(bytes: &'a [u8]) -> Result<(usize, Cursor<&'a [u8]>)> {
    let mut cursor = Cursor::new(bytes);
    let len = CInt::from_cursor(&mut cursor)?;
    if len < 0 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Negative collection length: {len}"),
        )));
    }

    Ok((len as usize, cursor))
}

/// Reads consecutive `[bytes]` elements until the buffer is exhausted, at most `max` of them.
pub fn decode_positional(bytes: &[u8], max: usize) -> Result<Vec<CBytes>> {
    let mut cursor = Cursor::new(bytes);
    let mut elements = Vec::with_capacity(max);

    while (cursor.position() as usize) < bytes.len() && elements.len() < max {
        elements.push(CBytes::from_cursor(&mut cursor)?);
    }

    if (cursor.position() as usize) < bytes.len() {
        return Err("Unexpected trailing bytes after positional fields".into());
    }

    Ok(elements)
}
