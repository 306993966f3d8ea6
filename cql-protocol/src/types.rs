//! Wire notations of the protocol (`[int]`, `[string]`, `[bytes]`, ...) plus the column type
//! system and value codec built on top of them.
use derive_more::Constructor;
use std::collections::HashMap;
use std::convert::TryInto;
use std::io::{self, Cursor, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::frame::{FromCursor, Serialize};

pub const SHORT_LEN: usize = 2;
pub const INT_LEN: usize = 4;
pub const LONG_LEN: usize = 8;
pub const UUID_LEN: usize = 16;

/// Length marking a null `[bytes]` value.
pub const NULL_INT_LEN: CInt = -1;
/// Length marking a not set `[value]`.
pub const NOT_SET_INT_LEN: CInt = -2;
const NULL_SHORT_LEN: CIntShort = -1;

pub mod codec;
pub mod cql_value;
pub mod data_serialization_types;
pub mod decimal;
pub mod duration;
pub mod rows;
pub mod type_spec;
pub mod value;

pub use crate::types::cql_value::CqlValue;
pub use crate::types::type_spec::TypeSpec;

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::codec::{decode, encode};
    pub use crate::types::cql_value::CqlValue;
    pub use crate::types::decimal::Decimal;
    pub use crate::types::duration::Duration;
    pub use crate::types::rows::Row;
    pub use crate::types::type_spec::TypeSpec;
    pub use crate::types::value::{Bytes, Value};
}

#[inline]
fn convert_to_array<const S: usize>(bytes: &[u8]) -> std::result::Result<[u8; S], io::Error> {
    bytes
        .try_into()
        .map_err(|error| io::Error::new(io::ErrorKind::UnexpectedEof, error))
}

#[inline]
pub fn try_i64_from_bytes(bytes: &[u8]) -> std::result::Result<i64, io::Error> {
    Ok(i64::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_i32_from_bytes(bytes: &[u8]) -> std::result::Result<i32, io::Error> {
    Ok(i32::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_i16_from_bytes(bytes: &[u8]) -> std::result::Result<i16, io::Error> {
    Ok(i16::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_f32_from_bytes(bytes: &[u8]) -> std::result::Result<f32, io::Error> {
    Ok(f32::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_f64_from_bytes(bytes: &[u8]) -> std::result::Result<f64, io::Error> {
    Ok(f64::from_be_bytes(convert_to_array(bytes)?))
}

pub fn serialize_str(cursor: &mut Cursor<&mut Vec<u8>>, value: &str) {
    let len = value.len() as CIntShort;
    len.serialize(cursor);
    value.as_bytes().serialize(cursor);
}

pub fn serialize_str_long(cursor: &mut Cursor<&mut Vec<u8>>, value: &str) {
    let len = value.len() as CInt;
    len.serialize(cursor);
    value.as_bytes().serialize(cursor);
}

pub fn from_cursor_str<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a str> {
    let len = CIntShort::from_cursor(cursor)?;
    let body_bytes = cursor_next_value_ref(cursor, len.max(0) as usize)?;

    std::str::from_utf8(body_bytes).map_err(Into::into)
}

pub fn from_cursor_str_long<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a str> {
    let len = CInt::from_cursor(cursor)?;
    let body_bytes = cursor_next_value_ref(cursor, len.max(0) as usize)?;

    std::str::from_utf8(body_bytes).map_err(Into::into)
}

pub fn serialize_str_list<'a>(
    cursor: &mut Cursor<&mut Vec<u8>>,
    list: impl ExactSizeIterator<Item = &'a str>,
) {
    let len = list.len() as CIntShort;
    len.serialize(cursor);

    for string in list {
        serialize_str(cursor, string);
    }
}

pub fn from_cursor_string_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<String>> {
    let len = CIntShort::from_cursor(cursor)?;
    let mut list = Vec::with_capacity(len.max(0) as usize);
    for _ in 0..len {
        list.push(from_cursor_str(cursor)?.to_string());
    }

    Ok(list)
}

/// `[string map]`: a short count followed by key/value `[string]` pairs.
pub fn serialize_str_map(cursor: &mut Cursor<&mut Vec<u8>>, map: &HashMap<String, String>) {
    let len = map.len() as CIntShort;
    len.serialize(cursor);

    for (key, value) in map {
        serialize_str(cursor, key);
        serialize_str(cursor, value);
    }
}

pub fn from_cursor_str_map(cursor: &mut Cursor<&[u8]>) -> Result<HashMap<String, String>> {
    let len = CIntShort::from_cursor(cursor)?;
    let mut map = HashMap::with_capacity(len.max(0) as usize);
    for _ in 0..len {
        let key = from_cursor_str(cursor)?.to_string();
        let value = from_cursor_str(cursor)?.to_string();
        map.insert(key, value);
    }

    Ok(map)
}

/// `[string multimap]`: a short count followed by `[string]` keys with `[string list]` values.
pub fn serialize_str_multimap(
    cursor: &mut Cursor<&mut Vec<u8>>,
    map: &HashMap<String, Vec<String>>,
) {
    let len = map.len() as CIntShort;
    len.serialize(cursor);

    for (key, values) in map {
        serialize_str(cursor, key);
        serialize_str_list(cursor, values.iter().map(String::as_str));
    }
}

pub fn from_cursor_str_multimap(cursor: &mut Cursor<&[u8]>) -> Result<HashMap<String, Vec<String>>> {
    let len = CIntShort::from_cursor(cursor)?;
    let mut map = HashMap::with_capacity(len.max(0) as usize);
    for _ in 0..len {
        let key = from_cursor_str(cursor)?.to_string();
        let values = from_cursor_string_list(cursor)?;
        map.insert(key, values);
    }

    Ok(map)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, Default)]
/// The structure that represents `[bytes]`.
pub struct CBytes {
    bytes: Option<Vec<u8>>,
}

impl CBytes {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> CBytes {
        CBytes { bytes: Some(bytes) }
    }

    /// Creates bytes that represent a null value.
    #[inline]
    pub fn new_null() -> CBytes {
        CBytes { bytes: None }
    }

    #[inline]
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    #[inline]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.bytes
    }
}

impl FromCursor for CBytes {
    /// Reads a length-prefixed value; negative lengths denote null.
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CBytes> {
        let len = CInt::from_cursor(cursor)?;
        if len < 0 {
            return Ok(CBytes { bytes: None });
        }

        cursor_next_value(cursor, len as usize).map(CBytes::new)
    }
}

impl Serialize for CBytes {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match &self.bytes {
            Some(bytes) => {
                let len = bytes.len() as CInt;
                len.serialize(cursor);
                bytes.serialize(cursor);
            }
            None => NULL_INT_LEN.serialize(cursor),
        }
    }
}

/// `[short bytes]`
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub struct CBytesShort {
    bytes: Option<Vec<u8>>,
}

impl CBytesShort {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> CBytesShort {
        CBytesShort { bytes: Some(bytes) }
    }

    #[inline]
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    #[inline]
    pub fn into_plain(self) -> Option<Vec<u8>> {
        self.bytes
    }
}

impl FromCursor for CBytesShort {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CBytesShort> {
        let len = CIntShort::from_cursor(cursor)?;

        if len < 0 {
            return Ok(CBytesShort { bytes: None });
        }

        cursor_next_value(cursor, len as usize).map(CBytesShort::new)
    }
}

impl Serialize for CBytesShort {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match &self.bytes {
            Some(bytes) => {
                let len = bytes.len() as CIntShort;
                len.serialize(cursor);
                bytes.serialize(cursor);
            }
            None => NULL_SHORT_LEN.serialize(cursor),
        }
    }
}

/// `[int]`
pub type CInt = i32;

impl FromCursor for CInt {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CInt> {
        let mut buff = [0; INT_LEN];
        cursor.read_exact(&mut buff)?;

        Ok(CInt::from_be_bytes(buff))
    }
}

/// `[short]`
pub type CIntShort = i16;

impl FromCursor for CIntShort {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CIntShort> {
        let mut buff = [0; SHORT_LEN];
        cursor.read_exact(&mut buff)?;

        Ok(CIntShort::from_be_bytes(buff))
    }
}

/// `[long]`
pub type CLong = i64;

impl FromCursor for CLong {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buff = [0; LONG_LEN];
        cursor.read_exact(&mut buff)?;

        Ok(CLong::from_be_bytes(buff))
    }
}

impl FromCursor for u8 {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buff = [0; 1];
        cursor.read_exact(&mut buff)?;

        Ok(buff[0])
    }
}

/// `[inet]`: address size, address bytes and an `[int]` port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Constructor)]
pub struct CInet {
    pub addr: SocketAddr,
}

impl Serialize for CInet {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self.addr.ip() {
            IpAddr::V4(v4) => {
                4u8.serialize(cursor);
                v4.octets().serialize(cursor);
            }
            IpAddr::V6(v6) => {
                16u8.serialize(cursor);
                v6.octets().serialize(cursor);
            }
        }

        CInt::from(self.addr.port()).serialize(cursor);
    }
}

impl FromCursor for CInet {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CInet> {
        let n = u8::from_cursor(cursor)?;

        let ip = decode_inet(cursor_next_value_ref(cursor, n as usize)?)?;
        let port = CInt::from_cursor(cursor)?;
        let socket_addr = SocketAddr::new(ip, port as u16);

        Ok(CInet { addr: socket_addr })
    }
}

/// Decodes a bare 4 or 16 byte address.
pub fn decode_inet(bytes: &[u8]) -> Result<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = convert_to_array(bytes)?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = convert_to_array(bytes)?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        len => Err(Error::General(format!("Invalid inet address length: {len}"))),
    }
}

pub fn cursor_next_value(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    cursor_next_value_ref(cursor, len).map(|bytes| bytes.to_vec())
}

pub fn cursor_next_value_ref<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let buffer: &'a [u8] = *cursor.get_ref();
    let end = start.saturating_add(len);

    if end > buffer.len() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Expected {len} bytes at position {start}"),
        )));
    }

    cursor.set_position(end as u64);
    Ok(&buffer[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_from_cursor_str() {
        let a = &[0, 3, 102, 111, 111, 0];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        let cstring = from_cursor_str(&mut cursor).unwrap();
        assert_eq!(cstring, "foo");
    }

    #[test]
    fn test_from_cursor_str_long() {
        let a = &[0, 0, 0, 3, 102, 111, 111, 0];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        let cstring = from_cursor_str_long(&mut cursor).unwrap();
        assert_eq!(cstring, "foo");
    }

    #[test]
    fn test_serialize_str() {
        let mut buf = vec![];
        serialize_str(&mut Cursor::new(&mut buf), "foo");

        assert_eq!(buf, &[0, 3, 102, 111, 111]);
    }

    #[test]
    fn test_cstringlist() {
        let a = &[0, 2, 0, 3, 102, 111, 111, 0, 3, 102, 111, 112];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        let list = from_cursor_string_list(&mut cursor).unwrap();

        assert_eq!(list, vec!("foo".to_string(), "fop".to_string()));
    }

    #[test]
    fn test_string_multimap() {
        let map = hashmap! {
            "CQL_VERSION".to_string() => vec!["3.0.0".to_string()],
        };

        let mut buf = vec![];
        serialize_str_multimap(&mut Cursor::new(&mut buf), &map);

        let mut cursor: Cursor<&[u8]> = Cursor::new(&buf);
        assert_eq!(from_cursor_str_multimap(&mut cursor).unwrap(), map);
    }

    #[test]
    fn test_cbytes_from_cursor() {
        let a = &[0, 0, 0, 3, 1, 2, 3];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        let cbytes = CBytes::from_cursor(&mut cursor).unwrap();
        assert_eq!(cbytes.into_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_cbytes_null() {
        assert_eq!(CBytes::new_null().serialize_to_vec(), vec![0xFF, 0xFF, 0xFF, 0xFF]);

        let a = &[0xFF, 0xFF, 0xFF, 0xFE];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        assert!(CBytes::from_cursor(&mut cursor).unwrap().is_null());
    }

    #[test]
    fn test_cbytes_serialize() {
        let cbytes = CBytes::new(vec![1, 2, 3]);
        assert_eq!(cbytes.serialize_to_vec(), vec![0, 0, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_cbytesshort_serialize() {
        let cbytes = CBytesShort::new(vec![1, 2, 3]);
        assert_eq!(cbytes.serialize_to_vec(), vec![0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_cbytes_truncated() {
        let a = &[0, 0, 0, 5, 1, 2];
        let mut cursor: Cursor<&[u8]> = Cursor::new(a);
        assert!(CBytes::from_cursor(&mut cursor).is_err());
    }

    #[test]
    fn test_cinet() {
        let inet = CInet::new("127.0.0.1:9042".parse().unwrap());
        let bytes = inet.serialize_to_vec();
        assert_eq!(bytes, vec![4, 127, 0, 0, 1, 0, 0, 0x23, 0x52]);

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        assert_eq!(CInet::from_cursor(&mut cursor).unwrap(), inet);
    }
}
