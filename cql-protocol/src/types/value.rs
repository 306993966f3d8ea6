use derive_more::Constructor;
use num_bigint::BigInt;
use std::io::Cursor;
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{FromCursor, Serialize};
use crate::types::decimal::Decimal;
use crate::types::duration::Duration;
use crate::types::{cursor_next_value, CInt, NOT_SET_INT_LEN, NULL_INT_LEN};

/// Wire-level value which could be an array of bytes, null or not set.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub enum Value {
    Some(Vec<u8>),
    Null,
    NotSet,
}

impl Value {
    pub fn new<B>(v: B) -> Value
    where
        B: Into<Bytes>,
    {
        Value::Some(v.into().0)
    }

    #[inline]
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Value::Some(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            Value::Null => NULL_INT_LEN.serialize(cursor),
            Value::NotSet => NOT_SET_INT_LEN.serialize(cursor),
            Value::Some(value) => {
                let len = value.len() as CInt;
                len.serialize(cursor);
                value.serialize(cursor);
            }
        }
    }
}

impl FromCursor for Value {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Value> {
        let value_size = CInt::from_cursor(cursor)?;

        if value_size >= 0 {
            Ok(Value::Some(cursor_next_value(cursor, value_size as usize)?))
        } else if value_size == NULL_INT_LEN {
            Ok(Value::Null)
        } else if value_size == NOT_SET_INT_LEN {
            Ok(Value::NotSet)
        } else {
            Err(Error::General(format!("Invalid value length: {value_size}")))
        }
    }
}

impl<T: Into<Bytes>> From<T> for Value {
    fn from(b: T) -> Value {
        Value::new(b.into())
    }
}

impl<T: Into<Bytes>> From<Option<T>> for Value {
    fn from(b: Option<T>) -> Value {
        match b {
            Some(b) => Value::new(b.into()),
            None => Value::Null,
        }
    }
}

/// Natural encoding of a Rust value, for building query values without type metadata.
#[derive(Debug, Clone, Constructor)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    /// Consumes `Bytes` and returns the inner `Vec<u8>`
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<String> for Bytes {
    #[inline]
    fn from(value: String) -> Self {
        Bytes(value.into_bytes())
    }
}

impl From<&str> for Bytes {
    #[inline]
    fn from(value: &str) -> Self {
        Bytes(value.as_bytes().to_vec())
    }
}

macro_rules! impl_from_be_bytes {
    ($t:ty) => {
        impl From<$t> for Bytes {
            #[inline]
            fn from(value: $t) -> Self {
                Bytes(value.to_be_bytes().to_vec())
            }
        }
    };
}

impl_from_be_bytes!(i8);
impl_from_be_bytes!(i16);
impl_from_be_bytes!(i32);
impl_from_be_bytes!(i64);
impl_from_be_bytes!(f32);
impl_from_be_bytes!(f64);

impl From<bool> for Bytes {
    #[inline]
    fn from(value: bool) -> Self {
        Bytes(vec![value as u8])
    }
}

impl From<Uuid> for Bytes {
    #[inline]
    fn from(value: Uuid) -> Self {
        Bytes(value.as_bytes().to_vec())
    }
}

impl From<IpAddr> for Bytes {
    #[inline]
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(ip) => Bytes(ip.octets().to_vec()),
            IpAddr::V6(ip) => Bytes(ip.octets().to_vec()),
        }
    }
}

impl From<Vec<u8>> for Bytes {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Bytes(value)
    }
}

impl From<BigInt> for Bytes {
    #[inline]
    fn from(value: BigInt) -> Self {
        Bytes(value.to_signed_bytes_be())
    }
}

impl From<Decimal> for Bytes {
    #[inline]
    fn from(value: Decimal) -> Self {
        Bytes(value.serialize_to_vec())
    }
}

impl From<Duration> for Bytes {
    #[inline]
    fn from(value: Duration) -> Self {
        Bytes(value.serialize_to_vec())
    }
}
