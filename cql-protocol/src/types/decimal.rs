use derive_more::{Constructor, Display};
use num_bigint::BigInt;
use std::io::Cursor;

use crate::frame::Serialize;

/// Arbitrary precision decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Constructor, Ord, PartialOrd, Eq, Hash, Display)]
#[display("{unscaled}e-{scale}")]
pub struct Decimal {
    pub unscaled: BigInt,
    pub scale: i32,
}

impl Decimal {
    /// Returns the integral part of the value.
    pub fn as_plain(&self) -> BigInt {
        if self.scale <= 0 {
            return self.unscaled.clone() * BigInt::from(10).pow(self.scale.unsigned_abs());
        }

        self.unscaled.clone() / BigInt::from(10).pow(self.scale as u32)
    }
}

impl Serialize for Decimal {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.scale.serialize(cursor);
        self.unscaled.to_signed_bytes_be().serialize(cursor);
    }
}

macro_rules! impl_from_for_decimal {
    ($t:ty) => {
        impl From<$t> for Decimal {
            fn from(i: $t) -> Self {
                Decimal {
                    unscaled: i.into(),
                    scale: 0,
                }
            }
        }
    };
}

impl_from_for_decimal!(i8);
impl_from_for_decimal!(i16);
impl_from_for_decimal!(i32);
impl_from_for_decimal!(i64);
impl_from_for_decimal!(u8);
impl_from_for_decimal!(u16);
