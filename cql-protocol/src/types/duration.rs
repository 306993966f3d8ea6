use std::io::Cursor;
use thiserror::Error;

use crate::error;
use crate::frame::Serialize;

/// Possible `Duration` creation error.
#[derive(Debug, Error, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum DurationCreationError {
    #[error(
        "All values must be either negative or positive, got {months} months, {days} days, {nanoseconds} nanoseconds"
    )]
    MixedPositiveAndNegative {
        months: i32,
        days: i32,
        nanoseconds: i64,
    },
}

/// A duration stores separately months, days, and nanoseconds since the number of days in a
/// month varies, and a day can have 23 or 25 hours if a daylight saving is involved.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Duration {
    months: i32,
    days: i32,
    nanoseconds: i64,
}

impl Duration {
    pub fn new(months: i32, days: i32, nanoseconds: i64) -> Result<Self, DurationCreationError> {
        if (months < 0 || days < 0 || nanoseconds < 0)
            && (months > 0 || days > 0 || nanoseconds > 0)
        {
            Err(DurationCreationError::MixedPositiveAndNegative {
                months,
                days,
                nanoseconds,
            })
        } else {
            Ok(Self {
                months,
                days,
                nanoseconds,
            })
        }
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    pub fn days(&self) -> i32 {
        self.days
    }

    pub fn nanoseconds(&self) -> i64 {
        self.nanoseconds
    }

    /// Decodes three consecutive signed vints.
    pub fn from_bytes(bytes: &[u8]) -> error::Result<Self> {
        let mut position = 0;
        let months = read_vint(bytes, &mut position)?;
        let days = read_vint(bytes, &mut position)?;
        let nanoseconds = read_vint(bytes, &mut position)?;

        if position != bytes.len() {
            return Err("Trailing bytes after duration".into());
        }

        let months = i32::try_from(months).map_err(|_| "Duration months out of range")?;
        let days = i32::try_from(days).map_err(|_| "Duration days out of range")?;

        Duration::new(months, days, nanoseconds).map_err(|error| error.to_string().into())
    }
}

impl Serialize for Duration {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        write_vint(self.months.into(), cursor);
        write_vint(self.days.into(), cursor);
        write_vint(self.nanoseconds, cursor);
    }
}

#[inline]
fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes a signed variable length integer: zig-zag encoded, with the number of extra bytes
/// stored as leading one bits of the first byte.
fn write_vint(value: i64, cursor: &mut Cursor<&mut Vec<u8>>) {
    let value = zigzag_encode(value);
    let magnitude = (value | 1).leading_zeros() as usize;
    let size = (639 - magnitude * 9) >> 6;

    if size == 1 {
        (value as u8).serialize(cursor);
        return;
    }

    let bytes = value.to_be_bytes();
    if size == 9 {
        0xFFu8.serialize(cursor);
        bytes.serialize(cursor);
        return;
    }

    let mut encoded = bytes[8 - size..].to_vec();
    encoded[0] |= !(0xFFu8 >> (size - 1));
    encoded.serialize(cursor);
}

fn read_vint(bytes: &[u8], position: &mut usize) -> error::Result<i64> {
    let first = *bytes
        .get(*position)
        .ok_or_else(|| error::Error::from("Unexpected end of vint"))?;
    *position += 1;

    let extra_bytes = first.leading_ones() as usize;
    let mut value = u64::from(first) & (0xFFu64 >> extra_bytes);

    for _ in 0..extra_bytes {
        let byte = *bytes
            .get(*position)
            .ok_or_else(|| error::Error::from("Unexpected end of vint"))?;
        *position += 1;

        value = (value << 8) | u64::from(byte);
    }

    Ok(zigzag_decode(value))
}
