use num_bigint::BigInt;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use uuid::Uuid;

use crate::types::decimal::Decimal;
use crate::types::duration::Duration;

/// Native representation of a decoded value. Null is represented outside the enum, by
/// `Option<CqlValue>`.
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Ascii(String),
    Bigint(i64),
    Blob(Vec<u8>),
    Boolean(bool),
    Counter(i64),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    Int(i32),
    /// Milliseconds since the unix epoch.
    Timestamp(i64),
    Uuid(Uuid),
    Text(String),
    Varint(BigInt),
    Timeuuid(Uuid),
    Inet(IpAddr),
    /// Days with the unix epoch centered at 2^31.
    Date(u32),
    /// Nanoseconds since midnight.
    Time(i64),
    Smallint(i16),
    Tinyint(i8),
    Duration(Duration),
    List(Vec<CqlValue>),
    Set(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    Tuple(Vec<Option<CqlValue>>),
    Udt {
        keyspace: String,
        name: String,
        fields: Vec<(String, Option<CqlValue>)>,
    },
    /// Raw bytes of a custom or unrecognized type.
    Opaque(Vec<u8>),
}

impl CqlValue {
    /// Name of the variant, used in type mismatch reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            CqlValue::Ascii(_) => "ascii",
            CqlValue::Bigint(_) => "bigint",
            CqlValue::Blob(_) => "blob",
            CqlValue::Boolean(_) => "boolean",
            CqlValue::Counter(_) => "counter",
            CqlValue::Decimal(_) => "decimal",
            CqlValue::Double(_) => "double",
            CqlValue::Float(_) => "float",
            CqlValue::Int(_) => "int",
            CqlValue::Timestamp(_) => "timestamp",
            CqlValue::Uuid(_) => "uuid",
            CqlValue::Text(_) => "text",
            CqlValue::Varint(_) => "varint",
            CqlValue::Timeuuid(_) => "timeuuid",
            CqlValue::Inet(_) => "inet",
            CqlValue::Date(_) => "date",
            CqlValue::Time(_) => "time",
            CqlValue::Smallint(_) => "smallint",
            CqlValue::Tinyint(_) => "tinyint",
            CqlValue::Duration(_) => "duration",
            CqlValue::List(_) => "list",
            CqlValue::Set(_) => "set",
            CqlValue::Map(_) => "map",
            CqlValue::Tuple(_) => "tuple",
            CqlValue::Udt { .. } => "udt",
            CqlValue::Opaque(_) => "opaque",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CqlValue::Ascii(value) | CqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            CqlValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            CqlValue::Bigint(value) | CqlValue::Counter(value) | CqlValue::Timestamp(value) => {
                Some(*value)
            }
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            CqlValue::Uuid(value) | CqlValue::Timeuuid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_inet(&self) -> Option<IpAddr> {
        match self {
            CqlValue::Inet(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            CqlValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns elements of a list or a set.
    pub fn as_collection(&self) -> Option<&[CqlValue]> {
        match self {
            CqlValue::List(values) | CqlValue::Set(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(CqlValue, CqlValue)]> {
        match self {
            CqlValue::Map(values) => Some(values),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            CqlValue::Ascii(value) | CqlValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl Display for CqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CqlValue::Ascii(value) | CqlValue::Text(value) => write!(f, "'{value}'"),
            CqlValue::Bigint(value) | CqlValue::Counter(value) | CqlValue::Timestamp(value) => {
                write!(f, "{value}")
            }
            CqlValue::Time(value) => write!(f, "{value}"),
            CqlValue::Blob(value) | CqlValue::Opaque(value) => {
                write!(f, "0x")?;
                value.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            CqlValue::Boolean(value) => write!(f, "{value}"),
            CqlValue::Decimal(value) => write!(f, "{value}"),
            CqlValue::Double(value) => write!(f, "{value}"),
            CqlValue::Float(value) => write!(f, "{value}"),
            CqlValue::Int(value) => write!(f, "{value}"),
            CqlValue::Uuid(value) | CqlValue::Timeuuid(value) => write!(f, "{value}"),
            CqlValue::Varint(value) => write!(f, "{value}"),
            CqlValue::Inet(value) => write!(f, "'{value}'"),
            CqlValue::Date(value) => write!(f, "{value}"),
            CqlValue::Smallint(value) => write!(f, "{value}"),
            CqlValue::Tinyint(value) => write!(f, "{value}"),
            CqlValue::Duration(value) => write!(
                f,
                "{}mo{}d{}ns",
                value.months(),
                value.days(),
                value.nanoseconds()
            ),
            CqlValue::List(values) => write_sequence(f, "[", "]", values.iter()),
            CqlValue::Set(values) => write_sequence(f, "{", "}", values.iter()),
            CqlValue::Map(values) => {
                write!(f, "{{")?;
                for (index, (key, value)) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            CqlValue::Tuple(values) => {
                write!(f, "(")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write_nullable(f, value.as_ref())?;
                }
                write!(f, ")")
            }
            CqlValue::Udt { fields, .. } => {
                write!(f, "{{")?;
                for (index, (name, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: ")?;
                    write_nullable(f, value.as_ref())?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_sequence<'a>(
    f: &mut Formatter<'_>,
    open: &str,
    close: &str,
    values: impl Iterator<Item = &'a CqlValue>,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (index, value) in values.enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, "{close}")
}

fn write_nullable(f: &mut Formatter<'_>, value: Option<&CqlValue>) -> fmt::Result {
    match value {
        Some(value) => write!(f, "{value}"),
        None => write!(f, "null"),
    }
}

macro_rules! impl_from_for_cql_value {
    ($t:ty, $variant:ident) => {
        impl From<$t> for CqlValue {
            #[inline]
            fn from(value: $t) -> Self {
                CqlValue::$variant(value.into())
            }
        }
    };
}

impl_from_for_cql_value!(String, Text);
impl_from_for_cql_value!(&str, Text);
impl_from_for_cql_value!(i64, Bigint);
impl_from_for_cql_value!(i32, Int);
impl_from_for_cql_value!(i16, Smallint);
impl_from_for_cql_value!(i8, Tinyint);
impl_from_for_cql_value!(bool, Boolean);
impl_from_for_cql_value!(f64, Double);
impl_from_for_cql_value!(f32, Float);
impl_from_for_cql_value!(Uuid, Uuid);
impl_from_for_cql_value!(IpAddr, Inet);
impl_from_for_cql_value!(Decimal, Decimal);
impl_from_for_cql_value!(BigInt, Varint);
impl_from_for_cql_value!(Duration, Duration);
impl_from_for_cql_value!(Vec<u8>, Blob);
