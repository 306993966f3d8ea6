use derive_more::Constructor;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io::Cursor;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::frame::{FromCursor, Serialize};
use crate::types::{from_cursor_str, serialize_str, CIntShort};

/// Description of a user defined type: its location and ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor)]
pub struct UdtSpec {
    pub keyspace: String,
    pub name: String,
    pub fields: Vec<(String, TypeSpec)>,
}

/// Closed description of a column or parameter type, as found in result metadata (`[option]`) or
/// schema tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    Custom(String),
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    Date,
    Time,
    Smallint,
    Tinyint,
    Duration,
    List(Box<TypeSpec>),
    Map(Box<TypeSpec>, Box<TypeSpec>),
    Set(Box<TypeSpec>),
    Udt(UdtSpec),
    Tuple(Vec<TypeSpec>),
    /// A type tag this version of the codec does not know.
    Unknown(u16),
}

impl TypeSpec {
    /// Returns the `[option]` id of this type.
    pub fn id(&self) -> u16 {
        match self {
            TypeSpec::Custom(_) => 0x0000,
            TypeSpec::Ascii => 0x0001,
            TypeSpec::Bigint => 0x0002,
            TypeSpec::Blob => 0x0003,
            TypeSpec::Boolean => 0x0004,
            TypeSpec::Counter => 0x0005,
            TypeSpec::Decimal => 0x0006,
            TypeSpec::Double => 0x0007,
            TypeSpec::Float => 0x0008,
            TypeSpec::Int => 0x0009,
            TypeSpec::Timestamp => 0x000B,
            TypeSpec::Uuid => 0x000C,
            TypeSpec::Varchar => 0x000D,
            TypeSpec::Varint => 0x000E,
            TypeSpec::Timeuuid => 0x000F,
            TypeSpec::Inet => 0x0010,
            TypeSpec::Date => 0x0011,
            TypeSpec::Time => 0x0012,
            TypeSpec::Smallint => 0x0013,
            TypeSpec::Tinyint => 0x0014,
            TypeSpec::Duration => 0x0015,
            TypeSpec::List(_) => 0x0020,
            TypeSpec::Map(_, _) => 0x0021,
            TypeSpec::Set(_) => 0x0022,
            TypeSpec::Udt(_) => 0x0030,
            TypeSpec::Tuple(_) => 0x0031,
            TypeSpec::Unknown(id) => *id,
        }
    }

    /// Fixed encoded width, if the type has one.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            TypeSpec::Boolean | TypeSpec::Tinyint => Some(1),
            TypeSpec::Smallint => Some(2),
            TypeSpec::Int | TypeSpec::Float | TypeSpec::Date => Some(4),
            TypeSpec::Bigint
            | TypeSpec::Counter
            | TypeSpec::Double
            | TypeSpec::Timestamp
            | TypeSpec::Time => Some(8),
            TypeSpec::Uuid | TypeSpec::Timeuuid => Some(16),
            _ => None,
        }
    }

    /// Parses a schema type string such as `frozen<map<text, list<int>>>`. Names which are not
    /// native types are resolved as user types of the given keyspace; unknown user types yield a
    /// field-less [`UdtSpec`].
    pub fn parse(value: &str, keyspace: &str, udts: &HashMap<String, UdtSpec>) -> Result<Self> {
        let mut parser = TypeParser {
            input: value,
            position: 0,
            keyspace,
            udts,
        };

        let spec = parser.parse_type()?;
        parser.skip_whitespace();

        if parser.position != value.len() {
            return Err(Error::General(format!(
                "Unexpected trailing input in type '{value}' at {}",
                parser.position
            )));
        }

        Ok(spec)
    }

    fn from_native_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "ascii" => TypeSpec::Ascii,
            "bigint" => TypeSpec::Bigint,
            "blob" => TypeSpec::Blob,
            "boolean" => TypeSpec::Boolean,
            "counter" => TypeSpec::Counter,
            "decimal" => TypeSpec::Decimal,
            "double" => TypeSpec::Double,
            "float" => TypeSpec::Float,
            "int" => TypeSpec::Int,
            "timestamp" => TypeSpec::Timestamp,
            "uuid" => TypeSpec::Uuid,
            "text" | "varchar" => TypeSpec::Varchar,
            "varint" => TypeSpec::Varint,
            "timeuuid" => TypeSpec::Timeuuid,
            "inet" => TypeSpec::Inet,
            "date" => TypeSpec::Date,
            "time" => TypeSpec::Time,
            "smallint" => TypeSpec::Smallint,
            "tinyint" => TypeSpec::Tinyint,
            "duration" => TypeSpec::Duration,
            _ => return None,
        })
    }
}

impl FromStr for TypeSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeSpec::parse(s, "", &HashMap::new())
    }
}

impl Display for TypeSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Custom(class) => write!(f, "'{class}'"),
            TypeSpec::Ascii => write!(f, "ascii"),
            TypeSpec::Bigint => write!(f, "bigint"),
            TypeSpec::Blob => write!(f, "blob"),
            TypeSpec::Boolean => write!(f, "boolean"),
            TypeSpec::Counter => write!(f, "counter"),
            TypeSpec::Decimal => write!(f, "decimal"),
            TypeSpec::Double => write!(f, "double"),
            TypeSpec::Float => write!(f, "float"),
            TypeSpec::Int => write!(f, "int"),
            TypeSpec::Timestamp => write!(f, "timestamp"),
            TypeSpec::Uuid => write!(f, "uuid"),
            TypeSpec::Varchar => write!(f, "text"),
            TypeSpec::Varint => write!(f, "varint"),
            TypeSpec::Timeuuid => write!(f, "timeuuid"),
            TypeSpec::Inet => write!(f, "inet"),
            TypeSpec::Date => write!(f, "date"),
            TypeSpec::Time => write!(f, "time"),
            TypeSpec::Smallint => write!(f, "smallint"),
            TypeSpec::Tinyint => write!(f, "tinyint"),
            TypeSpec::Duration => write!(f, "duration"),
            TypeSpec::List(elem) => write!(f, "list<{elem}>"),
            TypeSpec::Set(elem) => write!(f, "set<{elem}>"),
            TypeSpec::Map(key, value) => write!(f, "map<{key}, {value}>"),
            TypeSpec::Tuple(elems) => {
                write!(f, "tuple<")?;
                for (index, elem) in elems.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ">")
            }
            TypeSpec::Udt(udt) => write!(f, "{}.{}", udt.keyspace, udt.name),
            TypeSpec::Unknown(id) => write!(f, "unknown(0x{id:04x})"),
        }
    }
}

impl Serialize for TypeSpec {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.id().serialize(cursor);

        match self {
            TypeSpec::Custom(class) => serialize_str(cursor, class),
            TypeSpec::List(elem) | TypeSpec::Set(elem) => elem.serialize(cursor),
            TypeSpec::Map(key, value) => {
                key.serialize(cursor);
                value.serialize(cursor);
            }
            TypeSpec::Udt(udt) => {
                serialize_str(cursor, &udt.keyspace);
                serialize_str(cursor, &udt.name);
                (udt.fields.len() as CIntShort).serialize(cursor);
                for (name, spec) in &udt.fields {
                    serialize_str(cursor, name);
                    spec.serialize(cursor);
                }
            }
            TypeSpec::Tuple(elems) => {
                (elems.len() as CIntShort).serialize(cursor);
                for elem in elems {
                    elem.serialize(cursor);
                }
            }
            _ => {}
        }
    }
}

impl FromCursor for TypeSpec {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<TypeSpec> {
        let id = CIntShort::from_cursor(cursor)? as u16;

        Ok(match id {
            0x0000 => TypeSpec::Custom(from_cursor_str(cursor)?.to_string()),
            0x0001 => TypeSpec::Ascii,
            0x0002 => TypeSpec::Bigint,
            0x0003 => TypeSpec::Blob,
            0x0004 => TypeSpec::Boolean,
            0x0005 => TypeSpec::Counter,
            0x0006 => TypeSpec::Decimal,
            0x0007 => TypeSpec::Double,
            0x0008 => TypeSpec::Float,
            0x0009 => TypeSpec::Int,
            0x000B => TypeSpec::Timestamp,
            0x000C => TypeSpec::Uuid,
            0x000D => TypeSpec::Varchar,
            0x000E => TypeSpec::Varint,
            0x000F => TypeSpec::Timeuuid,
            0x0010 => TypeSpec::Inet,
            0x0011 => TypeSpec::Date,
            0x0012 => TypeSpec::Time,
            0x0013 => TypeSpec::Smallint,
            0x0014 => TypeSpec::Tinyint,
            0x0015 => TypeSpec::Duration,
            0x0020 => TypeSpec::List(Box::new(TypeSpec::from_cursor(cursor)?)),
            0x0021 => {
                let key = TypeSpec::from_cursor(cursor)?;
                let value = TypeSpec::from_cursor(cursor)?;
                TypeSpec::Map(Box::new(key), Box::new(value))
            }
            0x0022 => TypeSpec::Set(Box::new(TypeSpec::from_cursor(cursor)?)),
            0x0030 => {
                let keyspace = from_cursor_str(cursor)?.to_string();
                let name = from_cursor_str(cursor)?.to_string();
                let count = CIntShort::from_cursor(cursor)?;

                let mut fields = Vec::with_capacity(count.max(0) as usize);
                for _ in 0..count {
                    let field_name = from_cursor_str(cursor)?.to_string();
                    fields.push((field_name, TypeSpec::from_cursor(cursor)?));
                }

                TypeSpec::Udt(UdtSpec::new(keyspace, name, fields))
            }
            0x0031 => {
                let count = CIntShort::from_cursor(cursor)?;

                let mut elems = Vec::with_capacity(count.max(0) as usize);
                for _ in 0..count {
                    elems.push(TypeSpec::from_cursor(cursor)?);
                }

                TypeSpec::Tuple(elems)
            }
            id => TypeSpec::Unknown(id),
        })
    }
}

struct TypeParser<'a> {
    input: &'a str,
    position: usize,
    keyspace: &'a str,
    udts: &'a HashMap<String, UdtSpec>,
}

impl TypeParser<'_> {
    fn skip_whitespace(&mut self) {
        let input = self.input;
        while let Some(c) = input[self.position..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.position += c.len_utf8();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        let input = self.input;
        input[self.position..].chars().next()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.position += c.len_utf8();
                Ok(())
            }
            other => Err(Error::General(format!(
                "Expected '{expected}' in type '{}' at {}, found {other:?}",
                self.input, self.position
            ))),
        }
    }

    fn identifier(&mut self) -> Result<&str> {
        self.skip_whitespace();

        let input = self.input;
        let rest = &input[self.position..];
        if let Some(quoted) = rest.strip_prefix('\'') {
            let end = quoted.find('\'').ok_or_else(|| {
                Error::General(format!("Unterminated quoted type in '{}'", self.input))
            })?;

            self.position += end + 2;
            return Ok(&quoted[..end]);
        }

        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or_else(|| {
                Error::General(format!("Unterminated quoted name in '{}'", self.input))
            })?;

            self.position += end + 2;
            return Ok(&quoted[..end]);
        }

        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '$'))
            .unwrap_or(rest.len());

        if len == 0 {
            return Err(Error::General(format!(
                "Expected type name in '{}' at {}",
                self.input, self.position
            )));
        }

        self.position += len;
        Ok(&rest[..len])
    }

    fn parse_type(&mut self) -> Result<TypeSpec> {
        self.skip_whitespace();
        let quoted = self.input[self.position..].starts_with('\'');
        let name = self.identifier()?.to_string();

        if quoted {
            return Ok(TypeSpec::Custom(name));
        }

        match name.to_ascii_lowercase().as_str() {
            "frozen" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                Ok(inner)
            }
            "list" => {
                self.expect('<')?;
                let elem = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeSpec::List(Box::new(elem)))
            }
            "set" => {
                self.expect('<')?;
                let elem = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeSpec::Set(Box::new(elem)))
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeSpec::Map(Box::new(key), Box::new(value)))
            }
            "tuple" => {
                self.expect('<')?;
                let mut elems = vec![self.parse_type()?];
                while self.peek() == Some(',') {
                    self.expect(',')?;
                    elems.push(self.parse_type()?);
                }
                self.expect('>')?;
                Ok(TypeSpec::Tuple(elems))
            }
            _ => {
                if let Some(native) = TypeSpec::from_native_name(&name) {
                    return Ok(native);
                }

                if name.contains('.') {
                    return Ok(TypeSpec::Custom(name));
                }

                Ok(TypeSpec::Udt(self.udts.get(&name).cloned().unwrap_or_else(
                    || UdtSpec::new(self.keyspace.to_string(), name.clone(), vec![]),
                )))
            }
        }
    }
}
