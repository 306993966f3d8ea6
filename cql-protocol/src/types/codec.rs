//! Conversion between [`CqlValue`] and the wire representation of a given [`TypeSpec`].
//!
//! Encoding checks every value against its type while building the output buffer; a mismatch
//! anywhere in a nested value fails the whole call with [`Error::TypeMismatch`], so a partially
//! encoded value never escapes.
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::frame::{FromCursor, Serialize};
use crate::types::cql_value::CqlValue;
use crate::types::data_serialization_types::*;
use crate::types::type_spec::{TypeSpec, UdtSpec};
use crate::types::value::Value;
use crate::types::{CBytes, CInt};

/// Encodes a non-null value as the given type.
pub fn encode(value: &CqlValue, type_spec: &TypeSpec) -> Result<Value> {
    let mut buffer = vec![];
    write_value(value, type_spec, &mut Cursor::new(&mut buffer))?;
    Ok(Value::Some(buffer))
}

/// Encodes a nullable value; `None` becomes a null value.
pub fn encode_nullable(value: Option<&CqlValue>, type_spec: &TypeSpec) -> Result<Value> {
    match value {
        Some(value) => encode(value, type_spec),
        None => Ok(Value::Null),
    }
}

/// Decodes non-null bytes as the given type.
pub fn decode(bytes: &[u8], type_spec: &TypeSpec) -> Result<CqlValue> {
    Ok(match type_spec {
        TypeSpec::Ascii => CqlValue::Ascii(decode_ascii(bytes)?),
        TypeSpec::Varchar => CqlValue::Text(decode_varchar(bytes)?),
        TypeSpec::Bigint => CqlValue::Bigint(decode_bigint(bytes)?),
        TypeSpec::Counter => CqlValue::Counter(decode_bigint(bytes)?),
        TypeSpec::Blob => CqlValue::Blob(bytes.to_vec()),
        TypeSpec::Boolean => CqlValue::Boolean(decode_boolean(bytes)?),
        TypeSpec::Decimal => CqlValue::Decimal(decode_decimal(bytes)?),
        TypeSpec::Double => CqlValue::Double(decode_double(bytes)?),
        TypeSpec::Float => CqlValue::Float(decode_float(bytes)?),
        TypeSpec::Int => CqlValue::Int(decode_int(bytes)?),
        TypeSpec::Timestamp => CqlValue::Timestamp(decode_timestamp(bytes)?),
        TypeSpec::Uuid => CqlValue::Uuid(decode_uuid(bytes)?),
        TypeSpec::Timeuuid => CqlValue::Timeuuid(decode_uuid(bytes)?),
        TypeSpec::Varint => CqlValue::Varint(decode_varint(bytes)?),
        TypeSpec::Inet => CqlValue::Inet(decode_inet(bytes)?),
        TypeSpec::Date => CqlValue::Date(decode_date(bytes)?),
        TypeSpec::Time => CqlValue::Time(decode_time(bytes)?),
        TypeSpec::Smallint => CqlValue::Smallint(decode_smallint(bytes)?),
        TypeSpec::Tinyint => CqlValue::Tinyint(decode_tinyint(bytes)?),
        TypeSpec::Duration => CqlValue::Duration(decode_duration(bytes)?),
        TypeSpec::List(elem) => CqlValue::List(decode_elements(bytes, elem)?),
        TypeSpec::Set(elem) => CqlValue::Set(decode_elements(bytes, elem)?),
        TypeSpec::Map(key_spec, value_spec) => {
            let (len, mut cursor) = decode_collection_len(bytes)?;
            let mut entries = Vec::with_capacity(len.min(bytes.len()));
            for _ in 0..len {
                let key = decode_element(&mut cursor, key_spec)?;
                let value = decode_element(&mut cursor, value_spec)?;
                entries.push((key, value));
            }

            CqlValue::Map(entries)
        }
        TypeSpec::Tuple(elems) => {
            let fields = decode_positional(bytes, elems.len())?;
            let mut values = Vec::with_capacity(elems.len());
            for (index, spec) in elems.iter().enumerate() {
                values.push(decode_nullable(fields.get(index), spec)?);
            }

            CqlValue::Tuple(values)
        }
        TypeSpec::Udt(udt) => {
            let raw_fields = decode_positional(bytes, udt.fields.len())?;
            let mut fields = Vec::with_capacity(udt.fields.len());
            for (index, (name, spec)) in udt.fields.iter().enumerate() {
                fields.push((name.clone(), decode_nullable(raw_fields.get(index), spec)?));
            }

            CqlValue::Udt {
                keyspace: udt.keyspace.clone(),
                name: udt.name.clone(),
                fields,
            }
        }
        TypeSpec::Custom(_) | TypeSpec::Unknown(_) => CqlValue::Opaque(bytes.to_vec()),
    })
}

/// Decodes possibly null bytes; absent or null bytes decode as `None`.
pub fn decode_nullable(bytes: Option<&CBytes>, type_spec: &TypeSpec) -> Result<Option<CqlValue>> {
    match bytes.and_then(CBytes::as_slice) {
        Some(bytes) => decode(bytes, type_spec).map(Some),
        None => Ok(None),
    }
}

fn decode_elements(bytes: &[u8], elem_spec: &TypeSpec) -> Result<Vec<CqlValue>> {
    let (len, mut cursor) = decode_collection_len(bytes)?;
    let mut elements = Vec::with_capacity(len.min(bytes.len()));
    for _ in 0..len {
        elements.push(decode_element(&mut cursor, elem_spec)?);
    }

    Ok(elements)
}

fn decode_element(cursor: &mut Cursor<&[u8]>, spec: &TypeSpec) -> Result<CqlValue> {
    let bytes = CBytes::from_cursor(cursor)?;
    match bytes.as_slice() {
        Some(bytes) => decode(bytes, spec),
        None => Err(Error::General(format!(
            "Null element found in a collection of {spec}"
        ))),
    }
}

#[inline]
fn mismatch(type_spec: &TypeSpec, value: &CqlValue) -> Error {
    Error::type_mismatch(type_spec, value.type_name())
}

fn write_value(
    value: &CqlValue,
    type_spec: &TypeSpec,
    cursor: &mut Cursor<&mut Vec<u8>>,
) -> Result<()> {
    match (type_spec, value) {
        (TypeSpec::Ascii, CqlValue::Ascii(text) | CqlValue::Text(text)) => {
            if !text.is_ascii() {
                return Err(Error::type_mismatch(type_spec, "non-ASCII text"));
            }

            text.as_bytes().serialize(cursor);
        }
        (TypeSpec::Varchar, CqlValue::Ascii(text) | CqlValue::Text(text)) => {
            text.as_bytes().serialize(cursor)
        }
        (TypeSpec::Bigint, CqlValue::Bigint(value))
        | (TypeSpec::Counter, CqlValue::Counter(value) | CqlValue::Bigint(value))
        | (TypeSpec::Timestamp, CqlValue::Timestamp(value))
        | (TypeSpec::Time, CqlValue::Time(value)) => value.serialize(cursor),
        (TypeSpec::Blob, CqlValue::Blob(bytes)) => bytes.serialize(cursor),
        (TypeSpec::Boolean, CqlValue::Boolean(value)) => u8::from(*value).serialize(cursor),
        (TypeSpec::Decimal, CqlValue::Decimal(value)) => value.serialize(cursor),
        (TypeSpec::Double, CqlValue::Double(value)) => value.to_be_bytes().serialize(cursor),
        (TypeSpec::Float, CqlValue::Float(value)) => value.to_be_bytes().serialize(cursor),
        (TypeSpec::Int, CqlValue::Int(value)) => value.serialize(cursor),
        (TypeSpec::Uuid, CqlValue::Uuid(value) | CqlValue::Timeuuid(value)) => {
            value.as_bytes().serialize(cursor)
        }
        (TypeSpec::Timeuuid, CqlValue::Timeuuid(value) | CqlValue::Uuid(value)) => {
            if value.get_version_num() != 1 {
                return Err(Error::type_mismatch(type_spec, "non time-based uuid"));
            }

            value.as_bytes().serialize(cursor)
        }
        (TypeSpec::Varint, CqlValue::Varint(value)) => {
            value.to_signed_bytes_be().serialize(cursor)
        }
        (TypeSpec::Inet, CqlValue::Inet(value)) => match value {
            std::net::IpAddr::V4(ip) => ip.octets().serialize(cursor),
            std::net::IpAddr::V6(ip) => ip.octets().serialize(cursor),
        },
        (TypeSpec::Date, CqlValue::Date(value)) => value.serialize(cursor),
        (TypeSpec::Smallint, CqlValue::Smallint(value)) => value.serialize(cursor),
        (TypeSpec::Tinyint, CqlValue::Tinyint(value)) => value.serialize(cursor),
        (TypeSpec::Duration, CqlValue::Duration(value)) => value.serialize(cursor),
        (TypeSpec::List(elem_spec), CqlValue::List(values))
        | (TypeSpec::Set(elem_spec), CqlValue::Set(values) | CqlValue::List(values)) => {
            (values.len() as CInt).serialize(cursor);
            for value in values {
                write_element(value, elem_spec, cursor)?;
            }
        }
        (TypeSpec::Map(key_spec, value_spec), CqlValue::Map(entries)) => {
            (entries.len() as CInt).serialize(cursor);
            for (key, value) in entries {
                write_element(key, key_spec, cursor)?;
                write_element(value, value_spec, cursor)?;
            }
        }
        (TypeSpec::Tuple(elem_specs), CqlValue::Tuple(values)) => {
            if elem_specs.len() != values.len() {
                return Err(Error::type_mismatch(
                    type_spec,
                    format!("tuple of {} elements", values.len()),
                ));
            }

            for (value, spec) in values.iter().zip(elem_specs) {
                write_nullable_element(value.as_ref(), spec, cursor)?;
            }
        }
        (TypeSpec::Udt(udt), CqlValue::Udt { fields, .. }) => write_udt(udt, fields, cursor)?,
        (TypeSpec::Custom(_) | TypeSpec::Unknown(_), CqlValue::Opaque(bytes) | CqlValue::Blob(bytes)) => {
            bytes.serialize(cursor)
        }
        (_, CqlValue::Opaque(bytes)) => match type_spec.fixed_width() {
            Some(width) if width != bytes.len() => {
                return Err(Error::type_mismatch(
                    type_spec,
                    format!("{} raw bytes", bytes.len()),
                ));
            }
            _ => bytes.serialize(cursor),
        },
        _ => return Err(mismatch(type_spec, value)),
    }

    Ok(())
}

fn write_element(
    value: &CqlValue,
    spec: &TypeSpec,
    cursor: &mut Cursor<&mut Vec<u8>>,
) -> Result<()> {
    let mut element = vec![];
    write_value(value, spec, &mut Cursor::new(&mut element))?;
    CBytes::new(element).serialize(cursor);
    Ok(())
}

fn write_nullable_element(
    value: Option<&CqlValue>,
    spec: &TypeSpec,
    cursor: &mut Cursor<&mut Vec<u8>>,
) -> Result<()> {
    match value {
        Some(value) => write_element(value, spec, cursor),
        None => {
            CBytes::new_null().serialize(cursor);
            Ok(())
        }
    }
}

fn write_udt(
    udt: &UdtSpec,
    fields: &[(String, Option<CqlValue>)],
    cursor: &mut Cursor<&mut Vec<u8>>,
) -> Result<()> {
    if let Some((unknown, _)) = fields
        .iter()
        .find(|(name, _)| !udt.fields.iter().any(|(field, _)| field == name))
    {
        return Err(Error::type_mismatch(
            TypeSpec::Udt(udt.clone()),
            format!("unknown field '{unknown}'"),
        ));
    }

    // trailing fields absent from the value are omitted from the output
    let present = udt
        .fields
        .iter()
        .rposition(|(field, _)| fields.iter().any(|(name, _)| name == field))
        .map(|position| position + 1)
        .unwrap_or(0);

    for (field, spec) in &udt.fields[..present] {
        let value = fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_ref());

        write_nullable_element(value, spec, cursor)?;
    }

    Ok(())
}
