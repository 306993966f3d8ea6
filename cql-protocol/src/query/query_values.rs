use std::collections::HashMap;
use std::hash::Hash;
use std::io::Cursor;

use crate::frame::Serialize;
use crate::types::value::Value;
use crate::types::serialize_str;

/// Enum that represents two types of query values:
/// * values without name
/// * values with names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValues {
    SimpleValues(Vec<Value>),
    NamedValues(HashMap<String, Value>),
}

impl QueryValues {
    /// Returns `true` if query values is with names and `false` otherwise.
    #[inline]
    pub fn has_names(&self) -> bool {
        !matches!(*self, QueryValues::SimpleValues(_))
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        match self {
            QueryValues::SimpleValues(v) => v.len(),
            QueryValues::NamedValues(m) => m.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Into<Value>> From<Vec<T>> for QueryValues {
    /// Converts values from `Vec` to query values without names `QueryValues::SimpleValues`.
    fn from(values: Vec<T>) -> QueryValues {
        QueryValues::SimpleValues(values.into_iter().map(Into::into).collect())
    }
}

impl<S: ToString + Hash + Eq, V: Into<Value>> From<HashMap<S, V>> for QueryValues {
    /// Converts values from `HashMap` to query values with names `QueryValues::NamedValues`.
    fn from(values: HashMap<S, V>) -> QueryValues {
        QueryValues::NamedValues(
            values
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.into()))
                .collect(),
        )
    }
}

impl Serialize for QueryValues {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            QueryValues::SimpleValues(v) => {
                for value in v {
                    value.serialize(cursor);
                }
            }
            QueryValues::NamedValues(v) => {
                for (key, value) in v {
                    serialize_str(cursor, key);
                    value.serialize(cursor);
                }
            }
        }
    }
}
