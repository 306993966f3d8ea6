use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::frame::message_result::{BodyResResultPrepared, ColSpec};
use crate::query::QueryValues;
use crate::types::codec::encode_nullable;
use crate::types::{CBytesShort, CqlValue};

/// A statement prepared on the cluster, together with its bind marker metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub id: CBytesShort,
    pub query: String,
    pub keyspace: Option<String>,
    pub pk_indexes: Vec<i16>,
    pub bind_specs: Vec<ColSpec>,
}

impl PreparedQuery {
    pub fn new(query: String, prepared: BodyResResultPrepared) -> Self {
        let keyspace = prepared
            .metadata
            .global_table_spec
            .as_ref()
            .or_else(|| {
                prepared
                    .metadata
                    .col_specs
                    .first()
                    .and_then(|spec| spec.table_spec.as_ref())
            })
            .map(|table_spec| table_spec.ks_name.clone());

        PreparedQuery {
            id: prepared.id,
            query,
            keyspace,
            pk_indexes: prepared.metadata.pk_indexes,
            bind_specs: prepared.metadata.col_specs,
        }
    }

    /// Encodes values for the bind markers of this statement, validating each against its
    /// declared type. `None` binds null.
    pub fn bind(&self, values: &[Option<CqlValue>]) -> Result<QueryValues> {
        if values.len() != self.bind_specs.len() {
            return Err(Error::type_mismatch(
                format!("{} bind values", self.bind_specs.len()),
                format!("{} values", values.len()),
            ));
        }

        values
            .iter()
            .zip(&self.bind_specs)
            .map(|(value, spec)| encode_nullable(value.as_ref(), &spec.col_type))
            .collect::<Result<Vec<_>>>()
            .map(QueryValues::SimpleValues)
    }
}

impl Hash for PreparedQuery {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::message_result::{PreparedMetadata, RowsMetadata, TableSpec};
    use crate::types::value::Value;
    use crate::types::TypeSpec;

    fn prepared() -> PreparedQuery {
        let table_spec = Some(TableSpec::new("ks".into(), "t".into()));
        PreparedQuery::new(
            "INSERT INTO t (k, v) VALUES (?, ?)".into(),
            BodyResResultPrepared {
                id: CBytesShort::new(vec![1]),
                metadata: PreparedMetadata::new(
                    vec![0],
                    vec![
                        ColSpec::new(table_spec.clone(), "k".into(), TypeSpec::Int),
                        ColSpec::new(table_spec, "v".into(), TypeSpec::Varchar),
                    ],
                ),
                result_metadata: RowsMetadata::from_col_specs(vec![]),
            },
        )
    }

    #[test]
    fn keyspace_from_metadata() {
        assert_eq!(prepared().keyspace.as_deref(), Some("ks"));
    }

    #[test]
    fn bind_validates_types() {
        let prepared = prepared();

        let values = prepared
            .bind(&[Some(CqlValue::Int(1)), None])
            .unwrap();
        assert_eq!(
            values,
            QueryValues::SimpleValues(vec![Value::new(1i32), Value::Null])
        );

        assert!(matches!(
            prepared.bind(&[Some(CqlValue::Text("x".into())), None]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(prepared.bind(&[None]).is_err());
    }
}
