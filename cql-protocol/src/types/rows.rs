use std::sync::Arc;

use crate::error::{column_is_empty_err, Error, Result};
use crate::frame::message_result::{BodyResResultRows, ColSpec, RowsMetadata};
use crate::types::codec::decode_nullable;
use crate::types::{CBytes, CqlValue};

/// Single row of a `ROWS` result, decoding columns on access through the codec.
#[derive(Clone, Debug)]
pub struct Row {
    metadata: Arc<RowsMetadata>,
    row_content: Vec<CBytes>,
}

impl Row {
    pub fn from_body(body: BodyResResultRows) -> Vec<Row> {
        let metadata = Arc::new(body.metadata);
        body.rows_content
            .into_iter()
            .map(|row| Row {
                metadata: metadata.clone(),
                row_content: row,
            })
            .collect()
    }

    #[inline]
    pub fn metadata(&self) -> &RowsMetadata {
        &self.metadata
    }

    /// Number of columns in the row.
    #[inline]
    pub fn len(&self) -> usize {
        self.row_content.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_content.is_empty()
    }

    /// Checks if a column is present in the row.
    pub fn contains_column(&self, name: &str) -> bool {
        self.metadata.column(name).is_some()
    }

    /// Checks for NULL for a given column. Returns false if given column does not exist.
    pub fn is_null(&self, index: usize) -> bool {
        self.row_content
            .get(index)
            .map(CBytes::is_null)
            .unwrap_or(false)
    }

    /// Checks for NULL for a given column. Returns false if given column does not exist.
    pub fn is_null_by_name(&self, name: &str) -> bool {
        self.metadata
            .column(name)
            .map(|(index, _)| self.is_null(index))
            .unwrap_or(false)
    }

    /// Decodes the value at the given position; `None` for null.
    pub fn get_by_index(&self, index: usize) -> Result<Option<CqlValue>> {
        let col_spec = self
            .metadata
            .col_specs
            .get(index)
            .ok_or_else(|| Error::General(format!("Column index out of range: {index}")))?;

        decode_nullable(self.row_content.get(index), &col_spec.col_type)
    }

    /// Decodes the value of the named column; `None` for null.
    pub fn get_by_name(&self, name: &str) -> Result<Option<CqlValue>> {
        let (index, col_spec) = self.col_spec_by_name(name)?;
        decode_nullable(self.row_content.get(index), &col_spec.col_type)
    }

    /// Decodes the value of the named column, failing for null.
    pub fn get_required(&self, name: &str) -> Result<CqlValue> {
        self.get_by_name(name)?
            .ok_or_else(|| column_is_empty_err(name))
    }

    fn col_spec_by_name(&self, name: &str) -> Result<(usize, &ColSpec)> {
        self.metadata
            .column(name)
            .ok_or_else(|| Error::General(format!("Column not found: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::message_result::TableSpec;
    use crate::types::TypeSpec;

    fn rows() -> Vec<Row> {
        let table_spec = Some(TableSpec::new("ks".into(), "t".into()));
        let metadata = RowsMetadata::from_col_specs(vec![
            ColSpec::new(table_spec.clone(), "id".into(), TypeSpec::Int),
            ColSpec::new(
                table_spec,
                "names".into(),
                TypeSpec::List(Box::new(TypeSpec::Varchar)),
            ),
        ]);

        Row::from_body(BodyResResultRows::new(
            metadata,
            2,
            vec![
                vec![
                    CBytes::new(vec![0, 0, 0, 1]),
                    CBytes::new(vec![0, 0, 0, 1, 0, 0, 0, 1, b'a']),
                ],
                vec![CBytes::new(vec![0, 0, 0, 2]), CBytes::new_null()],
            ],
        ))
    }

    #[test]
    fn by_name_and_index() {
        let rows = rows();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.get_by_index(0).unwrap(), Some(CqlValue::Int(1)));
        assert_eq!(
            first.get_by_name("names").unwrap(),
            Some(CqlValue::List(vec![CqlValue::Text("a".into())]))
        );
        assert!(first.contains_column("id"));
        assert!(!first.contains_column("missing"));
    }

    #[test]
    fn null_columns() {
        let rows = rows();
        let second = &rows[1];

        assert!(second.is_null_by_name("names"));
        assert_eq!(second.get_by_name("names").unwrap(), None);
        assert!(second.get_required("names").is_err());
        assert!(second.get_by_name("missing").is_err());
        assert!(second.get_by_index(5).is_err());
    }
}
