use bitflags::bitflags;
use derive_more::{Constructor, Display};
use std::convert::TryFrom;
use std::io::Cursor;

use crate::error;
use crate::frame::events::SchemaChange;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use crate::types::codec::encode_nullable;
use crate::types::rows::Row;
use crate::types::value::Value;
use crate::types::{
    from_cursor_str, serialize_str, CBytes, CBytesShort, CInt, CIntShort, CqlValue, TypeSpec,
};
use crate::Error;

/// `ResultKind` is enum which represents types of result.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Display)]
pub enum ResultKind {
    /// Void result.
    Void,
    /// Rows result.
    Rows,
    /// Set keyspace result.
    SetKeyspace,
    /// Prepared result.
    Prepared,
    /// Schema change result.
    SchemaChange,
}

impl Serialize for ResultKind {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        CInt::from(*self).serialize(cursor);
    }
}

impl FromCursor for ResultKind {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ResultKind> {
        CInt::from_cursor(cursor).and_then(ResultKind::try_from)
    }
}

impl TryFrom<CInt> for ResultKind {
    type Error = Error;

    fn try_from(value: CInt) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(ResultKind::Void),
            0x0002 => Ok(ResultKind::Rows),
            0x0003 => Ok(ResultKind::SetKeyspace),
            0x0004 => Ok(ResultKind::Prepared),
            0x0005 => Ok(ResultKind::SchemaChange),
            _ => Err(Error::UnexpectedResultKind(value)),
        }
    }
}

impl From<ResultKind> for CInt {
    fn from(value: ResultKind) -> Self {
        match value {
            ResultKind::Void => 0x0001,
            ResultKind::Rows => 0x0002,
            ResultKind::SetKeyspace => 0x0003,
            ResultKind::Prepared => 0x0004,
            ResultKind::SchemaChange => 0x0005,
        }
    }
}

/// `ResResultBody` represents all kinds of `RESULT` bodies. Each of enum
/// option wraps related body type.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResResultBody {
    /// Void response body.
    Void,
    /// Rows response body. It represents a body of response which contains rows.
    Rows(BodyResResultRows),
    /// Set keyspace body. It represents a body of set_keyspace query and usually contains
    /// a name of just set namespace.
    SetKeyspace(BodyResResultSetKeyspace),
    /// Prepared response body.
    Prepared(BodyResResultPrepared),
    /// Schema change body
    SchemaChange(SchemaChange),
}

impl ResResultBody {
    #[inline]
    pub fn kind(&self) -> ResultKind {
        match self {
            ResResultBody::Void => ResultKind::Void,
            ResResultBody::Rows(_) => ResultKind::Rows,
            ResResultBody::SetKeyspace(_) => ResultKind::SetKeyspace,
            ResResultBody::Prepared(_) => ResultKind::Prepared,
            ResResultBody::SchemaChange(_) => ResultKind::SchemaChange,
        }
    }

    /// Writes the body in the layout of the given protocol version.
    pub fn serialize_versioned(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        self.kind().serialize(cursor);

        match self {
            ResResultBody::Void => {}
            ResResultBody::Rows(rows) => rows.serialize(cursor),
            ResResultBody::SetKeyspace(set_keyspace) => set_keyspace.serialize(cursor),
            ResResultBody::Prepared(prepared) => prepared.serialize_versioned(cursor, version),
            ResResultBody::SchemaChange(schema_change) => schema_change.serialize(cursor),
        }
    }

    /// Parses a result body; prepared metadata layout depends on the protocol version.
    pub fn from_cursor_versioned(
        cursor: &mut Cursor<&[u8]>,
        version: Version,
    ) -> error::Result<ResResultBody> {
        match ResultKind::from_cursor(cursor)? {
            ResultKind::Void => Ok(ResResultBody::Void),
            ResultKind::Rows => BodyResResultRows::from_cursor(cursor).map(ResResultBody::Rows),
            ResultKind::SetKeyspace => {
                BodyResResultSetKeyspace::from_cursor(cursor).map(ResResultBody::SetKeyspace)
            }
            ResultKind::Prepared => BodyResResultPrepared::from_cursor_versioned(cursor, version)
                .map(ResResultBody::Prepared),
            ResultKind::SchemaChange => {
                SchemaChange::from_cursor(cursor).map(ResResultBody::SchemaChange)
            }
        }
    }

    /// Converts the body into rows, if it contains any.
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            ResResultBody::Rows(rows_body) => Some(Row::from_body(rows_body)),
            _ => None,
        }
    }

    pub fn as_rows_metadata(&self) -> Option<&RowsMetadata> {
        match self {
            ResResultBody::Rows(rows_body) => Some(&rows_body.metadata),
            _ => None,
        }
    }

    pub fn into_prepared(self) -> Option<BodyResResultPrepared> {
        match self {
            ResResultBody::Prepared(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_set_keyspace(self) -> Option<BodyResResultSetKeyspace> {
        match self {
            ResResultBody::SetKeyspace(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_schema_change(self) -> Option<SchemaChange> {
        match self {
            ResResultBody::SchemaChange(p) => Some(p),
            _ => None,
        }
    }
}

impl Serialize for ResResultBody {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.serialize_versioned(cursor, Version::default());
    }
}

impl Frame {
    pub fn new_res_result(version: Version, stream: StreamId, body: &ResResultBody) -> Frame {
        let mut bytes = vec![];
        body.serialize_versioned(&mut Cursor::new(&mut bytes), version);

        Frame::new_response(version, Opcode::Result, stream, bytes)
    }
}

/// It represents set keyspace result body. Body contains keyspace name.
#[derive(Debug, Constructor, PartialEq, Ord, PartialOrd, Eq, Clone, Hash)]
pub struct BodyResResultSetKeyspace {
    /// It contains name of keyspace that was set.
    pub body: String,
}

impl Serialize for BodyResResultSetKeyspace {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.body);
    }
}

impl FromCursor for BodyResResultSetKeyspace {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResResultSetKeyspace> {
        from_cursor_str(cursor).map(|x| BodyResResultSetKeyspace::new(x.to_string()))
    }
}

/// Structure that represents result of type
/// [rows](https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec#L533).
#[derive(Debug, PartialEq, Eq, Clone, Constructor)]
pub struct BodyResResultRows {
    /// Rows metadata
    pub metadata: RowsMetadata,
    /// Number of rows.
    pub rows_count: CInt,
    /// `rows_count` rows, each with one value per column.
    pub rows_content: Vec<Vec<CBytes>>,
}

impl BodyResResultRows {
    /// Encodes rows of native values with the types of the given columns.
    pub fn from_values(
        col_specs: Vec<ColSpec>,
        rows: Vec<Vec<Option<CqlValue>>>,
    ) -> error::Result<BodyResResultRows> {
        let rows_content = rows
            .iter()
            .map(|row| {
                if row.len() != col_specs.len() {
                    return Err(Error::General(format!(
                        "Expected {} values in a row, got {}",
                        col_specs.len(),
                        row.len()
                    )));
                }

                row.iter()
                    .zip(&col_specs)
                    .map(|(value, col_spec)| {
                        encode_nullable(value.as_ref(), &col_spec.col_type).map(|value| {
                            match value {
                                Value::Some(bytes) => CBytes::new(bytes),
                                _ => CBytes::new_null(),
                            }
                        })
                    })
                    .collect()
            })
            .collect::<error::Result<Vec<Vec<CBytes>>>>()?;

        Ok(BodyResResultRows::new(
            RowsMetadata::from_col_specs(col_specs),
            rows_content.len() as CInt,
            rows_content,
        ))
    }

    fn rows_content(
        cursor: &mut Cursor<&[u8]>,
        rows_count: i32,
        columns_count: i32,
    ) -> error::Result<Vec<Vec<CBytes>>> {
        let mut rows: Vec<Vec<CBytes>> = Vec::with_capacity(rows_count.max(0) as usize);
        for _ in 0..rows_count {
            let mut row = Vec::with_capacity(columns_count.max(0) as usize);
            for _ in 0..columns_count {
                row.push(CBytes::from_cursor(cursor)?);
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

impl Serialize for BodyResResultRows {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.metadata.serialize(cursor);
        self.rows_count.serialize(cursor);
        self.rows_content
            .iter()
            .flatten()
            .for_each(|x| x.serialize(cursor));
    }
}

impl FromCursor for BodyResResultRows {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResResultRows> {
        let metadata = RowsMetadata::from_cursor(cursor)?;
        let rows_count = CInt::from_cursor(cursor)?;
        let rows_content =
            BodyResResultRows::rows_content(cursor, rows_count, metadata.columns_count)?;

        Ok(BodyResResultRows::new(metadata, rows_count, rows_content))
    }
}

/// Rows metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowsMetadata {
    /// Flags.
    pub flags: RowsMetadataFlags,
    /// Number of columns.
    pub columns_count: CInt,
    /// Paging state.
    pub paging_state: Option<CBytes>,
    /// If `GLOBAL_TABLE_SPACE` flag is set, it contains the keyspace and table names shared by
    /// all columns.
    pub global_table_spec: Option<TableSpec>,
    /// List of column specifications.
    pub col_specs: Vec<ColSpec>,
}

impl RowsMetadata {
    /// Creates metadata for the given columns, with a global table spec when all columns come
    /// from the same table.
    pub fn from_col_specs(col_specs: Vec<ColSpec>) -> Self {
        let mut flags = RowsMetadataFlags::empty();
        let global_table_spec = match col_specs.first().and_then(|spec| spec.table_spec.clone()) {
            Some(first)
                if col_specs
                    .iter()
                    .all(|spec| spec.table_spec.as_ref() == Some(&first)) =>
            {
                flags.insert(RowsMetadataFlags::GLOBAL_TABLE_SPACE);
                Some(first)
            }
            _ => None,
        };

        RowsMetadata {
            flags,
            columns_count: col_specs.len() as CInt,
            paging_state: None,
            global_table_spec,
            col_specs,
        }
    }

    /// Returns the position and specification of a column.
    pub fn column(&self, name: &str) -> Option<(usize, &ColSpec)> {
        self.col_specs
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
    }
}

impl Serialize for RowsMetadata {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.flags.serialize(cursor);
        self.columns_count.serialize(cursor);

        if let Some(paging_state) = &self.paging_state {
            paging_state.serialize(cursor);
        }

        if self.flags.contains(RowsMetadataFlags::NO_METADATA) {
            return;
        }

        if let Some(global_table_spec) = &self.global_table_spec {
            global_table_spec.serialize(cursor);
        }

        let with_table_spec = self.global_table_spec.is_none();
        for col_spec in &self.col_specs {
            col_spec.serialize_with_table_spec(cursor, with_table_spec);
        }
    }
}

impl FromCursor for RowsMetadata {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<RowsMetadata> {
        let flags = RowsMetadataFlags::from_bits_truncate(CInt::from_cursor(cursor)?);
        let columns_count = CInt::from_cursor(cursor)?;

        let paging_state = if flags.contains(RowsMetadataFlags::HAS_MORE_PAGES) {
            Some(CBytes::from_cursor(cursor)?)
        } else {
            None
        };

        if flags.contains(RowsMetadataFlags::NO_METADATA) {
            return Ok(RowsMetadata {
                flags,
                columns_count,
                paging_state,
                global_table_spec: None,
                col_specs: vec![],
            });
        }

        let global_table_spec = if flags.contains(RowsMetadataFlags::GLOBAL_TABLE_SPACE) {
            Some(TableSpec::from_cursor(cursor)?)
        } else {
            None
        };

        let col_specs = ColSpec::parse_colspecs(cursor, columns_count, &global_table_spec)?;

        Ok(RowsMetadata {
            flags,
            columns_count,
            paging_state,
            global_table_spec,
            col_specs,
        })
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct RowsMetadataFlags: i32 {
        const GLOBAL_TABLE_SPACE = 0x0001;
        const HAS_MORE_PAGES = 0x0002;
        const NO_METADATA = 0x0004;
    }
}

impl Serialize for RowsMetadataFlags {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.bits().serialize(cursor)
    }
}

/// Table specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor)]
pub struct TableSpec {
    pub ks_name: String,
    pub table_name: String,
}

impl Serialize for TableSpec {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.ks_name);
        serialize_str(cursor, &self.table_name);
    }
}

impl FromCursor for TableSpec {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        let ks_name = from_cursor_str(cursor)?.to_string();
        let table_name = from_cursor_str(cursor)?.to_string();
        Ok(TableSpec::new(ks_name, table_name))
    }
}

/// Single column specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor)]
pub struct ColSpec {
    /// The initial `<ks_name>` and `<table_name>` are only present if the Global_tables_spec flag
    /// is NOT set
    pub table_spec: Option<TableSpec>,
    /// Column name
    pub name: String,
    /// Column type defined in spec in 4.2.5.2
    pub col_type: TypeSpec,
}

impl ColSpec {
    fn serialize_with_table_spec(&self, cursor: &mut Cursor<&mut Vec<u8>>, with_table_spec: bool) {
        if with_table_spec {
            match &self.table_spec {
                Some(table_spec) => table_spec.serialize(cursor),
                None => TableSpec::new(String::new(), String::new()).serialize(cursor),
            }
        }

        serialize_str(cursor, &self.name);
        self.col_type.serialize(cursor);
    }

    /// Reads `column_count` column specs, each carrying its own table spec unless a global one
    /// was present.
    pub fn parse_colspecs(
        cursor: &mut Cursor<&[u8]>,
        column_count: CInt,
        global_table_spec: &Option<TableSpec>,
    ) -> error::Result<Vec<ColSpec>> {
        let mut col_specs = Vec::with_capacity(column_count.max(0) as usize);
        for _ in 0..column_count {
            let table_spec = match global_table_spec {
                Some(global) => Some(global.clone()),
                None => Some(TableSpec::from_cursor(cursor)?),
            };

            let name = from_cursor_str(cursor)?.to_string();
            let col_type = TypeSpec::from_cursor(cursor)?;

            col_specs.push(ColSpec {
                table_spec,
                name,
                col_type,
            });
        }

        Ok(col_specs)
    }
}

/// Struct that represents prepared query result.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BodyResResultPrepared {
    /// id of prepared request
    pub id: CBytesShort,
    /// metadata
    pub metadata: PreparedMetadata,
    /// It is defined exactly the same as <metadata> in the Rows
    /// documentation.
    pub result_metadata: RowsMetadata,
}

impl BodyResResultPrepared {
    fn serialize_versioned(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        self.id.serialize(cursor);
        self.metadata.serialize_versioned(cursor, version);
        self.result_metadata.serialize(cursor);
    }

    fn from_cursor_versioned(
        cursor: &mut Cursor<&[u8]>,
        version: Version,
    ) -> error::Result<BodyResResultPrepared> {
        let id = CBytesShort::from_cursor(cursor)?;
        let metadata = PreparedMetadata::from_cursor_versioned(cursor, version)?;
        let result_metadata = RowsMetadata::from_cursor(cursor)?;

        Ok(BodyResResultPrepared {
            id,
            metadata,
            result_metadata,
        })
    }
}

/// Bind marker metadata of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreparedMetadata {
    /// Indexes of bind markers that form the partition key. Only sent by protocol v4.
    pub pk_indexes: Vec<i16>,
    pub global_table_spec: Option<TableSpec>,
    pub col_specs: Vec<ColSpec>,
}

impl PreparedMetadata {
    pub fn new(pk_indexes: Vec<i16>, col_specs: Vec<ColSpec>) -> Self {
        let RowsMetadata {
            global_table_spec,
            col_specs,
            ..
        } = RowsMetadata::from_col_specs(col_specs);

        PreparedMetadata {
            pk_indexes,
            global_table_spec,
            col_specs,
        }
    }

    fn serialize_versioned(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        let flags = if self.global_table_spec.is_some() {
            RowsMetadataFlags::GLOBAL_TABLE_SPACE
        } else {
            RowsMetadataFlags::empty()
        };

        flags.serialize(cursor);
        (self.col_specs.len() as CInt).serialize(cursor);

        if version >= Version::V4 {
            (self.pk_indexes.len() as CInt).serialize(cursor);
            for pk_index in &self.pk_indexes {
                pk_index.serialize(cursor);
            }
        }

        if let Some(global_table_spec) = &self.global_table_spec {
            global_table_spec.serialize(cursor);
        }

        let with_table_spec = self.global_table_spec.is_none();
        for col_spec in &self.col_specs {
            col_spec.serialize_with_table_spec(cursor, with_table_spec);
        }
    }

    fn from_cursor_versioned(
        cursor: &mut Cursor<&[u8]>,
        version: Version,
    ) -> error::Result<PreparedMetadata> {
        let flags = RowsMetadataFlags::from_bits_truncate(CInt::from_cursor(cursor)?);
        let columns_count = CInt::from_cursor(cursor)?;

        let pk_indexes = if version >= Version::V4 {
            let pk_count = CInt::from_cursor(cursor)?;
            let mut pk_indexes = Vec::with_capacity(pk_count.max(0) as usize);
            for _ in 0..pk_count {
                pk_indexes.push(CIntShort::from_cursor(cursor)?);
            }
            pk_indexes
        } else {
            vec![]
        };

        let global_table_spec = if flags.contains(RowsMetadataFlags::GLOBAL_TABLE_SPACE) {
            Some(TableSpec::from_cursor(cursor)?)
        } else {
            None
        };

        let col_specs = ColSpec::parse_colspecs(cursor, columns_count, &global_table_spec)?;

        Ok(PreparedMetadata {
            pk_indexes,
            global_table_spec,
            col_specs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::events::{SchemaChangeOptions, SchemaChangeTarget, SchemaChangeType};

    fn users_columns() -> Vec<ColSpec> {
        let table_spec = Some(TableSpec::new("ks".into(), "users".into()));
        vec![
            ColSpec::new(table_spec.clone(), "id".into(), TypeSpec::Int),
            ColSpec::new(
                table_spec,
                "tags".into(),
                TypeSpec::Set(Box::new(TypeSpec::Varchar)),
            ),
        ]
    }

    #[test]
    fn result_kind_codes() {
        assert_eq!(CInt::from(ResultKind::Prepared), 4);
        assert!(matches!(
            ResultKind::try_from(9),
            Err(Error::UnexpectedResultKind(9))
        ));
    }

    #[test]
    fn void_result() {
        let body = ResResultBody::Void;
        let bytes = body.serialize_to_vec();
        assert_eq!(bytes, vec![0, 0, 0, 1]);

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        assert_eq!(
            ResResultBody::from_cursor_versioned(&mut cursor, Version::V4).unwrap(),
            body
        );
    }

    #[test]
    fn rows_result_with_global_table_spec() {
        let metadata = RowsMetadata::from_col_specs(users_columns());
        assert!(metadata
            .flags
            .contains(RowsMetadataFlags::GLOBAL_TABLE_SPACE));

        let rows = BodyResResultRows::new(
            metadata,
            1,
            vec![vec![CBytes::new(vec![0, 0, 0, 7]), CBytes::new_null()]],
        );
        let body = ResResultBody::Rows(rows);
        let bytes = body.serialize_to_vec();

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        let decoded = ResResultBody::from_cursor_versioned(&mut cursor, Version::V4).unwrap();
        assert_eq!(decoded, body);
        assert_eq!(decoded.as_rows_metadata().unwrap().column("tags").unwrap().0, 1);
    }

    #[test]
    fn rows_from_values() {
        let rows = BodyResResultRows::from_values(
            users_columns(),
            vec![vec![Some(CqlValue::Int(7)), None]],
        )
        .unwrap();

        assert_eq!(rows.rows_count, 1);
        assert_eq!(
            rows.rows_content,
            vec![vec![CBytes::new(vec![0, 0, 0, 7]), CBytes::new_null()]]
        );

        assert!(BodyResResultRows::from_values(users_columns(), vec![vec![None]]).is_err());
    }

    #[test]
    fn rows_result_with_paging_state() {
        let mut metadata = RowsMetadata::from_col_specs(users_columns());
        metadata.flags.insert(RowsMetadataFlags::HAS_MORE_PAGES);
        metadata.paging_state = Some(CBytes::new(vec![9, 9]));

        let body = ResResultBody::Rows(BodyResResultRows::new(metadata, 0, vec![]));
        let bytes = body.serialize_to_vec();

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        assert_eq!(
            ResResultBody::from_cursor_versioned(&mut cursor, Version::V4).unwrap(),
            body
        );
    }

    #[test]
    fn prepared_result_depends_on_version() {
        let body = ResResultBody::Prepared(BodyResResultPrepared {
            id: CBytesShort::new(vec![1, 2]),
            metadata: PreparedMetadata::new(vec![0], users_columns()),
            result_metadata: RowsMetadata::from_col_specs(vec![]),
        });

        for version in [Version::V3, Version::V4] {
            let frame = Frame::new_res_result(version, 1, &body);
            let mut cursor: Cursor<&[u8]> = Cursor::new(&frame.body);
            let decoded = ResResultBody::from_cursor_versioned(&mut cursor, version)
                .unwrap()
                .into_prepared()
                .unwrap();

            assert_eq!(decoded.id, CBytesShort::new(vec![1, 2]));
            assert_eq!(decoded.metadata.col_specs, users_columns());
            match version {
                Version::V3 => assert!(decoded.metadata.pk_indexes.is_empty()),
                Version::V4 => assert_eq!(decoded.metadata.pk_indexes, vec![0]),
            }
        }
    }

    #[test]
    fn schema_change_result() {
        let body = ResResultBody::SchemaChange(SchemaChange {
            change_type: SchemaChangeType::Created,
            target: SchemaChangeTarget::Keyspace,
            options: SchemaChangeOptions::Keyspace("ks".into()),
        });
        let bytes = body.serialize_to_vec();

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        let change = ResResultBody::from_cursor_versioned(&mut cursor, Version::V4)
            .unwrap()
            .into_schema_change()
            .unwrap();
        assert_eq!(change.keyspace(), "ks");
    }
}
