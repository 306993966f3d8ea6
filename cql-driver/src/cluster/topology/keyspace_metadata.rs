use derive_more::{Constructor, Display};
use fxhash::FxHashMap;
use std::collections::HashMap;

use crate::cluster::topology::ReplicationStrategy;
use crate::types::type_spec::UdtSpec;
use crate::types::TypeSpec;

/// Keyspace metadata, as read from the schema tables.
#[derive(Clone, Debug, Constructor, PartialEq)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub durable_writes: bool,
    pub replication_strategy: ReplicationStrategy,
    pub tables: FxHashMap<String, TableMetadata>,
    /// User defined types, by name.
    pub user_types: HashMap<String, UdtSpec>,
}

impl KeyspaceMetadata {
    #[inline]
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.get(name)
    }

    #[inline]
    pub fn user_type(&self, name: &str) -> Option<&UdtSpec> {
        self.user_types.get(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableMetadata {
    pub name: String,
    pub columns: FxHashMap<String, ColumnMetadata>,
    /// Partition key column names, in key order.
    pub partition_key: Vec<String>,
    /// Clustering column names, in key order.
    pub clustering_key: Vec<String>,
}

impl TableMetadata {
    /// Creates table metadata, deriving key order from column positions.
    pub fn new(name: String, columns: FxHashMap<String, ColumnMetadata>) -> Self {
        let key_columns = |kind: ColumnKind| {
            let mut key: Vec<_> = columns
                .values()
                .filter(|column| column.kind == kind)
                .collect();
            key.sort_by_key(|column| column.position);
            key.into_iter()
                .map(|column| column.name.clone())
                .collect::<Vec<_>>()
        };

        let partition_key = key_columns(ColumnKind::PartitionKey);
        let clustering_key = key_columns(ColumnKind::Clustering);

        TableMetadata {
            name,
            columns,
            partition_key,
            clustering_key,
        }
    }

    #[inline]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.get(name)
    }
}

#[derive(Clone, Debug, Constructor, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: ColumnKind,
    /// Position within the partition or clustering key; `-1` for other columns.
    pub position: i32,
    pub type_spec: TypeSpec,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ColumnKind {
    #[display("partition_key")]
    PartitionKey,
    #[display("clustering")]
    Clustering,
    #[display("regular")]
    Regular,
    #[display("static")]
    Static,
}

impl ColumnKind {
    /// Parses the `kind` column of `system_schema.columns`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "partition_key" => Some(ColumnKind::PartitionKey),
            "clustering" => Some(ColumnKind::Clustering),
            "regular" => Some(ColumnKind::Regular),
            "static" => Some(ColumnKind::Static),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;

    use crate::cluster::topology::{ColumnKind, ColumnMetadata, TableMetadata};
    use crate::types::TypeSpec;

    #[test]
    fn should_order_key_columns() {
        let columns: FxHashMap<_, _> = [
            ColumnMetadata::new("b".into(), ColumnKind::PartitionKey, 1, TypeSpec::Int),
            ColumnMetadata::new("a".into(), ColumnKind::PartitionKey, 0, TypeSpec::Int),
            ColumnMetadata::new("c".into(), ColumnKind::Clustering, 0, TypeSpec::Varchar),
            ColumnMetadata::new("v".into(), ColumnKind::Regular, -1, TypeSpec::Blob),
        ]
        .into_iter()
        .map(|column| (column.name.clone(), column))
        .collect();

        let table = TableMetadata::new("t".into(), columns);
        assert_eq!(table.partition_key, vec!["a", "b"]);
        assert_eq!(table.clustering_key, vec!["c"]);
        assert_eq!(table.column("v").unwrap().kind, ColumnKind::Regular);
    }
}
