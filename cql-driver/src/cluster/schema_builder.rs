use fxhash::FxHashMap;
use std::collections::HashMap;
use tracing::*;

use crate::cluster::topology::{
    ColumnKind, ColumnMetadata, KeyspaceMetadata, ReplicationStrategy, TableMetadata,
};
use crate::error::{Error, Result};
use crate::types::rows::Row;
use crate::types::type_spec::UdtSpec;
use crate::types::TypeSpec;

pub(crate) const KEYSPACES_TABLE: &str = "system_schema.keyspaces";
pub(crate) const TABLES_TABLE: &str = "system_schema.tables";
pub(crate) const COLUMNS_TABLE: &str = "system_schema.columns";
pub(crate) const TYPES_TABLE: &str = "system_schema.types";

/// Rows read from the schema tables, possibly limited to a single keyspace.
#[derive(Default, Debug)]
pub(crate) struct SchemaRows {
    pub keyspaces: Vec<Row>,
    pub tables: Vec<Row>,
    pub columns: Vec<Row>,
    pub types: Vec<Row>,
}

fn text(row: &Row, name: &str) -> Result<String> {
    row.get_required(name)?
        .into_text()
        .ok_or_else(|| Error::General(format!("Column {name} is not text!")))
}

fn text_list(row: &Row, name: &str) -> Result<Vec<String>> {
    let Some(value) = row.get_by_name(name)? else {
        return Ok(vec![]);
    };

    value
        .as_collection()
        .ok_or_else(|| Error::General(format!("Column {name} is not a collection!")))?
        .iter()
        .map(|element| {
            element
                .as_text()
                .map(str::to_string)
                .ok_or_else(|| Error::General(format!("Column {name} contains non-text values!")))
        })
        .collect()
}

fn text_map(row: &Row, name: &str) -> Result<FxHashMap<String, String>> {
    let Some(value) = row.get_by_name(name)? else {
        return Ok(Default::default());
    };

    value
        .as_map()
        .ok_or_else(|| Error::General(format!("Column {name} is not a map!")))?
        .iter()
        .map(|(key, value)| match (key.as_text(), value.as_text()) {
            (Some(key), Some(value)) => Ok((key.to_string(), value.to_string())),
            _ => Err(Error::General(format!(
                "Column {name} contains non-text entries!"
            ))),
        })
        .collect()
}

fn replication_factor(value: &str) -> Option<usize> {
    // transient replication is written as "<all>/<transient>"
    value.split('/').next()?.trim().parse().ok()
}

/// Parses the `replication` map of `system_schema.keyspaces`.
pub(crate) fn parse_replication_strategy(
    mut options: FxHashMap<String, String>,
) -> ReplicationStrategy {
    let class = options.remove("class").unwrap_or_default();
    let short_class = class.rsplit('.').next().unwrap_or_default();

    match short_class {
        "SimpleStrategy" => {
            if let Some(replication_factor) = options
                .get("replication_factor")
                .and_then(|value| replication_factor(value))
            {
                return ReplicationStrategy::SimpleStrategy { replication_factor };
            }
        }
        "NetworkTopologyStrategy" => {
            let datacenter_replication_factor: Option<FxHashMap<_, _>> = options
                .iter()
                .map(|(datacenter, value)| {
                    replication_factor(value).map(|factor| (datacenter.clone(), factor))
                })
                .collect();

            if let Some(datacenter_replication_factor) = datacenter_replication_factor {
                return ReplicationStrategy::NetworkTopologyStrategy {
                    datacenter_replication_factor,
                };
            }
        }
        _ => {}
    }

    ReplicationStrategy::Other { class, options }
}

fn keyspace_of(row: &Row) -> Result<String> {
    text(row, "keyspace_name")
}

fn type_dependencies<'a>(field_types: &'a [String]) -> impl Iterator<Item = &'a str> {
    field_types.iter().flat_map(|field_type| {
        field_type
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|name| !name.is_empty())
    })
}

/// Parses user types of a single keyspace. Types can reference other types, so they are parsed
/// after all their dependencies.
fn build_user_types(keyspace: &str, rows: &[&Row]) -> Result<HashMap<String, UdtSpec>> {
    let mut pending = rows
        .iter()
        .map(|row| {
            Ok((
                text(row, "type_name")?,
                text_list(row, "field_names")?,
                text_list(row, "field_types")?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut user_types = HashMap::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|(name, _, field_types)| {
                type_dependencies(field_types).all(|dependency| {
                    dependency == name
                        || !pending.iter().any(|(pending_name, _, _)| pending_name == dependency)
                })
            })
            // a dependency cycle cannot be created by the server, but don't loop forever
            .unwrap_or(0);

        let (name, field_names, field_types) = pending.swap_remove(ready);
        if field_names.len() != field_types.len() {
            return Err(Error::General(format!(
                "Type {keyspace}.{name} has {} field names, but {} field types!",
                field_names.len(),
                field_types.len()
            )));
        }

        let fields = field_names
            .into_iter()
            .zip(field_types.iter())
            .map(|(field_name, field_type)| {
                TypeSpec::parse(field_type, keyspace, &user_types).map(|spec| (field_name, spec))
            })
            .collect::<Result<Vec<_>>>()?;

        user_types.insert(
            name.clone(),
            UdtSpec::new(keyspace.to_string(), name, fields),
        );
    }

    Ok(user_types)
}

fn build_columns(
    keyspace: &str,
    rows: &[&Row],
    user_types: &HashMap<String, UdtSpec>,
) -> Result<FxHashMap<String, ColumnMetadata>> {
    rows.iter()
        .map(|row| {
            let name = text(row, "column_name")?;
            let kind = text(row, "kind")?;
            let kind = ColumnKind::parse(&kind).unwrap_or_else(|| {
                warn!(%kind, column = %name, "Unknown column kind.");
                ColumnKind::Regular
            });

            let position = row
                .get_by_name("position")
                .ok()
                .flatten()
                .and_then(|position| position.as_int())
                .unwrap_or(-1);

            let type_spec = TypeSpec::parse(&text(row, "type")?, keyspace, user_types)?;

            Ok((name.clone(), ColumnMetadata::new(name, kind, position, type_spec)))
        })
        .collect()
}

/// Builds keyspace metadata from schema table rows. Tables, columns and types of keyspaces which
/// are not present in `keyspaces` rows are skipped.
pub(crate) fn build_keyspaces(rows: &SchemaRows) -> Result<FxHashMap<String, KeyspaceMetadata>> {
    let mut tables_by_keyspace: FxHashMap<String, Vec<&Row>> = Default::default();
    for row in &rows.tables {
        tables_by_keyspace.entry(keyspace_of(row)?).or_default().push(row);
    }

    let mut columns_by_table: FxHashMap<(String, String), Vec<&Row>> = Default::default();
    for row in &rows.columns {
        columns_by_table
            .entry((keyspace_of(row)?, text(row, "table_name")?))
            .or_default()
            .push(row);
    }

    let mut types_by_keyspace: FxHashMap<String, Vec<&Row>> = Default::default();
    for row in &rows.types {
        types_by_keyspace.entry(keyspace_of(row)?).or_default().push(row);
    }

    let mut keyspaces = FxHashMap::default();
    for row in &rows.keyspaces {
        let name = keyspace_of(row)?;
        let durable_writes = row
            .get_by_name("durable_writes")
            .ok()
            .flatten()
            .and_then(|value| value.as_boolean())
            .unwrap_or(true);
        let replication_strategy = parse_replication_strategy(text_map(row, "replication")?);

        let user_types = build_user_types(
            &name,
            types_by_keyspace
                .get(&name)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        )?;

        let mut tables = FxHashMap::default();
        for table_row in tables_by_keyspace.get(&name).into_iter().flatten() {
            let table_name = text(table_row, "table_name")?;
            let columns = build_columns(
                &name,
                columns_by_table
                    .get(&(name.clone(), table_name.clone()))
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
                &user_types,
            )?;

            tables.insert(table_name.clone(), TableMetadata::new(table_name, columns));
        }

        debug!(keyspace = %name, tables = tables.len(), "Parsed keyspace metadata.");

        keyspaces.insert(
            name.clone(),
            KeyspaceMetadata::new(name, durable_writes, replication_strategy, tables, user_types),
        );
    }

    Ok(keyspaces)
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;
    use maplit::hashmap;

    use crate::cluster::schema_builder::{
        build_keyspaces, parse_replication_strategy, SchemaRows,
    };
    use crate::cluster::topology::{ColumnKind, ReplicationStrategy};
    use crate::frame::message_result::{BodyResResultRows, ColSpec};
    use crate::types::rows::Row;
    use crate::types::{CqlValue, TypeSpec};

    fn text(value: &str) -> Option<CqlValue> {
        Some(CqlValue::Text(value.into()))
    }

    fn text_list(values: &[&str]) -> Option<CqlValue> {
        Some(CqlValue::List(
            values.iter().map(|value| CqlValue::Text((*value).into())).collect(),
        ))
    }

    fn rows(columns: &[(&str, TypeSpec)], values: Vec<Vec<Option<CqlValue>>>) -> Vec<Row> {
        let col_specs = columns
            .iter()
            .map(|(name, type_spec)| ColSpec::new(None, (*name).into(), type_spec.clone()))
            .collect();

        Row::from_body(BodyResResultRows::from_values(col_specs, values).unwrap())
    }

    fn options(entries: &[(&str, &str)]) -> FxHashMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).into(), (*value).into()))
            .collect()
    }

    #[test]
    fn should_parse_replication_strategies() {
        assert_eq!(
            parse_replication_strategy(options(&[
                ("class", "org.apache.cassandra.locator.SimpleStrategy"),
                ("replication_factor", "3"),
            ])),
            ReplicationStrategy::SimpleStrategy {
                replication_factor: 3
            }
        );

        let datacenter_replication_factor = hashmap! {
            "dc1".to_string() => 3,
            "dc2".to_string() => 2,
        };
        assert_eq!(
            parse_replication_strategy(options(&[
                ("class", "org.apache.cassandra.locator.NetworkTopologyStrategy"),
                ("dc1", "3"),
                ("dc2", "2/1"),
            ])),
            ReplicationStrategy::NetworkTopologyStrategy {
                datacenter_replication_factor: datacenter_replication_factor
                    .into_iter()
                    .collect(),
            }
        );

        assert_eq!(
            parse_replication_strategy(options(&[("class", "LocalStrategy")])),
            ReplicationStrategy::Other {
                class: "LocalStrategy".into(),
                options: Default::default(),
            }
        );
    }

    #[test]
    fn should_build_keyspace_with_tables_and_types() {
        let replication_type =
            TypeSpec::Map(Box::new(TypeSpec::Varchar), Box::new(TypeSpec::Varchar));
        let keyspaces = rows(
            &[
                ("keyspace_name", TypeSpec::Varchar),
                ("durable_writes", TypeSpec::Boolean),
                ("replication", replication_type),
            ],
            vec![vec![
                text("ks"),
                Some(CqlValue::Boolean(true)),
                Some(CqlValue::Map(vec![
                    (
                        CqlValue::Text("class".into()),
                        CqlValue::Text("org.apache.cassandra.locator.SimpleStrategy".into()),
                    ),
                    (
                        CqlValue::Text("replication_factor".into()),
                        CqlValue::Text("1".into()),
                    ),
                ])),
            ]],
        );

        let tables = rows(
            &[
                ("keyspace_name", TypeSpec::Varchar),
                ("table_name", TypeSpec::Varchar),
            ],
            vec![vec![text("ks"), text("users")], vec![text("other"), text("t")]],
        );

        let columns = rows(
            &[
                ("keyspace_name", TypeSpec::Varchar),
                ("table_name", TypeSpec::Varchar),
                ("column_name", TypeSpec::Varchar),
                ("kind", TypeSpec::Varchar),
                ("position", TypeSpec::Int),
                ("type", TypeSpec::Varchar),
            ],
            vec![
                vec![
                    text("ks"),
                    text("users"),
                    text("id"),
                    text("partition_key"),
                    Some(CqlValue::Int(0)),
                    text("uuid"),
                ],
                vec![
                    text("ks"),
                    text("users"),
                    text("address"),
                    text("regular"),
                    Some(CqlValue::Int(-1)),
                    text("frozen<address>"),
                ],
            ],
        );

        // "address" depends on "street", which comes later
        let types = rows(
            &[
                ("keyspace_name", TypeSpec::Varchar),
                ("type_name", TypeSpec::Varchar),
                ("field_names", TypeSpec::List(Box::new(TypeSpec::Varchar))),
                ("field_types", TypeSpec::List(Box::new(TypeSpec::Varchar))),
            ],
            vec![
                vec![
                    text("ks"),
                    text("address"),
                    text_list(&["street", "zip"]),
                    text_list(&["frozen<street>", "int"]),
                ],
                vec![
                    text("ks"),
                    text("street"),
                    text_list(&["name"]),
                    text_list(&["text"]),
                ],
            ],
        );

        let keyspaces = build_keyspaces(&SchemaRows {
            keyspaces,
            tables,
            columns,
            types,
        })
        .unwrap();

        assert_eq!(keyspaces.len(), 1);

        let keyspace = keyspaces.get("ks").unwrap();
        assert!(keyspace.durable_writes);
        assert_eq!(
            keyspace.replication_strategy,
            ReplicationStrategy::SimpleStrategy {
                replication_factor: 1
            }
        );

        let address = keyspace.user_type("address").unwrap();
        match &address.fields[0].1 {
            TypeSpec::Udt(street) => {
                assert_eq!(street.name, "street");
                assert_eq!(street.fields, vec![("name".to_string(), TypeSpec::Varchar)]);
            }
            spec => panic!("Unexpected field type: {spec}"),
        }

        let users = keyspace.table("users").unwrap();
        assert_eq!(users.partition_key, vec!["id"]);
        assert_eq!(users.column("id").unwrap().type_spec, TypeSpec::Uuid);
        assert_eq!(users.column("address").unwrap().kind, ColumnKind::Regular);
        assert!(matches!(
            &users.column("address").unwrap().type_spec,
            TypeSpec::Udt(udt) if udt.fields.len() == 2
        ));
    }
}
