use derive_more::Display;
use std::convert::TryFrom;
use std::io::Cursor;

use crate::error;
use crate::frame::traits::FromCursor;
use crate::frame::Serialize;
use crate::types::{
    from_cursor_str, from_cursor_string_list, serialize_str, serialize_str_list, CInet,
};
use crate::Error;

// Event types
const TOPOLOGY_CHANGE: &str = "TOPOLOGY_CHANGE";
const STATUS_CHANGE: &str = "STATUS_CHANGE";
const SCHEMA_CHANGE: &str = "SCHEMA_CHANGE";

// Topology changes
const NEW_NODE: &str = "NEW_NODE";
const REMOVED_NODE: &str = "REMOVED_NODE";

// Status changes
const UP: &str = "UP";
const DOWN: &str = "DOWN";

// Schema changes
const CREATED: &str = "CREATED";
const UPDATED: &str = "UPDATED";
const DROPPED: &str = "DROPPED";

// Schema change targets
const KEYSPACE: &str = "KEYSPACE";
const TABLE: &str = "TABLE";
const TYPE: &str = "TYPE";
const FUNCTION: &str = "FUNCTION";
const AGGREGATE: &str = "AGGREGATE";

/// Simplified `ServerEvent` that does not contain details about a concrete change. Used when
/// registering for events.
#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum SimpleServerEvent {
    #[display("TOPOLOGY_CHANGE")]
    TopologyChange,
    #[display("STATUS_CHANGE")]
    StatusChange,
    #[display("SCHEMA_CHANGE")]
    SchemaChange,
}

impl SimpleServerEvent {
    pub fn as_str(&self) -> &'static str {
        match *self {
            SimpleServerEvent::TopologyChange => TOPOLOGY_CHANGE,
            SimpleServerEvent::StatusChange => STATUS_CHANGE,
            SimpleServerEvent::SchemaChange => SCHEMA_CHANGE,
        }
    }
}

impl From<&ServerEvent> for SimpleServerEvent {
    fn from(event: &ServerEvent) -> SimpleServerEvent {
        match event {
            ServerEvent::TopologyChange(_) => SimpleServerEvent::TopologyChange,
            ServerEvent::StatusChange(_) => SimpleServerEvent::StatusChange,
            ServerEvent::SchemaChange(_) => SimpleServerEvent::SchemaChange,
        }
    }
}

impl TryFrom<&str> for SimpleServerEvent {
    type Error = error::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            TOPOLOGY_CHANGE => Ok(SimpleServerEvent::TopologyChange),
            STATUS_CHANGE => Ok(SimpleServerEvent::StatusChange),
            SCHEMA_CHANGE => Ok(SimpleServerEvent::SchemaChange),
            _ => Err(Error::UnknownServerEvent(value.into())),
        }
    }
}

impl PartialEq<ServerEvent> for SimpleServerEvent {
    fn eq(&self, full_event: &ServerEvent) -> bool {
        self == &SimpleServerEvent::from(full_event)
    }
}

/// Full server event that contains all details about a concrete change.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum ServerEvent {
    /// Events related to change in the cluster topology
    TopologyChange(TopologyChange),
    /// Events related to change of node status.
    StatusChange(StatusChange),
    /// Events related to schema change.
    SchemaChange(SchemaChange),
}

impl Serialize for ServerEvent {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            ServerEvent::TopologyChange(t) => {
                serialize_str(cursor, TOPOLOGY_CHANGE);
                t.serialize(cursor);
            }
            ServerEvent::StatusChange(s) => {
                serialize_str(cursor, STATUS_CHANGE);
                s.serialize(cursor);
            }
            ServerEvent::SchemaChange(s) => {
                serialize_str(cursor, SCHEMA_CHANGE);
                s.serialize(cursor);
            }
        }
    }
}

impl PartialEq<SimpleServerEvent> for ServerEvent {
    fn eq(&self, event: &SimpleServerEvent) -> bool {
        &SimpleServerEvent::from(self) == event
    }
}

impl FromCursor for ServerEvent {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ServerEvent> {
        let event_type = from_cursor_str(cursor)?;
        match event_type {
            TOPOLOGY_CHANGE => TopologyChange::from_cursor(cursor).map(ServerEvent::TopologyChange),
            STATUS_CHANGE => StatusChange::from_cursor(cursor).map(ServerEvent::StatusChange),
            SCHEMA_CHANGE => SchemaChange::from_cursor(cursor).map(ServerEvent::SchemaChange),
            _ => Err(Error::UnknownServerEvent(event_type.into())),
        }
    }
}

/// Events related to change in the cluster topology
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopologyChange {
    pub change_type: TopologyChangeType,
    pub addr: CInet,
}

impl Serialize for TopologyChange {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.change_type.serialize(cursor);
        self.addr.serialize(cursor);
    }
}

impl FromCursor for TopologyChange {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<TopologyChange> {
        let change_type = TopologyChangeType::from_cursor(cursor)?;
        let addr = CInet::from_cursor(cursor)?;

        Ok(TopologyChange { change_type, addr })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Ord, PartialOrd, Eq, Hash, Display)]
pub enum TopologyChangeType {
    NewNode,
    RemovedNode,
}

impl Serialize for TopologyChangeType {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            TopologyChangeType::NewNode => serialize_str(cursor, NEW_NODE),
            TopologyChangeType::RemovedNode => serialize_str(cursor, REMOVED_NODE),
        }
    }
}

impl FromCursor for TopologyChangeType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<TopologyChangeType> {
        match from_cursor_str(cursor)? {
            NEW_NODE => Ok(TopologyChangeType::NewNode),
            REMOVED_NODE => Ok(TopologyChangeType::RemovedNode),
            tc => Err(format!("Unexpected topology change type received from Cluster: {tc}").into()),
        }
    }
}

/// Events related to change of node status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusChange {
    pub change_type: StatusChangeType,
    pub addr: CInet,
}

impl Serialize for StatusChange {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.change_type.serialize(cursor);
        self.addr.serialize(cursor);
    }
}

impl FromCursor for StatusChange {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<StatusChange> {
        let change_type = StatusChangeType::from_cursor(cursor)?;
        let addr = CInet::from_cursor(cursor)?;

        Ok(StatusChange { change_type, addr })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum StatusChangeType {
    Up,
    Down,
}

impl Serialize for StatusChangeType {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            StatusChangeType::Up => serialize_str(cursor, UP),
            StatusChangeType::Down => serialize_str(cursor, DOWN),
        }
    }
}

impl FromCursor for StatusChangeType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<StatusChangeType> {
        match from_cursor_str(cursor)? {
            UP => Ok(StatusChangeType::Up),
            DOWN => Ok(StatusChangeType::Down),
            sct => Err(format!("Unexpected status change type: {sct}").into()),
        }
    }
}

/// Events related to schema change. Also the body of a `SCHEMA_CHANGE` result.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct SchemaChange {
    pub change_type: SchemaChangeType,
    pub target: SchemaChangeTarget,
    pub options: SchemaChangeOptions,
}

impl SchemaChange {
    /// Keyspace affected by the change, whatever the target.
    pub fn keyspace(&self) -> &str {
        match &self.options {
            SchemaChangeOptions::Keyspace(keyspace) => keyspace,
            SchemaChangeOptions::TableType(keyspace, _) => keyspace,
            SchemaChangeOptions::FunctionAggregate(keyspace, _, _) => keyspace,
        }
    }

    /// Checks if a whole keyspace has been dropped.
    #[inline]
    pub fn is_keyspace_dropped(&self) -> bool {
        self.change_type == SchemaChangeType::Dropped
            && self.target == SchemaChangeTarget::Keyspace
    }
}

impl Serialize for SchemaChange {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.change_type.serialize(cursor);
        self.target.serialize(cursor);
        self.options.serialize(cursor);
    }
}

impl FromCursor for SchemaChange {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<SchemaChange> {
        let change_type = SchemaChangeType::from_cursor(cursor)?;
        let target = SchemaChangeTarget::from_cursor(cursor)?;
        let options = SchemaChangeOptions::from_cursor_and_target(cursor, target)?;

        Ok(SchemaChange {
            change_type,
            target,
            options,
        })
    }
}

/// Represents type of changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum SchemaChangeType {
    Created,
    Updated,
    Dropped,
}

impl Serialize for SchemaChangeType {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            SchemaChangeType::Created => serialize_str(cursor, CREATED),
            SchemaChangeType::Updated => serialize_str(cursor, UPDATED),
            SchemaChangeType::Dropped => serialize_str(cursor, DROPPED),
        }
    }
}

impl FromCursor for SchemaChangeType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<SchemaChangeType> {
        match from_cursor_str(cursor)? {
            CREATED => Ok(SchemaChangeType::Created),
            UPDATED => Ok(SchemaChangeType::Updated),
            DROPPED => Ok(SchemaChangeType::Dropped),
            ct => Err(format!("Unexpected schema change type: {ct}").into()),
        }
    }
}

/// Refers to a target of changes were made.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum SchemaChangeTarget {
    Keyspace,
    Table,
    Type,
    Function,
    Aggregate,
}

impl Serialize for SchemaChangeTarget {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            SchemaChangeTarget::Keyspace => serialize_str(cursor, KEYSPACE),
            SchemaChangeTarget::Table => serialize_str(cursor, TABLE),
            SchemaChangeTarget::Type => serialize_str(cursor, TYPE),
            SchemaChangeTarget::Function => serialize_str(cursor, FUNCTION),
            SchemaChangeTarget::Aggregate => serialize_str(cursor, AGGREGATE),
        }
    }
}

impl FromCursor for SchemaChangeTarget {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<SchemaChangeTarget> {
        match from_cursor_str(cursor)? {
            KEYSPACE => Ok(SchemaChangeTarget::Keyspace),
            TABLE => Ok(SchemaChangeTarget::Table),
            TYPE => Ok(SchemaChangeTarget::Type),
            FUNCTION => Ok(SchemaChangeTarget::Function),
            AGGREGATE => Ok(SchemaChangeTarget::Aggregate),
            t => Err(format!("Unexpected schema change target: {t}").into()),
        }
    }
}

/// Information about changes made.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum SchemaChangeOptions {
    /// Changes related to keyspaces. Contains keyspace name.
    Keyspace(String),
    /// Changes related to tables and types. Contains keyspace and object names.
    TableType(String, String),
    /// Changes related to functions and aggregations. Contains:
    /// * keyspace containing the user defined function/aggregate
    /// * the function/aggregate name
    /// * list of strings, one string for each argument type (as CQL type)
    FunctionAggregate(String, String, Vec<String>),
}

impl Serialize for SchemaChangeOptions {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            SchemaChangeOptions::Keyspace(ks) => {
                serialize_str(cursor, ks);
            }
            SchemaChangeOptions::TableType(ks, t) => {
                serialize_str(cursor, ks);
                serialize_str(cursor, t);
            }
            SchemaChangeOptions::FunctionAggregate(ks, name, arg_types) => {
                serialize_str(cursor, ks);
                serialize_str(cursor, name);
                serialize_str_list(cursor, arg_types.iter().map(String::as_str));
            }
        }
    }
}

impl SchemaChangeOptions {
    fn from_cursor_and_target(
        cursor: &mut Cursor<&[u8]>,
        target: SchemaChangeTarget,
    ) -> error::Result<SchemaChangeOptions> {
        match target {
            SchemaChangeTarget::Keyspace => {
                Ok(SchemaChangeOptions::Keyspace(from_cursor_str(cursor)?.into()))
            }
            SchemaChangeTarget::Table | SchemaChangeTarget::Type => {
                let keyspace = from_cursor_str(cursor)?.into();
                let name = from_cursor_str(cursor)?.into();
                Ok(SchemaChangeOptions::TableType(keyspace, name))
            }
            SchemaChangeTarget::Function | SchemaChangeTarget::Aggregate => {
                let keyspace = from_cursor_str(cursor)?.into();
                let name = from_cursor_str(cursor)?.into();
                let types = from_cursor_string_list(cursor)?;
                Ok(SchemaChangeOptions::FunctionAggregate(keyspace, name, types))
            }
        }
    }
}

#[cfg(test)]
mod topology_change_type_test {
    use super::*;

    #[test]
    fn from_cursor() {
        let a = &[0, 8, 78, 69, 87, 95, 78, 79, 68, 69];
        let mut new_node: Cursor<&[u8]> = Cursor::new(a);
        assert_eq!(
            TopologyChangeType::from_cursor(&mut new_node).unwrap(),
            TopologyChangeType::NewNode
        );

        let b = &[0, 12, 82, 69, 77, 79, 86, 69, 68, 95, 78, 79, 68, 69];
        let mut removed_node: Cursor<&[u8]> = Cursor::new(b);
        assert_eq!(
            TopologyChangeType::from_cursor(&mut removed_node).unwrap(),
            TopologyChangeType::RemovedNode
        );
    }

    #[test]
    fn from_cursor_wrong() {
        let a = &[0, 1, 78];
        let mut wrong: Cursor<&[u8]> = Cursor::new(a);
        assert!(TopologyChangeType::from_cursor(&mut wrong).is_err());
    }
}

#[cfg(test)]
mod server_event_test {
    use super::*;

    #[test]
    fn status_change() {
        let bytes = &[
            // STATUS_CHANGE
            0, 13, 83, 84, 65, 84, 85, 83, 95, 67, 72, 65, 78, 71, 69, // DOWN
            0, 4, 68, 79, 87, 78, // inet
            4, 127, 0, 0, 1, 0, 0, 0, 1,
        ];
        let expected = ServerEvent::StatusChange(StatusChange {
            change_type: StatusChangeType::Down,
            addr: CInet::new("127.0.0.1:1".parse().unwrap()),
        });

        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        assert_eq!(ServerEvent::from_cursor(&mut cursor).unwrap(), expected);
        assert_eq!(expected.serialize_to_vec(), bytes);
        assert!(expected == SimpleServerEvent::StatusChange);
    }

    #[test]
    fn schema_change_table() {
        let event = ServerEvent::SchemaChange(SchemaChange {
            change_type: SchemaChangeType::Updated,
            target: SchemaChangeTarget::Table,
            options: SchemaChangeOptions::TableType("ks1".into(), "users".into()),
        });
        let bytes = event.serialize_to_vec();

        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        let ServerEvent::SchemaChange(change) = ServerEvent::from_cursor(&mut cursor).unwrap()
        else {
            panic!("expected schema change");
        };

        assert_eq!(change.keyspace(), "ks1");
        assert!(!change.is_keyspace_dropped());
    }

    #[test]
    fn unknown_event() {
        let bytes = &[0, 3, 70, 79, 79];
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        assert!(matches!(
            ServerEvent::from_cursor(&mut cursor),
            Err(Error::UnknownServerEvent(_))
        ));
    }

    #[test]
    fn simple_event_names() {
        assert_eq!(SimpleServerEvent::SchemaChange.to_string(), "SCHEMA_CHANGE");
        assert_eq!(
            SimpleServerEvent::try_from("TOPOLOGY_CHANGE").unwrap(),
            SimpleServerEvent::TopologyChange
        );
    }
}
