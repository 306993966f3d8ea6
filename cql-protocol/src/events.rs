//! Server-pushed events.
pub use crate::frame::events::{
    SchemaChange, SchemaChangeOptions, SchemaChangeTarget, SchemaChangeType, ServerEvent,
    SimpleServerEvent, StatusChange, StatusChangeType, TopologyChange, TopologyChangeType,
};
