//! Server-pushed events and cluster topology notifications.
use derive_more::Display;
use std::net::SocketAddr;

pub use crate::frame::events::{
    SchemaChange, SchemaChangeOptions, SchemaChangeTarget, SchemaChangeType, ServerEvent,
    SimpleServerEvent, StatusChange, StatusChangeType, TopologyChange, TopologyChangeType,
};

/// A change in the set of known nodes or their reachability, as observed by the control
/// connection. Addresses are broadcast RPC addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TopologyEvent {
    #[display("node {_0} is up")]
    NodeUp(SocketAddr),
    #[display("node {_0} is down")]
    NodeDown(SocketAddr),
    #[display("node {_0} has been added")]
    NodeAdded(SocketAddr),
    #[display("node {_0} has been removed")]
    NodeRemoved(SocketAddr),
}

impl TopologyEvent {
    /// Address of the node this event concerns.
    pub fn address(&self) -> SocketAddr {
        match self {
            TopologyEvent::NodeUp(address)
            | TopologyEvent::NodeDown(address)
            | TopologyEvent::NodeAdded(address)
            | TopologyEvent::NodeRemoved(address) => *address,
        }
    }
}
