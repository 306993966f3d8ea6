use bytemuck::NoUninit;
use derive_more::Display;

/// The state of a node, as viewed from the driver.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, NoUninit)]
#[repr(u8)]
pub enum NodeState {
    /// The driver has never connected to the node, nor received any status events about it.
    Unknown,
    /// The node has at least one live connection, or a status event reported it up.
    Up,
    /// All connections to the node have been lost, or a status event reported it down. Requests
    /// are not routed to down nodes.
    Down,
    /// The node can never be used, e.g. because it does not speak the negotiated protocol
    /// version.
    Ignored,
}
