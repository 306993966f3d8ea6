use bytemuck::NoUninit;
use derive_more::Display;

/// Determines how the driver will manage connections to a node.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Display, NoUninit)]
#[repr(u8)]
pub enum NodeDistance {
    /// Connections are maintained, using local pool sizes. Local nodes are preferred by load
    /// balancing and as control connection hosts.
    Local,
    /// Connections are maintained, using remote pool sizes.
    Remote,
    /// The node is never used for requests.
    Ignored,
}
