use fxhash::FxHashMap;
use std::sync::Arc;
use uuid::Uuid;

pub use self::cluster_metadata::ClusterMetadata;
pub use self::keyspace_metadata::{ColumnKind, ColumnMetadata, KeyspaceMetadata, TableMetadata};
pub use self::node::Node;
pub use self::node_distance::NodeDistance;
pub use self::node_state::NodeState;
pub use self::replication_strategy::ReplicationStrategy;

pub mod cluster_metadata;
mod keyspace_metadata;
mod node;
mod node_distance;
mod node_state;
mod replication_strategy;

/// Map of nodes, by host id.
pub type NodeMap<T, CM> = FxHashMap<Uuid, Arc<Node<T, CM>>>;
