//! Cluster connectivity: node discovery, connection pools, the control connection and sessions.
pub(crate) use self::cluster_metadata_manager::ClusterMetadataManager;
pub use self::config_tcp::{NodeTcpConfig, NodeTcpConfigBuilder};
pub use self::connection_manager::{startup, ConnectionManager};
pub use self::connection_pool::{ConnectionPoolConfig, PoolOverflow};
pub use self::keyspace_holder::KeyspaceHolder;
pub use self::node_address::NodeAddress;
pub use self::node_info::NodeInfo;
pub(crate) use self::session_context::SessionContext;
pub use self::tcp_connection_manager::TcpConnectionManager;
pub use self::topology::ClusterMetadata;

pub(crate) mod cluster_metadata_manager;
mod config_tcp;
pub(crate) mod connection_manager;
pub(crate) mod connection_pool;
mod control_connection;
mod keyspace_holder;
mod metadata_builder;
mod node_address;
mod node_info;
mod schema_builder;
mod send_frame;
pub mod session;
mod session_context;
mod tcp_connection_manager;
pub mod topology;
