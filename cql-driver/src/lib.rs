//! **cql-driver** is an asynchronous client for clusters speaking the native CQL protocol.
//!
//! ## Getting started
//!
//! This example configures a cluster with a single contact point, and uses round-robin load
//! balancing.
//!
//! ```no_run
//! use cql_driver::cluster::session::TcpSessionBuilder;
//! use cql_driver::cluster::NodeTcpConfigBuilder;
//! use cql_driver::load_balancing::RoundRobinLoadBalancingStrategy;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cluster_config = NodeTcpConfigBuilder::new()
//!         .with_contact_point("127.0.0.1:9042".into())
//!         .build()
//!         .await
//!         .unwrap();
//!     let session = TcpSessionBuilder::new(RoundRobinLoadBalancingStrategy::new(), cluster_config)
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let create_ks = "CREATE KEYSPACE IF NOT EXISTS test_ks WITH REPLICATION = { \
//!                      'class' : 'SimpleStrategy', 'replication_factor' : 1 };";
//!     session
//!         .query(create_ks)
//!         .await
//!         .expect("Keyspace create error");
//! }
//! ```
//!
//! ## Nodes and load balancing
//!
//! Requests are routed by a [load balancing strategy](crate::load_balancing), which orders
//! candidate nodes for every request. Nodes are classified as local or remote by a
//! [node distance evaluator](crate::load_balancing::node_distance_evaluator), which also decides
//! the size of their connection pools. Datacenter-aware load balancing is preferred for
//! multi-datacenter clusters.

pub mod cluster;
pub mod events;
pub mod frame_parser;
pub mod future;
pub mod load_balancing;
pub mod retry;
pub mod speculative_execution;
pub mod statement;
pub mod transport;

pub use cql_protocol::authenticators;
pub use cql_protocol::consistency;
pub use cql_protocol::error;
pub use cql_protocol::frame;
pub use cql_protocol::query;
pub use cql_protocol::types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
