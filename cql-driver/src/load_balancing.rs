//! Strategies deciding which nodes, and in what order, are tried for a request.
mod dc_aware;
mod initializing_wrapper;
pub mod node_distance_evaluator;
mod random;
mod request;
mod round_robin;

use std::sync::Arc;

use crate::cluster::topology::Node;
use crate::cluster::{ClusterMetadata, ConnectionManager};
use crate::transport::CqlTransport;

pub use self::dc_aware::DcAwareLoadBalancingStrategy;
pub(crate) use self::initializing_wrapper::InitializingWrapperLoadBalancingStrategy;
pub use self::node_distance_evaluator::{
    AllLocalNodeDistanceEvaluator, NodeDistanceEvaluator, TopologyAwareNodeDistanceEvaluator,
};
pub use self::random::RandomLoadBalancingStrategy;
pub use self::request::Request;
pub use self::round_robin::RoundRobinLoadBalancingStrategy;

/// Ordered candidate nodes for a single request. Computed once per request and consumed lazily by
/// the executor.
pub type QueryPlan<T, CM> = Vec<Arc<Node<T, CM>>>;

/// Load balancing strategy, usually used for managing target node connections.
pub trait LoadBalancingStrategy<T: CqlTransport, CM: ConnectionManager<T>> {
    /// Returns query plan for given request. If no request is given, return a generic plan for
    /// establishing connection(s) to node(s).
    fn query_plan(
        &self,
        request: Option<Request>,
        cluster: &ClusterMetadata<T, CM>,
    ) -> QueryPlan<T, CM>;
}
