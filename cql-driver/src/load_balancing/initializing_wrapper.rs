use std::sync::Arc;

use crate::cluster::topology::Node;
use crate::cluster::{ClusterMetadata, ConnectionManager};
use crate::load_balancing::{LoadBalancingStrategy, QueryPlan, Request};
use crate::transport::CqlTransport;

// Returns contact points until cluster metadata gets populated.
pub(crate) struct InitializingWrapperLoadBalancingStrategy<
    T: CqlTransport + 'static,
    CM: ConnectionManager<T> + 'static,
    LB: LoadBalancingStrategy<T, CM>,
> {
    inner: LB,
    contact_points: Vec<Arc<Node<T, CM>>>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>, LB: LoadBalancingStrategy<T, CM>>
    LoadBalancingStrategy<T, CM> for InitializingWrapperLoadBalancingStrategy<T, CM, LB>
{
    fn query_plan(
        &self,
        request: Option<Request>,
        cluster: &ClusterMetadata<T, CM>,
    ) -> QueryPlan<T, CM> {
        if cluster.has_nodes() {
            self.inner.query_plan(request, cluster)
        } else {
            self.contact_points.clone()
        }
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>, LB: LoadBalancingStrategy<T, CM>>
    InitializingWrapperLoadBalancingStrategy<T, CM, LB>
{
    pub fn new(inner: LB, contact_points: Vec<Arc<Node<T, CM>>>) -> Self {
        InitializingWrapperLoadBalancingStrategy {
            inner,
            contact_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cluster::topology::{NodeDistance, NodeState};
    use crate::load_balancing::test_utils::{addr, metadata, node};
    use crate::load_balancing::{
        InitializingWrapperLoadBalancingStrategy, LoadBalancingStrategy,
        RoundRobinLoadBalancingStrategy,
    };

    #[test]
    fn should_use_contact_points_until_nodes_are_known() {
        let strategy = InitializingWrapperLoadBalancingStrategy::new(
            RoundRobinLoadBalancingStrategy::new(),
            vec![Arc::new(node(9, NodeDistance::Local, NodeState::Unknown, ""))],
        );

        let plan = strategy.query_plan(None, &metadata(vec![]));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].broadcast_rpc_address(), addr(9));

        let plan = strategy.query_plan(
            None,
            &metadata(vec![node(1, NodeDistance::Local, NodeState::Up, "dc1")]),
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].broadcast_rpc_address(), addr(1));
    }
}
