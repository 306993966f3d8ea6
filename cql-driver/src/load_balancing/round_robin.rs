use derivative::Derivative;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cluster::{ClusterMetadata, ConnectionManager};
use crate::load_balancing::{LoadBalancingStrategy, QueryPlan, Request};
use crate::transport::CqlTransport;

/// Simple round-robin load balancing over all unignored nodes. Every plan starts with the next
/// node and contains all other nodes as fallbacks.
#[derive(Default, Derivative)]
#[derivative(Debug)]
pub struct RoundRobinLoadBalancingStrategy<T: CqlTransport, CM: ConnectionManager<T>> {
    prev_idx: AtomicUsize,
    #[derivative(Debug = "ignore")]
    _transport: PhantomData<T>,
    #[derivative(Debug = "ignore")]
    _connection_manager: PhantomData<CM>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> RoundRobinLoadBalancingStrategy<T, CM> {
    pub fn new() -> Self {
        RoundRobinLoadBalancingStrategy {
            prev_idx: AtomicUsize::new(0),
            _transport: Default::default(),
            _connection_manager: Default::default(),
        }
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> LoadBalancingStrategy<T, CM>
    for RoundRobinLoadBalancingStrategy<T, CM>
{
    fn query_plan(
        &self,
        _request: Option<Request>,
        cluster: &ClusterMetadata<T, CM>,
    ) -> QueryPlan<T, CM> {
        let mut nodes = cluster.unignored_nodes();
        if nodes.is_empty() {
            return nodes;
        }

        // node map order is arbitrary, but stable for a given snapshot
        nodes.sort_unstable_by_key(|node| node.broadcast_rpc_address());

        let cur_idx = self.prev_idx.fetch_add(1, Ordering::Relaxed) % nodes.len();

        nodes.rotate_left(cur_idx);
        nodes
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::topology::{NodeDistance, NodeState};
    use crate::load_balancing::test_utils::{addr, metadata, node};
    use crate::load_balancing::{LoadBalancingStrategy, RoundRobinLoadBalancingStrategy};

    #[test]
    fn should_rotate_nodes() {
        let cluster = metadata(vec![
            node(1, NodeDistance::Local, NodeState::Up, "dc1"),
            node(2, NodeDistance::Local, NodeState::Up, "dc1"),
            node(3, NodeDistance::Local, NodeState::Down, "dc1"),
        ]);

        let strategy = RoundRobinLoadBalancingStrategy::new();

        let plan = strategy.query_plan(None, &cluster);
        assert_eq!(
            plan.iter()
                .map(|node| node.broadcast_rpc_address())
                .collect::<Vec<_>>(),
            vec![addr(1), addr(2)]
        );

        let plan = strategy.query_plan(None, &cluster);
        assert_eq!(
            plan.iter()
                .map(|node| node.broadcast_rpc_address())
                .collect::<Vec<_>>(),
            vec![addr(2), addr(1)]
        );
    }

    #[test]
    fn should_return_empty_plan_without_nodes() {
        let strategy = RoundRobinLoadBalancingStrategy::new();
        assert!(strategy.query_plan(None, &metadata(vec![])).is_empty());
    }
}
