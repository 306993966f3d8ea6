use derivative::Derivative;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::cluster::{ClusterMetadata, ConnectionManager};
use crate::load_balancing::{LoadBalancingStrategy, QueryPlan, Request};
use crate::transport::CqlTransport;

/// Datacenter-aware load balancing. Local nodes, as determined by the node distance evaluator,
/// come first in round-robin order, followed by a shuffled, capped selection of remote nodes.
///
/// Use together with [`TopologyAwareNodeDistanceEvaluator`](crate::load_balancing::TopologyAwareNodeDistanceEvaluator),
/// otherwise all nodes are considered local.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DcAwareLoadBalancingStrategy<T: CqlTransport, CM: ConnectionManager<T>> {
    max_nodes_per_remote_dc: Option<usize>,
    allow_dc_failover_for_local_cl: bool,
    prev_idx: AtomicUsize,
    #[derivative(Debug = "ignore")]
    rng: Mutex<StdRng>,
    #[derivative(Debug = "ignore")]
    _transport: PhantomData<T>,
    #[derivative(Debug = "ignore")]
    _connection_manager: PhantomData<CM>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> DcAwareLoadBalancingStrategy<T, CM> {
    /// Creates a new strategy. `max_nodes_per_remote_dc` limits the number of remote nodes in a
    /// plan (none if not given), while `allow_dc_failover_for_local_cl` decides if remote nodes
    /// are used for requests with a datacenter-local consistency.
    pub fn new(
        max_nodes_per_remote_dc: Option<usize>,
        allow_dc_failover_for_local_cl: bool,
    ) -> Self {
        DcAwareLoadBalancingStrategy {
            max_nodes_per_remote_dc,
            allow_dc_failover_for_local_cl,
            prev_idx: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::from_os_rng()),
            _transport: Default::default(),
            _connection_manager: Default::default(),
        }
    }

    /// Seeds the generator used for shuffling remote nodes.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn round_robin_local_nodes(&self, cluster: &ClusterMetadata<T, CM>) -> QueryPlan<T, CM> {
        let mut local_nodes = cluster.unignored_local_nodes();
        if local_nodes.is_empty() {
            return local_nodes;
        }

        local_nodes.sort_unstable_by_key(|node| node.broadcast_rpc_address());

        let cur_idx = self.prev_idx.fetch_add(1, Ordering::Relaxed) % local_nodes.len();

        local_nodes.rotate_left(cur_idx);
        local_nodes
    }

    fn use_remote_nodes(&self, request: Option<Request>) -> bool {
        self.allow_dc_failover_for_local_cl
            || !request
                .and_then(|request| request.consistency)
                .map(|consistency| consistency.is_dc_local())
                .unwrap_or(false)
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> LoadBalancingStrategy<T, CM>
    for DcAwareLoadBalancingStrategy<T, CM>
{
    fn query_plan(
        &self,
        request: Option<Request>,
        cluster: &ClusterMetadata<T, CM>,
    ) -> QueryPlan<T, CM> {
        let mut plan = self.round_robin_local_nodes(cluster);

        if self.max_nodes_per_remote_dc == Some(0) || !self.use_remote_nodes(request) {
            return plan;
        }

        let mut remote_nodes = cluster
            .unignored_remote_nodes_capped(self.max_nodes_per_remote_dc.unwrap_or(usize::MAX));
        remote_nodes.shuffle(&mut *self.rng.lock().unwrap());

        plan.extend(remote_nodes);
        plan
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::topology::{NodeDistance, NodeState};
    use crate::consistency::Consistency;
    use crate::load_balancing::test_utils::{addr, metadata, node, TestMetadata};
    use crate::load_balancing::{DcAwareLoadBalancingStrategy, LoadBalancingStrategy, Request};

    fn cluster() -> TestMetadata {
        metadata(vec![
            node(1, NodeDistance::Local, NodeState::Up, "dc1"),
            node(2, NodeDistance::Local, NodeState::Up, "dc1"),
            node(3, NodeDistance::Remote, NodeState::Up, "dc2"),
            node(4, NodeDistance::Remote, NodeState::Up, "dc2"),
            node(5, NodeDistance::Remote, NodeState::Up, "dc3"),
            node(6, NodeDistance::Remote, NodeState::Down, "dc3"),
        ])
    }

    #[test]
    fn should_put_local_nodes_first() {
        let strategy = DcAwareLoadBalancingStrategy::new(None, true);
        let plan = strategy.query_plan(None, &cluster());

        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0].broadcast_rpc_address(), addr(1));
        assert_eq!(plan[1].broadcast_rpc_address(), addr(2));
        assert!(plan[2..].iter().all(|node| node.is_remote()));

        let plan = strategy.query_plan(None, &cluster());
        assert_eq!(plan[0].broadcast_rpc_address(), addr(2));
        assert_eq!(plan[1].broadcast_rpc_address(), addr(1));
    }

    #[test]
    fn should_cap_remote_nodes_per_dc() {
        let strategy = DcAwareLoadBalancingStrategy::new(Some(1), true);
        let plan = strategy.query_plan(None, &cluster());

        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.iter()
                .filter(|node| node.datacenter() == "dc2")
                .count(),
            1
        );
        assert!(plan[2..].iter().all(|node| node.is_remote()));
    }

    #[test]
    fn should_skip_remote_nodes_for_local_consistency() {
        let strategy = DcAwareLoadBalancingStrategy::new(None, false);

        let plan = strategy.query_plan(
            Some(Request::new(None, Some(Consistency::LocalQuorum))),
            &cluster(),
        );
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|node| node.is_local()));

        let plan = strategy.query_plan(
            Some(Request::new(None, Some(Consistency::Quorum))),
            &cluster(),
        );
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn should_shuffle_remote_nodes_reproducibly_with_seed() {
        let cluster = cluster();
        let remote_addresses = |strategy: &DcAwareLoadBalancingStrategy<_, _>| {
            strategy.query_plan(None, &cluster)[2..]
                .iter()
                .map(|node| node.broadcast_rpc_address())
                .collect::<Vec<_>>()
        };

        let first = DcAwareLoadBalancingStrategy::new(None, true).with_seed(3);
        let second = DcAwareLoadBalancingStrategy::new(None, true).with_seed(3);
        for _ in 0..3 {
            assert_eq!(remote_addresses(&first), remote_addresses(&second));
        }
    }
}
