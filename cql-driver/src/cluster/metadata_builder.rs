use fxhash::{FxHashMap, FxHashSet};
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::*;

use crate::cluster::connection_pool::ConnectionPoolFactory;
use crate::cluster::topology::{Node, NodeDistance, NodeMap};
use crate::cluster::{ClusterMetadata, ConnectionManager, NodeInfo};
use crate::load_balancing::node_distance_evaluator::NodeDistanceEvaluator;
use crate::transport::CqlTransport;

fn compute_distance(
    node_distance_evaluator: &(dyn NodeDistanceEvaluator + Send + Sync),
    node_info: &NodeInfo,
) -> NodeDistance {
    node_distance_evaluator
        .compute_distance(node_info)
        .unwrap_or(NodeDistance::Ignored)
}

/// Builds the first node map, reusing contact points which were already connected to.
pub(crate) fn build_initial_nodes<T: CqlTransport, CM: ConnectionManager<T>>(
    node_infos: Vec<NodeInfo>,
    contact_points: &[Arc<Node<T, CM>>],
    connection_pool_factory: &Arc<ConnectionPoolFactory<T, CM>>,
    node_distance_evaluator: &(dyn NodeDistanceEvaluator + Send + Sync),
) -> NodeMap<T, CM> {
    let mut nodes = FxHashMap::with_capacity_and_hasher(node_infos.len(), Default::default());
    for node_info in node_infos {
        if let Entry::Vacant(entry) = nodes.entry(node_info.host_id) {
            let distance = compute_distance(node_distance_evaluator, &node_info);
            let contact_point = contact_points.iter().find(|contact_point| {
                contact_point.broadcast_rpc_address() == node_info.broadcast_rpc_address
            });

            let node = if let Some(contact_point) = contact_point {
                debug!(?node_info, "Copying contact point.");
                contact_point.clone_with_node_info(node_info, distance)
            } else {
                debug!(?node_info, "Adding new node.");
                Node::new(connection_pool_factory.clone(), node_info, distance)
            };

            entry.insert(Arc::new(node));
        } else {
            warn!(
                host_id = %node_info.host_id,
                "Found duplicate peer entries - keeping only the first one."
            );
        }
    }

    nodes
}

/// Builds a new node map from fresh node information, keeping the state and connections of nodes
/// which are still present.
pub(crate) fn refresh_nodes<T: CqlTransport, CM: ConnectionManager<T>>(
    node_infos: &[NodeInfo],
    old_metadata: &ClusterMetadata<T, CM>,
    connection_pool_factory: &Arc<ConnectionPoolFactory<T, CM>>,
    node_distance_evaluator: &(dyn NodeDistanceEvaluator + Send + Sync),
) -> NodeMap<T, CM> {
    let old_nodes = old_metadata.nodes();

    let mut seen_hosts = FxHashSet::default();
    let mut added_or_updated = FxHashMap::default();

    for node_info in node_infos {
        if !seen_hosts.insert(node_info.host_id) {
            warn!(
                host_id = %node_info.host_id,
                "Found duplicate peer entries - keeping only the first one."
            );
            continue;
        }

        let distance = compute_distance(node_distance_evaluator, node_info);
        let node = if let Some(old_node) = old_nodes.get(&node_info.host_id) {
            debug!(?node_info, "Updating old node.");
            old_node.clone_with_node_info(node_info.clone(), distance)
        } else {
            debug!(?node_info, "Adding new node.");
            Node::new(connection_pool_factory.clone(), node_info.clone(), distance)
        };

        added_or_updated.insert(node_info.host_id, Arc::new(node));
    }

    added_or_updated
}

/// Difference between two node maps.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeChanges {
    pub added: Vec<SocketAddr>,
    pub removed: Vec<SocketAddr>,
}

pub(crate) fn node_changes<T: CqlTransport, CM: ConnectionManager<T>>(
    old_nodes: &NodeMap<T, CM>,
    new_nodes: &NodeMap<T, CM>,
) -> NodeChanges {
    let mut changes = NodeChanges::default();

    for (host_id, node) in new_nodes {
        match old_nodes.get(host_id) {
            Some(old_node) if old_node.broadcast_rpc_address() == node.broadcast_rpc_address() => {}
            Some(old_node) => {
                changes.removed.push(old_node.broadcast_rpc_address());
                changes.added.push(node.broadcast_rpc_address());
            }
            None => changes.added.push(node.broadcast_rpc_address()),
        }
    }

    changes.removed.extend(
        old_nodes
            .iter()
            .filter(|(host_id, _)| !new_nodes.contains_key(host_id))
            .map(|(_, node)| node.broadcast_rpc_address()),
    );

    changes
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use tokio::sync::watch;
    use uuid::Uuid;

    use crate::cluster::connection_manager::MockConnectionManager;
    use crate::cluster::connection_pool::ConnectionPoolFactory;
    use crate::cluster::metadata_builder::{
        build_initial_nodes, node_changes, refresh_nodes, NodeChanges,
    };
    use crate::cluster::topology::{Node, NodeDistance, NodeMap, NodeState};
    use crate::cluster::{ClusterMetadata, NodeInfo};
    use crate::load_balancing::node_distance_evaluator::MockNodeDistanceEvaluator;
    use crate::retry::NeverReconnectionPolicy;
    use crate::transport::MockCqlTransport;

    type TestFactory =
        ConnectionPoolFactory<MockCqlTransport, MockConnectionManager<MockCqlTransport>>;

    fn factory() -> Arc<TestFactory> {
        let (_, keyspace_receiver) = watch::channel(None);
        Arc::new(ConnectionPoolFactory::new(
            Default::default(),
            MockConnectionManager::new(),
            keyspace_receiver,
            Arc::new(NeverReconnectionPolicy),
        ))
    }

    fn addr(last_octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), 9042)
    }

    fn node_info(host_id: Uuid, last_octet: u8) -> NodeInfo {
        NodeInfo::new(host_id, addr(last_octet), None, "dc1".into(), "rack1".into())
    }

    #[test]
    fn should_create_initial_nodes_from_all_new_nodes() {
        let node_infos = vec![node_info(Uuid::new_v4(), 1)];

        let mut node_distance_evaluator = MockNodeDistanceEvaluator::new();
        node_distance_evaluator
            .expect_compute_distance()
            .return_const(None);

        let nodes = build_initial_nodes(
            node_infos.clone(),
            &[],
            &factory(),
            &node_distance_evaluator,
        );

        assert_eq!(nodes.len(), 1);

        let node = nodes.get(&node_infos[0].host_id).unwrap();
        assert_eq!(node.broadcast_rpc_address(), node_infos[0].broadcast_rpc_address);
        assert_eq!(node.distance(), NodeDistance::Ignored);
    }

    #[test]
    fn should_copy_contact_point() {
        let factory = factory();
        let node_infos = vec![node_info(Uuid::new_v4(), 1)];

        let mut node_distance_evaluator = MockNodeDistanceEvaluator::new();
        node_distance_evaluator
            .expect_compute_distance()
            .return_const(Some(NodeDistance::Local));

        let contact_point = Node::new_contact_point(factory.clone(), addr(1));
        contact_point.mark_up();

        let nodes = build_initial_nodes(
            node_infos.clone(),
            &[Arc::new(contact_point)],
            &factory,
            &node_distance_evaluator,
        );

        let node = nodes.get(&node_infos[0].host_id).unwrap();
        assert_eq!(node.state(), NodeState::Up);
        assert_eq!(node.host_id(), Some(node_infos[0].host_id));
    }

    #[test]
    fn should_skip_duplicate_host_ids() {
        let host_id = Uuid::new_v4();
        let node_infos = vec![node_info(host_id, 1), node_info(host_id, 2)];

        let mut node_distance_evaluator = MockNodeDistanceEvaluator::new();
        node_distance_evaluator
            .expect_compute_distance()
            .return_const(Some(NodeDistance::Local));

        let nodes = build_initial_nodes(node_infos, &[], &factory(), &node_distance_evaluator);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes.get(&host_id).unwrap().broadcast_rpc_address(), addr(1));
    }

    #[test]
    fn should_replace_old_metadata_nodes_with_new() {
        let factory = factory();

        let mut node_distance_evaluator = MockNodeDistanceEvaluator::new();
        node_distance_evaluator
            .expect_compute_distance()
            .return_const(Some(NodeDistance::Local));

        let node_infos = [node_info(Uuid::new_v4(), 1)];

        let old_host_id = Uuid::new_v4();
        let mut old_nodes = NodeMap::default();
        old_nodes.insert(
            old_host_id,
            Arc::new(Node::new(
                factory.clone(),
                node_info(old_host_id, 2),
                NodeDistance::Local,
            )),
        );

        let old_metadata = ClusterMetadata::new(old_nodes, Default::default());

        let nodes = refresh_nodes(
            &node_infos,
            &old_metadata,
            &factory,
            &node_distance_evaluator,
        );

        assert_eq!(nodes.len(), 1);
        assert_eq!(
            nodes
                .get(&node_infos[0].host_id)
                .unwrap()
                .broadcast_rpc_address(),
            node_infos[0].broadcast_rpc_address
        );

        assert_eq!(
            node_changes(old_metadata.nodes(), &nodes),
            NodeChanges {
                added: vec![addr(1)],
                removed: vec![addr(2)],
            }
        );
    }

    #[test]
    fn should_update_old_metadata_nodes_with_new_info() {
        let factory = factory();

        let mut node_distance_evaluator = MockNodeDistanceEvaluator::new();
        node_distance_evaluator
            .expect_compute_distance()
            .return_const(Some(NodeDistance::Remote));

        let host_id = Uuid::new_v4();
        let node_infos = [node_info(host_id, 1)];

        let old_node = Node::new(factory.clone(), node_info(host_id, 1), NodeDistance::Local);
        old_node.mark_up();

        let mut old_nodes = NodeMap::default();
        old_nodes.insert(host_id, Arc::new(old_node));

        let old_metadata = ClusterMetadata::new(old_nodes, Default::default());

        let nodes = refresh_nodes(
            &node_infos,
            &old_metadata,
            &factory,
            &node_distance_evaluator,
        );

        let node = nodes.get(&host_id).unwrap();
        assert_eq!(node.distance(), NodeDistance::Remote);
        assert_eq!(node.state(), NodeState::Up);
        assert_eq!(
            node_changes(old_metadata.nodes(), &nodes),
            NodeChanges::default()
        );
    }
}
