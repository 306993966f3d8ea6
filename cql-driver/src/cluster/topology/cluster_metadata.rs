use fxhash::FxHashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::cluster::topology::keyspace_metadata::KeyspaceMetadata;
use crate::cluster::topology::node::Node;
use crate::cluster::topology::NodeMap;
use crate::cluster::ConnectionManager;
use crate::transport::CqlTransport;

/// Immutable snapshot of the metadata of the cluster that this driver instance is connected to.
/// Updates produce new snapshots, sharing unchanged nodes and keyspaces.
#[derive(Debug)]
pub struct ClusterMetadata<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    nodes: NodeMap<T, CM>,
    keyspaces: FxHashMap<String, Arc<KeyspaceMetadata>>,
}

// derive would require T: Clone and CM: Clone
impl<T: CqlTransport, CM: ConnectionManager<T>> Clone for ClusterMetadata<T, CM> {
    fn clone(&self) -> Self {
        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces: self.keyspaces.clone(),
        }
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> ClusterMetadata<T, CM> {
    pub fn new(
        nodes: NodeMap<T, CM>,
        keyspaces: FxHashMap<String, Arc<KeyspaceMetadata>>,
    ) -> Self {
        ClusterMetadata { nodes, keyspaces }
    }

    /// Creates a new metadata with a keyspace replaced/added.
    #[must_use]
    pub fn clone_with_keyspace(&self, keyspace: KeyspaceMetadata) -> Self {
        let mut keyspaces = self.keyspaces.clone();
        keyspaces.insert(keyspace.name.clone(), Arc::new(keyspace));

        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces,
        }
    }

    /// Creates a new metadata with a keyspace removed.
    #[must_use]
    pub fn clone_without_keyspace(&self, keyspace: &str) -> Self {
        let mut keyspaces = self.keyspaces.clone();
        keyspaces.remove(keyspace);

        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces,
        }
    }

    /// Creates a new metadata with all keyspaces replaced.
    #[must_use]
    pub fn clone_with_keyspaces(&self, keyspaces: FxHashMap<String, Arc<KeyspaceMetadata>>) -> Self {
        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces,
        }
    }

    /// Creates a new metadata with all nodes replaced.
    #[must_use]
    pub fn clone_with_nodes(&self, nodes: NodeMap<T, CM>) -> Self {
        ClusterMetadata {
            nodes,
            keyspaces: self.keyspaces.clone(),
        }
    }

    /// Creates a new metadata with a node replaced/added, keyed by its host id.
    #[must_use]
    pub fn clone_with_node(&self, host_id: Uuid, node: Arc<Node<T, CM>>) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.insert(host_id, node);

        ClusterMetadata {
            nodes,
            keyspaces: self.keyspaces.clone(),
        }
    }

    /// Creates a new metadata with a node removed.
    #[must_use]
    pub fn clone_without_node(&self, broadcast_rpc_address: SocketAddr) -> Self {
        let nodes = self
            .nodes
            .iter()
            .filter(|(_, node)| node.broadcast_rpc_address() != broadcast_rpc_address)
            .map(|(host_id, node)| (*host_id, node.clone()))
            .collect();

        ClusterMetadata {
            nodes,
            keyspaces: self.keyspaces.clone(),
        }
    }

    /// Returns all known nodes.
    #[inline]
    pub fn nodes(&self) -> &NodeMap<T, CM> {
        &self.nodes
    }

    /// Returns known keyspaces.
    #[inline]
    pub fn keyspaces(&self) -> &FxHashMap<String, Arc<KeyspaceMetadata>> {
        &self.keyspaces
    }

    /// Returns known keyspace, if present.
    #[inline]
    pub fn keyspace(&self, keyspace: &str) -> Option<&Arc<KeyspaceMetadata>> {
        self.keyspaces.get(keyspace)
    }

    /// Returns nodes that are not ignored for load balancing.
    pub fn unignored_nodes(&self) -> Vec<Arc<Node<T, CM>>> {
        self.nodes
            .values()
            .filter(|node| !node.is_ignored())
            .cloned()
            .collect()
    }

    /// Returns nodes that are not ignored for load balancing and are local.
    pub fn unignored_local_nodes(&self) -> Vec<Arc<Node<T, CM>>> {
        self.nodes
            .values()
            .filter(|node| !node.is_ignored() && node.is_local())
            .cloned()
            .collect()
    }

    /// Returns nodes that are not ignored for load balancing and are remote, at most
    /// `max_nodes_per_dc` from each datacenter.
    pub fn unignored_remote_nodes_capped(&self, max_nodes_per_dc: usize) -> Vec<Arc<Node<T, CM>>> {
        let mut per_dc = FxHashMap::<&str, usize>::default();
        self.nodes
            .values()
            .filter(|node| !node.is_ignored() && node.is_remote())
            .filter(|node| {
                let count = per_dc.entry(node.datacenter()).or_default();
                *count += 1;
                *count <= max_nodes_per_dc
            })
            .cloned()
            .collect()
    }

    /// Checks if any nodes are known.
    #[inline]
    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Finds a node by its address.
    pub fn find_node_by_rpc_address(
        &self,
        broadcast_rpc_address: SocketAddr,
    ) -> Option<Arc<Node<T, CM>>> {
        self.nodes
            .values()
            .find(|node| node.broadcast_rpc_address() == broadcast_rpc_address)
            .cloned()
    }

    /// Finds a node by its host id.
    #[inline]
    pub fn find_node_by_host_id(&self, host_id: &Uuid) -> Option<Arc<Node<T, CM>>> {
        self.nodes.get(host_id).cloned()
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> Default for ClusterMetadata<T, CM> {
    fn default() -> Self {
        ClusterMetadata {
            nodes: Default::default(),
            keyspaces: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use tokio::sync::watch;

    use crate::cluster::connection_manager::MockConnectionManager;
    use crate::cluster::connection_pool::ConnectionPoolFactory;
    use crate::cluster::topology::{
        ClusterMetadata, KeyspaceMetadata, Node, NodeDistance, NodeState, ReplicationStrategy,
    };
    use crate::retry::NeverReconnectionPolicy;
    use crate::transport::MockCqlTransport;

    type TestMetadata = ClusterMetadata<MockCqlTransport, MockConnectionManager<MockCqlTransport>>;

    fn keyspace(name: &str) -> KeyspaceMetadata {
        KeyspaceMetadata::new(
            name.into(),
            true,
            ReplicationStrategy::SimpleStrategy {
                replication_factor: 1,
            },
            Default::default(),
            Default::default(),
        )
    }

    fn metadata() -> TestMetadata {
        let (_, keyspace_receiver) = watch::channel(None);
        let factory = Arc::new(ConnectionPoolFactory::new(
            Default::default(),
            MockConnectionManager::new(),
            keyspace_receiver,
            Arc::new(NeverReconnectionPolicy),
        ));

        let nodes = [
            (1, NodeDistance::Local, NodeState::Up),
            (2, NodeDistance::Local, NodeState::Down),
            (3, NodeDistance::Remote, NodeState::Unknown),
            (4, NodeDistance::Remote, NodeState::Up),
            (5, NodeDistance::Ignored, NodeState::Up),
        ]
        .into_iter()
        .map(|(last_octet, distance, state)| {
            let node = Node::with_state(
                factory.clone(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), 9042),
                distance,
                state,
                "dc1",
            );

            (node.host_id().unwrap(), Arc::new(node))
        })
        .collect();

        ClusterMetadata::new(nodes, FxHashMap::default())
    }

    #[test]
    fn should_filter_unignored_nodes() {
        let metadata = metadata();

        assert_eq!(metadata.unignored_nodes().len(), 3);
        assert_eq!(metadata.unignored_local_nodes().len(), 1);
        assert_eq!(metadata.unignored_remote_nodes_capped(1).len(), 1);
        assert_eq!(metadata.unignored_remote_nodes_capped(5).len(), 2);
    }

    #[test]
    fn should_remove_node_by_address() {
        let metadata = metadata();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 3)), 9042);

        assert!(metadata.find_node_by_rpc_address(addr).is_some());

        let metadata = metadata.clone_without_node(addr);
        assert!(metadata.find_node_by_rpc_address(addr).is_none());
        assert_eq!(metadata.nodes().len(), 4);
    }

    #[test]
    fn should_share_unchanged_keyspaces() {
        let metadata = metadata()
            .clone_with_keyspace(keyspace("ks1"))
            .clone_with_keyspace(keyspace("ks2"));

        let updated = metadata.clone_with_keyspace(keyspace("ks1"));
        assert!(Arc::ptr_eq(
            metadata.keyspace("ks2").unwrap(),
            updated.keyspace("ks2").unwrap()
        ));
        assert!(!Arc::ptr_eq(
            metadata.keyspace("ks1").unwrap(),
            updated.keyspace("ks1").unwrap()
        ));

        let dropped = updated.clone_without_keyspace("ks1");
        assert!(dropped.keyspace("ks1").is_none());
        assert!(dropped.keyspace("ks2").is_some());
    }
}
