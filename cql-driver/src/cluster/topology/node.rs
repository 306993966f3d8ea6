use atomic::Atomic;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{Sender, UnboundedSender};
use tokio::sync::OnceCell;
use tracing::*;
use uuid::Uuid;

use crate::cluster::connection_pool::{ConnectionPool, ConnectionPoolFactory};
use crate::cluster::topology::{NodeDistance, NodeState};
use crate::cluster::{ConnectionManager, NodeInfo};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::transport::CqlTransport;

/// Metadata about a node in the cluster, along with its connection pool.
pub struct Node<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
    // shared with updated copies of this node, as long as its address and distance don't change
    connection_pool: Arc<OnceCell<Arc<ConnectionPool<T, CM>>>>,
    broadcast_rpc_address: SocketAddr,
    broadcast_address: Option<SocketAddr>,
    distance: NodeDistance,
    state: Arc<Atomic<NodeState>>,
    host_id: Option<Uuid>,
    rack: String,
    datacenter: String,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> Debug for Node<T, CM> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("broadcast_rpc_address", &self.broadcast_rpc_address)
            .field("broadcast_address", &self.broadcast_address)
            .field("distance", &self.distance)
            .field("state", &self.state())
            .field("host_id", &self.host_id)
            .field("rack", &self.rack)
            .field("datacenter", &self.datacenter)
            .finish()
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> Node<T, CM> {
    pub(crate) fn new(
        connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
        node_info: NodeInfo,
        distance: NodeDistance,
    ) -> Self {
        Self {
            connection_pool_factory,
            connection_pool: Default::default(),
            broadcast_rpc_address: node_info.broadcast_rpc_address,
            broadcast_address: node_info.broadcast_address,
            distance,
            state: Arc::new(Atomic::new(NodeState::Unknown)),
            host_id: Some(node_info.host_id),
            rack: node_info.rack,
            datacenter: node_info.datacenter,
        }
    }

    /// Creates a node known only by its address, before any metadata is available.
    pub(crate) fn new_contact_point(
        connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
        broadcast_rpc_address: SocketAddr,
    ) -> Self {
        Self {
            connection_pool_factory,
            connection_pool: Default::default(),
            broadcast_rpc_address,
            broadcast_address: None,
            distance: NodeDistance::Local,
            state: Arc::new(Atomic::new(NodeState::Unknown)),
            host_id: None,
            rack: Default::default(),
            datacenter: Default::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state(
        connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
        broadcast_rpc_address: SocketAddr,
        distance: NodeDistance,
        state: NodeState,
        datacenter: &str,
    ) -> Self {
        Self {
            connection_pool_factory,
            connection_pool: Default::default(),
            broadcast_rpc_address,
            broadcast_address: None,
            distance,
            state: Arc::new(Atomic::new(state)),
            host_id: Some(Uuid::new_v4()),
            rack: Default::default(),
            datacenter: datacenter.into(),
        }
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state.load(Ordering::Relaxed)
    }

    /// The host ID that is assigned to this node by the server. This value can be used to uniquely
    /// identify a node even when the underling IP address changes. Not known for contact points
    /// until the first metadata refresh.
    #[inline]
    pub fn host_id(&self) -> Option<Uuid> {
        self.host_id
    }

    /// The node's broadcast RPC address. That is, the address that the node expects clients to
    /// connect to.
    #[inline]
    pub fn broadcast_rpc_address(&self) -> SocketAddr {
        self.broadcast_rpc_address
    }

    /// The node's broadcast address. That is, the address that other nodes use to communicate with
    /// that node.
    #[inline]
    pub fn broadcast_address(&self) -> Option<SocketAddr> {
        self.broadcast_address
    }

    /// Returns the dc the node is in.
    #[inline]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Returns the rack the node is in.
    #[inline]
    pub fn rack(&self) -> &str {
        &self.rack
    }

    /// Returns node distance in relation to the driver.
    #[inline]
    pub fn distance(&self) -> NodeDistance {
        self.distance
    }

    /// Checks if the node is local in relation to the driver.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.distance == NodeDistance::Local
    }

    /// Checks if the node is remote in relation to the driver.
    #[inline]
    pub fn is_remote(&self) -> bool {
        self.distance == NodeDistance::Remote
    }

    /// Should this node be excluded from query plans.
    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.distance == NodeDistance::Ignored
            || matches!(self.state(), NodeState::Down | NodeState::Ignored)
    }

    /// Borrows a connection from the node's pool, creating the pool on first use.
    pub async fn persistent_connection(self: &Arc<Self>) -> Result<Arc<T>> {
        if self.distance == NodeDistance::Ignored {
            return Err(Error::NoConnectionsAvailable(self.broadcast_rpc_address));
        }

        let pool = self
            .connection_pool
            .get_or_try_init(|| {
                debug!(?self.host_id, broadcast_rpc_address = %self.broadcast_rpc_address, "Creating connection pool.");

                self.connection_pool_factory.create(
                    self.distance,
                    self.broadcast_rpc_address,
                    self.state.clone(),
                )
            })
            .await;

        let pool = match pool {
            Ok(pool) => pool,
            Err(Error::InvalidProtocol(addr)) => {
                // we can't connect to this node even if it's up
                self.mark_ignored();
                return Err(Error::InvalidProtocol(addr));
            }
            Err(error) => return Err(error),
        };

        pool.connection().await
    }

    /// Checks if any pooled connection is still available.
    pub async fn is_any_connection_up(&self) -> bool {
        if let Some(pool) = self.connection_pool.get() {
            pool.is_any_connection_up().await
        } else {
            false
        }
    }

    /// Creates a new connection to the node, outside of the pool, with optional event and error
    /// handlers.
    pub async fn new_connection(
        &self,
        event_handler: Option<UnboundedSender<Frame>>,
        error_handler: Option<Sender<Error>>,
    ) -> Result<T> {
        debug!(broadcast_rpc_address = %self.broadcast_rpc_address, "Establishing new connection to node...");

        let connect_timeout = self.connection_pool_factory.config().connect_timeout();
        tokio::time::timeout(
            connect_timeout,
            self.connection_pool_factory.connection_manager().connection(
                event_handler,
                error_handler,
                self.broadcast_rpc_address,
            ),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "Timeout waiting for connection to: {}",
                self.broadcast_rpc_address
            ))
        })
        .and_then(|result| result)
    }

    /// Marks the node as down and closes its connections.
    pub(crate) async fn mark_down(&self) {
        self.state.store(NodeState::Down, Ordering::Relaxed);

        if let Some(pool) = self.connection_pool.get() {
            pool.close().await;
        }
    }

    /// Marks the node as up and re-establishes its connections.
    pub(crate) fn mark_up(&self) {
        if self.state() == NodeState::Ignored {
            return;
        }

        self.state.store(NodeState::Up, Ordering::Relaxed);

        if let Some(pool) = self.connection_pool.get() {
            pool.reopen();
        }
    }

    pub(crate) fn mark_ignored(&self) {
        self.state.store(NodeState::Ignored, Ordering::Relaxed);
    }

    /// Closes pooled connections, if the pool is not shared with the given replacement.
    pub(crate) async fn close_unless_shared(&self, replacement: Option<&Self>) {
        let shared = replacement
            .map(|replacement| Arc::ptr_eq(&self.connection_pool, &replacement.connection_pool))
            .unwrap_or(false);

        if shared {
            return;
        }

        if let Some(pool) = self.connection_pool.get() {
            pool.close().await;
        }
    }

    /// Creates an updated copy of this node. Connections and state are kept if the address did not
    /// change; connections are also dropped if the distance changed, since pool sizes depend on it.
    pub(crate) fn clone_with_node_info(&self, node_info: NodeInfo, distance: NodeDistance) -> Self {
        let address_changed = self.broadcast_rpc_address != node_info.broadcast_rpc_address;

        Self {
            connection_pool_factory: self.connection_pool_factory.clone(),
            connection_pool: if address_changed || distance != self.distance {
                Default::default()
            } else {
                self.connection_pool.clone()
            },
            broadcast_rpc_address: node_info.broadcast_rpc_address,
            broadcast_address: node_info.broadcast_address,
            distance,
            state: if address_changed {
                Arc::new(Atomic::new(NodeState::Unknown))
            } else {
                self.state.clone()
            },
            host_id: Some(node_info.host_id),
            rack: node_info.rack,
            datacenter: node_info.datacenter,
        }
    }
}
