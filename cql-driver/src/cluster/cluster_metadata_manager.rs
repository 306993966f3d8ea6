use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use fxhash::FxHashMap;
use itertools::Itertools;
use tokio::sync::broadcast::Sender;
use tokio::time::timeout;
use tracing::*;

use crate::cluster::connection_pool::ConnectionPoolFactory;
use crate::cluster::metadata_builder::{build_initial_nodes, node_changes, refresh_nodes};
use crate::cluster::schema_builder::{
    build_keyspaces, SchemaRows, COLUMNS_TABLE, KEYSPACES_TABLE, TABLES_TABLE, TYPES_TABLE,
};
use crate::cluster::topology::{KeyspaceMetadata, Node, NodeMap, NodeState};
use crate::cluster::{ClusterMetadata, ConnectionManager, NodeInfo, SessionContext};
use crate::error::{Error, Result};
use crate::events::{
    SchemaChange, ServerEvent, StatusChange, StatusChangeType, TopologyChange, TopologyEvent,
};
use crate::frame::message_error::AdditionalErrorInfo;
use crate::frame::{Frame, Version};
use crate::load_balancing::node_distance_evaluator::NodeDistanceEvaluator;
use crate::query::{QueryParams, QueryValues};
use crate::transport::CqlTransport;
use crate::types::rows::Row;
use crate::types::CqlValue;

const CONTROL_QUERY_TIMEOUT: Duration = Duration::from_secs(12);

/// Owner of cluster metadata. Metadata is only modified by the control connection, which applies
/// refreshes and server events sequentially, while readers load consistent snapshots.
pub struct ClusterMetadataManager<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    metadata: ArcSwap<ClusterMetadata<T, CM>>,
    contact_points: Vec<Arc<Node<T, CM>>>,
    connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
    session_context: Arc<SessionContext<T>>,
    node_distance_evaluator: Box<dyn NodeDistanceEvaluator + Send + Sync>,
    topology_event_sender: Sender<TopologyEvent>,
    did_initial_refresh: AtomicBool,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> ClusterMetadataManager<T, CM> {
    pub(crate) fn new(
        contact_points: Vec<Arc<Node<T, CM>>>,
        connection_pool_factory: Arc<ConnectionPoolFactory<T, CM>>,
        session_context: Arc<SessionContext<T>>,
        node_distance_evaluator: Box<dyn NodeDistanceEvaluator + Send + Sync>,
        topology_event_sender: Sender<TopologyEvent>,
    ) -> Self {
        ClusterMetadataManager {
            metadata: ArcSwap::from_pointee(ClusterMetadata::default()),
            contact_points,
            connection_pool_factory,
            session_context,
            node_distance_evaluator,
            topology_event_sender,
            did_initial_refresh: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn metadata(&self) -> Arc<ClusterMetadata<T, CM>> {
        self.metadata.load_full()
    }

    /// Nodes given in configuration, used until the first refresh discovers the cluster.
    #[inline]
    pub fn contact_points(&self) -> &[Arc<Node<T, CM>>] {
        &self.contact_points
    }

    /// Protocol version used by all connections of the session.
    #[inline]
    pub(crate) fn protocol_version(&self) -> Version {
        self.connection_pool_factory.connection_manager().version()
    }

    fn control_transport(&self) -> Result<Arc<T>> {
        self.session_context
            .control_connection_transport
            .load_full()
            .ok_or_else(|| Error::General("Control connection is not established!".into()))
    }

    /// Refreshes nodes and schema. Expected to be called by the control connection.
    pub(crate) async fn refresh_metadata(&self) -> Result<()> {
        let control_transport = self.control_transport()?;

        let node_infos = self.build_node_infos(control_transport.as_ref()).await?;
        let keyspaces = self
            .query_schema(control_transport.as_ref(), None)
            .await
            .and_then(|rows| build_keyspaces(&rows))?;

        if self
            .did_initial_refresh
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            let nodes = build_initial_nodes(
                node_infos,
                &self.contact_points,
                &self.connection_pool_factory,
                self.node_distance_evaluator.as_ref(),
            );

            for contact_point in &self.contact_points {
                let replacement = nodes.values().find(|node| {
                    node.broadcast_rpc_address() == contact_point.broadcast_rpc_address()
                });
                contact_point
                    .close_unless_shared(replacement.map(AsRef::as_ref))
                    .await;
            }

            let keyspaces = keyspaces
                .into_iter()
                .map(|(name, keyspace)| (name, Arc::new(keyspace)))
                .collect();

            self.metadata
                .store(Arc::new(ClusterMetadata::new(nodes, keyspaces)));
        } else {
            self.apply_node_infos(&node_infos).await;
            self.metadata.rcu(|old_metadata| {
                old_metadata.clone_with_keyspaces(Self::merge_keyspaces(
                    old_metadata.keyspaces(),
                    keyspaces.clone(),
                ))
            });
        }

        Ok(())
    }

    /// Re-reads the node list, keeping the state of known nodes.
    pub(crate) async fn refresh_nodes(&self) -> Result<()> {
        let control_transport = self.control_transport()?;
        let node_infos = self.build_node_infos(control_transport.as_ref()).await?;
        self.apply_node_infos(&node_infos).await;
        Ok(())
    }

    /// Re-reads schema of a single keyspace, leaving other keyspaces intact.
    pub(crate) async fn refresh_keyspace(&self, keyspace: &str) -> Result<()> {
        let control_transport = self.control_transport()?;
        let mut keyspaces = self
            .query_schema(control_transport.as_ref(), Some(keyspace))
            .await
            .and_then(|rows| build_keyspaces(&rows))?;

        match keyspaces.remove(keyspace) {
            Some(keyspace_metadata) => {
                debug!(keyspace, "Refreshed keyspace metadata.");
                self.metadata.rcu(|old_metadata| {
                    old_metadata.clone_with_keyspace(keyspace_metadata.clone())
                });
            }
            None => {
                debug!(keyspace, "Keyspace not found - removing from metadata.");
                self.metadata
                    .rcu(|old_metadata| old_metadata.clone_without_keyspace(keyspace));
            }
        }

        Ok(())
    }

    /// Applies a server event to stored metadata.
    pub(crate) async fn process_event(&self, event: ServerEvent) -> Result<()> {
        debug!(?event, "Processing server event.");

        match event {
            ServerEvent::StatusChange(StatusChange { change_type, addr }) => {
                self.process_status_change(change_type, addr.addr).await;
                Ok(())
            }
            ServerEvent::TopologyChange(TopologyChange { .. }) => self.refresh_nodes().await,
            ServerEvent::SchemaChange(change) => self.process_schema_change(&change).await,
        }
    }

    async fn process_status_change(&self, change_type: StatusChangeType, addr: SocketAddr) {
        let Some(node) = self.metadata().find_node_by_rpc_address(addr) else {
            debug!(%addr, "Ignoring status change of unknown node.");
            return;
        };

        match change_type {
            StatusChangeType::Up => {
                if !matches!(node.state(), NodeState::Up | NodeState::Ignored) {
                    node.mark_up();
                    self.send_topology_event(TopologyEvent::NodeUp(addr));
                }
            }
            StatusChangeType::Down => {
                if node.state() != NodeState::Down {
                    node.mark_down().await;
                    self.send_topology_event(TopologyEvent::NodeDown(addr));
                }
            }
        }
    }

    async fn process_schema_change(&self, change: &SchemaChange) -> Result<()> {
        let keyspace = change.keyspace();

        if change.is_keyspace_dropped() {
            debug!(keyspace, "Removing dropped keyspace.");
            self.metadata
                .rcu(|old_metadata| old_metadata.clone_without_keyspace(keyspace));
            Ok(())
        } else {
            self.refresh_keyspace(keyspace).await
        }
    }

    fn send_topology_event(&self, event: TopologyEvent) {
        debug!(%event, "Topology changed.");

        // no receivers is not an error
        let _ = self.topology_event_sender.send(event);
    }

    async fn apply_node_infos(&self, node_infos: &[NodeInfo]) {
        let old_metadata = self.metadata();
        let nodes = refresh_nodes(
            node_infos,
            old_metadata.as_ref(),
            &self.connection_pool_factory,
            self.node_distance_evaluator.as_ref(),
        );

        self.metadata
            .rcu(|metadata| metadata.clone_with_nodes(nodes.clone()));

        self.close_replaced_nodes(old_metadata.nodes(), &nodes).await;

        let changes = node_changes(old_metadata.nodes(), &nodes);
        for addr in changes.removed {
            self.send_topology_event(TopologyEvent::NodeRemoved(addr));
        }

        for addr in changes.added {
            self.send_topology_event(TopologyEvent::NodeAdded(addr));
        }
    }

    async fn close_replaced_nodes(&self, old_nodes: &NodeMap<T, CM>, new_nodes: &NodeMap<T, CM>) {
        for (host_id, old_node) in old_nodes {
            old_node
                .close_unless_shared(new_nodes.get(host_id).map(AsRef::as_ref))
                .await;
        }
    }

    // keeps the identity of keyspaces which did not change
    fn merge_keyspaces(
        old_keyspaces: &FxHashMap<String, Arc<KeyspaceMetadata>>,
        keyspaces: FxHashMap<String, KeyspaceMetadata>,
    ) -> FxHashMap<String, Arc<KeyspaceMetadata>> {
        keyspaces
            .into_iter()
            .map(|(name, keyspace)| {
                let keyspace = match old_keyspaces.get(&name) {
                    Some(old_keyspace) if **old_keyspace == keyspace => old_keyspace.clone(),
                    _ => Arc::new(keyspace),
                };

                (name, keyspace)
            })
            .collect()
    }

    async fn query_schema(
        &self,
        control_transport: &T,
        keyspace: Option<&str>,
    ) -> Result<SchemaRows> {
        let (keyspaces, tables, columns, types) = tokio::try_join!(
            self.query_schema_table(control_transport, KEYSPACES_TABLE, keyspace),
            self.query_schema_table(control_transport, TABLES_TABLE, keyspace),
            self.query_schema_table(control_transport, COLUMNS_TABLE, keyspace),
            self.query_schema_table(control_transport, TYPES_TABLE, keyspace),
        )?;

        Ok(SchemaRows {
            keyspaces,
            tables,
            columns,
            types,
        })
    }

    async fn query_schema_table(
        &self,
        control_transport: &T,
        table: &str,
        keyspace: Option<&str>,
    ) -> Result<Vec<Row>> {
        let rows = match keyspace {
            Some(keyspace) => {
                self.send_query(
                    format!("SELECT * FROM {table} WHERE keyspace_name = ?"),
                    Some(vec![keyspace].into()),
                    control_transport,
                )
                .await?
            }
            None => {
                self.send_query(format!("SELECT * FROM {table}"), None, control_transport)
                    .await?
            }
        };

        Ok(rows.unwrap_or_default())
    }

    async fn build_node_infos(&self, control_transport: &T) -> Result<Vec<NodeInfo>> {
        let control_addr = control_transport.address();
        let local = self
            .send_query("SELECT * FROM system.local".into(), None, control_transport)
            .await?
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| format!("Node {control_addr} failed to return info about itself!"))?;

        // Don't rely on system.local.rpc_address for the control node, because it can report the
        // normal RPC address instead of the broadcast one. We already know the endpoint anyway.
        let mut node_infos = vec![Self::build_node_info(&local, control_addr)?];

        let peers = self.query_peers(control_transport).await?;
        if let Some(peers) = peers {
            node_infos.reserve(peers.len());
            node_infos = peers
                .iter()
                .filter_map(|row| {
                    if !Self::is_peer_row_valid(row) {
                        warn!(?row, "Found invalid peer row - ignoring.");
                        return None;
                    }

                    Self::broadcast_rpc_address_from_row(row, control_addr).map(
                        |broadcast_rpc_address| Self::build_node_info(row, broadcast_rpc_address),
                    )
                })
                .fold_ok(node_infos, |mut node_infos, node_info| {
                    node_infos.push(node_info);
                    node_infos
                })?;
        }

        Ok(node_infos)
    }

    async fn query_peers(&self, transport: &T) -> Result<Option<Vec<Row>>> {
        let peers_v2_result = self
            .send_query("SELECT * FROM system.peers_v2".into(), None, transport)
            .await;

        match peers_v2_result {
            Ok(result) => Ok(result),
            // peers_v2 does not exist
            Err(Error::Server { body, .. })
                if body.additional_info == AdditionalErrorInfo::Invalid =>
            {
                debug!("Falling back to system.peers.");
                self.send_query("SELECT * FROM system.peers".into(), None, transport)
                    .await
            }
            Err(error) => Err(error),
        }
    }

    async fn send_query(
        &self,
        query: String,
        values: Option<QueryValues>,
        transport: &T,
    ) -> Result<Option<Vec<Row>>> {
        let query_params = QueryParams {
            values,
            ..Default::default()
        };

        let frame = Frame::new_req_query(query, query_params, self.protocol_version());

        timeout(CONTROL_QUERY_TIMEOUT, transport.write_frame(&frame))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Control query to {} timed out!",
                    transport.address()
                ))
            })?
            .and_then(|frame| frame.response_body())
            .map(|body| body.into_rows())
    }

    fn text(row: &Row, name: &str) -> Option<String> {
        row.get_by_name(name)
            .ok()
            .flatten()
            .and_then(CqlValue::into_text)
    }

    fn build_node_info(row: &Row, broadcast_rpc_address: SocketAddr) -> Result<NodeInfo> {
        let host_id = row
            .get_required("host_id")?
            .as_uuid()
            .ok_or_else(|| Error::General("Column host_id is not a uuid!".into()))?;

        let broadcast_address = Self::broadcast_address_from_row(row, broadcast_rpc_address.port());

        Ok(NodeInfo::new(
            host_id,
            broadcast_rpc_address,
            broadcast_address,
            Self::text(row, "data_center").unwrap_or_default(),
            Self::text(row, "rack").unwrap_or_default(),
        ))
    }

    fn inet(row: &Row, name: &str) -> Option<IpAddr> {
        row.get_by_name(name)
            .ok()
            .flatten()
            .and_then(|value| value.as_inet())
    }

    fn port(row: &Row, name: &str) -> Option<u16> {
        row.get_by_name(name)
            .ok()
            .flatten()
            .and_then(|value| value.as_int())
            .and_then(|port| u16::try_from(port).ok())
    }

    fn broadcast_address_from_row(row: &Row, default_port: u16) -> Option<SocketAddr> {
        // system.local has broadcast_address, system.peers(_v2) have peer
        let address = Self::inet(row, "broadcast_address").or_else(|| Self::inet(row, "peer"))?;
        let port = Self::port(row, "broadcast_port")
            .or_else(|| Self::port(row, "peer_port"))
            .unwrap_or(default_port);

        Some(SocketAddr::new(address, port))
    }

    fn broadcast_rpc_address_from_row(row: &Row, control_addr: SocketAddr) -> Option<SocketAddr> {
        // system.peers has rpc_address, system.peers_v2 has native_address
        let rpc_address =
            Self::inet(row, "rpc_address").or_else(|| Self::inet(row, "native_address"))?;

        // use the default port if no port information was found in the row
        let rpc_port = Self::port(row, "rpc_port")
            .or_else(|| Self::port(row, "native_port"))
            .unwrap_or_else(|| control_addr.port());

        let rpc_address = SocketAddr::new(rpc_address, rpc_port);

        // if the peer is actually the control node, ignore that peer as it is likely a
        // misconfiguration problem
        if rpc_address == control_addr {
            warn!(
                node = %rpc_address,
                control = %control_addr,
                "Control node has itself as a peer, thus will be ignored. This is likely due to a \
                misconfiguration; please verify your rpc_address configuration on all nodes in your \
                cluster."
            );

            None
        } else {
            Some(rpc_address)
        }
    }

    fn has_value(row: &Row, name: &str) -> bool {
        row.contains_column(name) && !row.is_null_by_name(name)
    }

    fn is_peer_row_valid(row: &Row) -> bool {
        let has_peers_rpc_address = Self::has_value(row, "rpc_address");
        let has_peers_v2_rpc_address =
            Self::has_value(row, "native_address") && Self::has_value(row, "native_port");
        let has_rpc_address = has_peers_rpc_address || has_peers_v2_rpc_address;

        has_rpc_address
            && Self::has_value(row, "host_id")
            && Self::has_value(row, "data_center")
            && Self::has_value(row, "rack")
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tokio::sync::{broadcast, watch};
    use uuid::Uuid;

    use crate::cluster::cluster_metadata_manager::ClusterMetadataManager;
    use crate::cluster::connection_manager::MockConnectionManager;
    use crate::cluster::connection_pool::ConnectionPoolFactory;
    use crate::cluster::topology::{Node, NodeDistance, NodeState};
    use crate::cluster::SessionContext;
    use crate::error::{Error, Result};
    use crate::events::{
        SchemaChange, SchemaChangeOptions, SchemaChangeTarget, SchemaChangeType, ServerEvent,
        StatusChange, StatusChangeType, TopologyEvent,
    };
    use crate::frame::message_error::{AdditionalErrorInfo, ErrorBody};
    use crate::frame::message_request::RequestBody;
    use crate::frame::message_result::{BodyResResultRows, ColSpec, ResResultBody};
    use crate::frame::{Frame, Version};
    use crate::future::BoxFuture;
    use crate::load_balancing::node_distance_evaluator::AllLocalNodeDistanceEvaluator;
    use crate::retry::NeverReconnectionPolicy;
    use crate::transport::CqlTransport;
    use crate::types::{CInet, CqlValue, TypeSpec};

    const CONTROL_PORT: u16 = 9042;

    fn addr(last_octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), CONTROL_PORT)
    }

    fn text(value: &str) -> Option<CqlValue> {
        Some(CqlValue::Text(value.into()))
    }

    // serves system tables from mutable contents
    struct SystemTablesTransport {
        local_host_id: Uuid,
        peers: Mutex<Vec<(Uuid, SocketAddr)>>,
        keyspaces: Mutex<Vec<(String, i32)>>,
        queries: Mutex<Vec<String>>,
    }

    impl SystemTablesTransport {
        fn new(peers: Vec<(Uuid, SocketAddr)>) -> Self {
            SystemTablesTransport {
                local_host_id: Uuid::new_v4(),
                peers: Mutex::new(peers),
                keyspaces: Mutex::new(vec![]),
                queries: Mutex::new(vec![]),
            }
        }

        fn rows(
            columns: &[(&str, TypeSpec)],
            values: Vec<Vec<Option<CqlValue>>>,
        ) -> Result<Frame> {
            let col_specs = columns
                .iter()
                .map(|(name, type_spec)| ColSpec::new(None, (*name).into(), type_spec.clone()))
                .collect();

            BodyResResultRows::from_values(col_specs, values).map(|rows| {
                Frame::new_res_result(Version::V4, 0, &ResResultBody::Rows(rows))
            })
        }

        fn node_columns(address_column: &'static str) -> Vec<(&'static str, TypeSpec)> {
            vec![
                ("host_id", TypeSpec::Uuid),
                (address_column, TypeSpec::Inet),
                ("data_center", TypeSpec::Varchar),
                ("rack", TypeSpec::Varchar),
            ]
        }

        fn answer(&self, query: &str, values: Vec<String>) -> Result<Frame> {
            if query == "SELECT * FROM system.local" {
                Self::rows(
                    &Self::node_columns("rpc_address"),
                    vec![vec![
                        Some(CqlValue::Uuid(self.local_host_id)),
                        Some(CqlValue::Inet(addr(1).ip())),
                        text("dc1"),
                        text("rack1"),
                    ]],
                )
            } else if query == "SELECT * FROM system.peers_v2" {
                Err(Error::Server {
                    body: ErrorBody {
                        error_code: 0x2200,
                        message: "unconfigured table peers_v2".into(),
                        additional_info: AdditionalErrorInfo::Invalid,
                    },
                    addr: addr(1),
                })
            } else if query == "SELECT * FROM system.peers" {
                let peers = self.peers.lock().unwrap().clone();
                Self::rows(
                    &Self::node_columns("rpc_address"),
                    peers
                        .into_iter()
                        .map(|(host_id, addr)| {
                            vec![
                                Some(CqlValue::Uuid(host_id)),
                                Some(CqlValue::Inet(addr.ip())),
                                text("dc1"),
                                text("rack1"),
                            ]
                        })
                        .collect(),
                )
            } else if query.starts_with("SELECT * FROM system_schema.keyspaces") {
                let keyspaces = self.keyspaces.lock().unwrap().clone();
                Self::rows(
                    &[
                        ("keyspace_name", TypeSpec::Varchar),
                        (
                            "replication",
                            TypeSpec::Map(
                                Box::new(TypeSpec::Varchar),
                                Box::new(TypeSpec::Varchar),
                            ),
                        ),
                    ],
                    keyspaces
                        .into_iter()
                        .filter(|(name, _)| values.is_empty() || values.contains(name))
                        .map(|(name, replication_factor)| {
                            vec![
                                text(&name),
                                Some(CqlValue::Map(vec![
                                    (
                                        CqlValue::Text("class".into()),
                                        CqlValue::Text("SimpleStrategy".into()),
                                    ),
                                    (
                                        CqlValue::Text("replication_factor".into()),
                                        CqlValue::Text(replication_factor.to_string()),
                                    ),
                                ])),
                            ]
                        })
                        .collect(),
                )
            } else if query.starts_with("SELECT * FROM system_schema.") {
                Self::rows(&[("keyspace_name", TypeSpec::Varchar)], vec![])
            } else {
                Err(Error::General(format!("Unexpected query: {query}")))
            }
        }
    }

    impl CqlTransport for SystemTablesTransport {
        fn write_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Frame>> {
            let response = match frame.request_body() {
                Ok(RequestBody::Query(query)) => {
                    self.queries.lock().unwrap().push(query.query.clone());

                    let values = query
                        .query_params
                        .values
                        .iter()
                        .flat_map(|values| match values {
                            crate::query::QueryValues::SimpleValues(values) => values.clone(),
                            _ => vec![],
                        })
                        .filter_map(|value| {
                            value
                                .as_slice()
                                .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        })
                        .collect();

                    self.answer(&query.query, values)
                }
                Ok(body) => Err(Error::General(format!("Unexpected request: {body:?}"))),
                Err(error) => Err(error),
            };

            async move { response }.boxed()
        }

        fn is_broken(&self) -> bool {
            false
        }

        fn address(&self) -> SocketAddr {
            addr(1)
        }

        fn in_flight(&self) -> usize {
            0
        }

        fn pending_slots(&self) -> usize {
            0
        }

        fn max_in_flight(&self) -> usize {
            1
        }

        fn last_used(&self) -> Instant {
            Instant::now()
        }

        fn close(&self) {}
    }

    type TestManager =
        ClusterMetadataManager<SystemTablesTransport, MockConnectionManager<SystemTablesTransport>>;

    fn manager(
        transport: Arc<SystemTablesTransport>,
    ) -> (TestManager, broadcast::Receiver<TopologyEvent>) {
        let mut connection_manager = MockConnectionManager::new();
        connection_manager
            .expect_version()
            .return_const(Version::V4);

        let (_, keyspace_receiver) = watch::channel(None);
        let factory = Arc::new(ConnectionPoolFactory::new(
            Default::default(),
            connection_manager,
            keyspace_receiver,
            Arc::new(NeverReconnectionPolicy),
        ));

        let session_context = Arc::new(SessionContext::default());
        session_context
            .control_connection_transport
            .store(Some(transport));

        let contact_points = vec![Arc::new(Node::new_contact_point(factory.clone(), addr(1)))];

        let (topology_event_sender, topology_event_receiver) = broadcast::channel(16);

        (
            ClusterMetadataManager::new(
                contact_points,
                factory,
                session_context,
                Box::new(AllLocalNodeDistanceEvaluator),
                topology_event_sender,
            ),
            topology_event_receiver,
        )
    }

    #[tokio::test]
    async fn should_discover_local_node_and_peers() {
        let peer_id = Uuid::new_v4();
        let transport = Arc::new(SystemTablesTransport::new(vec![(peer_id, addr(2))]));
        let (manager, _) = manager(transport.clone());

        manager.refresh_metadata().await.unwrap();

        let metadata = manager.metadata();
        assert_eq!(metadata.nodes().len(), 2);

        let local = metadata
            .find_node_by_host_id(&transport.local_host_id)
            .unwrap();
        assert_eq!(local.broadcast_rpc_address(), addr(1));
        assert_eq!(local.datacenter(), "dc1");
        assert_eq!(local.distance(), NodeDistance::Local);

        let peer = metadata.find_node_by_host_id(&peer_id).unwrap();
        assert_eq!(peer.broadcast_rpc_address(), addr(2));

        let queries = transport.queries.lock().unwrap();
        assert!(queries.contains(&"SELECT * FROM system.peers_v2".to_string()));
        assert!(queries.contains(&"SELECT * FROM system.peers".to_string()));
    }

    #[tokio::test]
    async fn should_ignore_control_node_as_peer() {
        let transport = Arc::new(SystemTablesTransport::new(vec![(Uuid::new_v4(), addr(1))]));
        let (manager, _) = manager(transport);

        manager.refresh_metadata().await.unwrap();

        assert_eq!(manager.metadata().nodes().len(), 1);
    }

    #[tokio::test]
    async fn should_apply_status_changes() {
        let transport = Arc::new(SystemTablesTransport::new(vec![(Uuid::new_v4(), addr(2))]));
        let (manager, mut events) = manager(transport);

        manager.refresh_metadata().await.unwrap();

        manager
            .process_event(ServerEvent::StatusChange(StatusChange {
                change_type: StatusChangeType::Down,
                addr: CInet::new(addr(2)),
            }))
            .await
            .unwrap();

        let node = manager.metadata().find_node_by_rpc_address(addr(2)).unwrap();
        assert_eq!(node.state(), NodeState::Down);
        assert!(node.is_ignored());
        assert_eq!(events.recv().await.unwrap(), TopologyEvent::NodeDown(addr(2)));

        manager
            .process_event(ServerEvent::StatusChange(StatusChange {
                change_type: StatusChangeType::Up,
                addr: CInet::new(addr(2)),
            }))
            .await
            .unwrap();

        assert_eq!(node.state(), NodeState::Up);
        assert_eq!(events.recv().await.unwrap(), TopologyEvent::NodeUp(addr(2)));
    }

    #[tokio::test]
    async fn should_refresh_nodes_on_topology_change() {
        let transport = Arc::new(SystemTablesTransport::new(vec![(Uuid::new_v4(), addr(2))]));
        let (manager, mut events) = manager(transport.clone());

        manager.refresh_metadata().await.unwrap();

        *transport.peers.lock().unwrap() = vec![(Uuid::new_v4(), addr(3))];

        manager
            .process_event(ServerEvent::TopologyChange(crate::events::TopologyChange {
                change_type: crate::events::TopologyChangeType::NewNode,
                addr: CInet::new(addr(3)),
            }))
            .await
            .unwrap();

        let metadata = manager.metadata();
        assert!(metadata.find_node_by_rpc_address(addr(2)).is_none());
        assert!(metadata.find_node_by_rpc_address(addr(3)).is_some());

        assert_eq!(
            events.recv().await.unwrap(),
            TopologyEvent::NodeRemoved(addr(2))
        );
        assert_eq!(events.recv().await.unwrap(), TopologyEvent::NodeAdded(addr(3)));
    }

    #[tokio::test]
    async fn should_refresh_only_changed_keyspace() {
        let transport = Arc::new(SystemTablesTransport::new(vec![]));
        *transport.keyspaces.lock().unwrap() = vec![("ks1".into(), 1), ("ks2".into(), 1)];

        let (manager, _) = manager(transport.clone());
        manager.refresh_metadata().await.unwrap();

        let old_metadata = manager.metadata();
        assert_eq!(old_metadata.keyspaces().len(), 2);

        *transport.keyspaces.lock().unwrap() = vec![("ks1".into(), 3), ("ks2".into(), 1)];
        transport.queries.lock().unwrap().clear();

        manager
            .process_event(ServerEvent::SchemaChange(SchemaChange {
                change_type: SchemaChangeType::Updated,
                target: SchemaChangeTarget::Keyspace,
                options: SchemaChangeOptions::Keyspace("ks1".into()),
            }))
            .await
            .unwrap();

        let metadata = manager.metadata();
        assert_eq!(
            metadata.keyspace("ks1").unwrap().replication_strategy,
            crate::cluster::topology::ReplicationStrategy::SimpleStrategy {
                replication_factor: 3
            }
        );
        assert!(Arc::ptr_eq(
            metadata.keyspace("ks2").unwrap(),
            old_metadata.keyspace("ks2").unwrap()
        ));

        let queries = transport.queries.lock().unwrap();
        assert!(queries
            .iter()
            .all(|query| query.ends_with("WHERE keyspace_name = ?")));
    }

    #[tokio::test]
    async fn should_remove_dropped_keyspace() {
        let transport = Arc::new(SystemTablesTransport::new(vec![]));
        *transport.keyspaces.lock().unwrap() = vec![("ks1".into(), 1), ("ks2".into(), 1)];

        let (manager, _) = manager(transport.clone());
        manager.refresh_metadata().await.unwrap();

        manager
            .process_event(ServerEvent::SchemaChange(SchemaChange {
                change_type: SchemaChangeType::Dropped,
                target: SchemaChangeTarget::Keyspace,
                options: SchemaChangeOptions::Keyspace("ks1".into()),
            }))
            .await
            .unwrap();

        let metadata = manager.metadata();
        assert!(metadata.keyspace("ks1").is_none());
        assert!(metadata.keyspace("ks2").is_some());
    }
}
