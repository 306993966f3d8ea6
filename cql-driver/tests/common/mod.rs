//! In-process fake nodes speaking the native protocol. Each node serves just enough of the system
//! tables for the driver to discover the cluster, and answers every other query with an empty
//! result, unless told to misbehave.
#![allow(dead_code)]

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cql_driver::cluster::session::TcpSessionBuilder;
use cql_driver::cluster::{NodeTcpConfigBuilder, TcpConnectionManager};
use cql_driver::events::{
    SchemaChange, SchemaChangeOptions, SchemaChangeTarget, SchemaChangeType, ServerEvent,
    StatusChange, StatusChangeType,
};
use cql_driver::frame::message_error::{AdditionalErrorInfo, ErrorBody, UnpreparedError};
use cql_driver::frame::message_request::RequestBody;
use cql_driver::frame::message_result::{
    BodyResResultPrepared, BodyResResultRows, BodyResResultSetKeyspace, ColSpec, PreparedMetadata,
    ResResultBody, RowsMetadata,
};
use cql_driver::frame::message_supported::BodyResSupported;
use cql_driver::frame::{Frame, StreamId, Version};
use cql_driver::frame_parser::parse_frame;
use cql_driver::load_balancing::RoundRobinLoadBalancingStrategy;
use cql_driver::query::{QueryParams, QueryValues};
use cql_driver::retry::ConstantReconnectionPolicy;
use cql_driver::transport::TransportTcp;
use cql_driver::types::{CBytesShort, CInet, CqlValue, TypeSpec};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

pub const DATACENTER: &str = "dc1";
pub const RACK: &str = "rack1";

pub type TestLoadBalancing = RoundRobinLoadBalancingStrategy<TransportTcp, TcpConnectionManager>;

const OVERLOADED_ERROR_CODE: i32 = 0x1001;
const UNPREPARED_ERROR_CODE: i32 = 0x2500;

struct NodeState {
    host_id: Uuid,
    peers: Mutex<Vec<(Uuid, SocketAddr)>>,
    keyspaces: Mutex<Vec<String>>,
    prepared: Mutex<HashSet<Vec<u8>>>,
    queries: Mutex<Vec<String>>,
    overloaded: AtomicBool,
    response_delay: Mutex<Duration>,
    event_senders: Mutex<Vec<(Version, UnboundedSender<Vec<u8>>)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeState {
    fn new() -> Self {
        NodeState {
            host_id: Uuid::new_v4(),
            peers: Mutex::new(vec![]),
            keyspaces: Mutex::new(vec![]),
            prepared: Mutex::new(HashSet::new()),
            queries: Mutex::new(vec![]),
            overloaded: AtomicBool::new(false),
            response_delay: Mutex::new(Duration::ZERO),
            event_senders: Mutex::new(vec![]),
            tasks: Mutex::new(vec![]),
        }
    }

    async fn respond(&self, request: Frame, connection: &UnboundedSender<Vec<u8>>) -> Option<Frame> {
        let version = request.version;
        let stream = request.stream;

        let response = match request.request_body().ok()? {
            RequestBody::Startup(_) => Frame::new_res_ready(version, stream),
            RequestBody::Options(_) => {
                Frame::new_res_supported(version, stream, &BodyResSupported::default())
            }
            RequestBody::Register(_) => {
                self.event_senders
                    .lock()
                    .unwrap()
                    .push((version, connection.clone()));

                Frame::new_res_ready(version, stream)
            }
            RequestBody::Query(query) => {
                self.answer_query(&query.query, &query.query_params, version, stream)
                    .await
            }
            RequestBody::Prepare(prepare) => {
                self.prepared
                    .lock()
                    .unwrap()
                    .insert(prepare.query.as_bytes().to_vec());

                let prepared = BodyResResultPrepared {
                    id: CBytesShort::new(prepare.query.into_bytes()),
                    metadata: PreparedMetadata::new(vec![], vec![]),
                    result_metadata: RowsMetadata::from_col_specs(vec![]),
                };

                Frame::new_res_result(version, stream, &ResResultBody::Prepared(prepared))
            }
            RequestBody::Execute(execute) => {
                let id = execute.id.as_slice().unwrap_or_default().to_vec();
                if self.prepared.lock().unwrap().contains(&id) {
                    let query = String::from_utf8_lossy(&id).to_string();
                    self.answer_user_query(query, version, stream).await
                } else {
                    Frame::new_res_error(
                        version,
                        stream,
                        &ErrorBody {
                            error_code: UNPREPARED_ERROR_CODE,
                            message: "Prepared statement not found".into(),
                            additional_info: AdditionalErrorInfo::Unprepared(UnpreparedError {
                                id: execute.id,
                            }),
                        },
                    )
                }
            }
            RequestBody::AuthResponse(_) => return None,
        };

        Some(response)
    }

    async fn answer_query(
        &self,
        query: &str,
        params: &QueryParams,
        version: Version,
        stream: StreamId,
    ) -> Frame {
        if query == "SELECT * FROM system.local" {
            rows(
                version,
                stream,
                &[
                    ("host_id", TypeSpec::Uuid),
                    ("rpc_address", TypeSpec::Inet),
                    ("data_center", TypeSpec::Varchar),
                    ("rack", TypeSpec::Varchar),
                ],
                vec![vec![
                    Some(CqlValue::Uuid(self.host_id)),
                    Some(CqlValue::Inet(IpAddr::from([127, 0, 0, 1]))),
                    text(DATACENTER),
                    text(RACK),
                ]],
            )
        } else if query == "SELECT * FROM system.peers_v2" {
            let peers = self.peers.lock().unwrap().clone();
            rows(
                version,
                stream,
                &[
                    ("host_id", TypeSpec::Uuid),
                    ("peer", TypeSpec::Inet),
                    ("native_address", TypeSpec::Inet),
                    ("native_port", TypeSpec::Int),
                    ("data_center", TypeSpec::Varchar),
                    ("rack", TypeSpec::Varchar),
                ],
                peers
                    .into_iter()
                    .map(|(host_id, addr)| {
                        vec![
                            Some(CqlValue::Uuid(host_id)),
                            Some(CqlValue::Inet(addr.ip())),
                            Some(CqlValue::Inet(addr.ip())),
                            Some(CqlValue::Int(i32::from(addr.port()))),
                            text(DATACENTER),
                            text(RACK),
                        ]
                    })
                    .collect(),
            )
        } else if query.starts_with("SELECT * FROM system_schema.keyspaces") {
            let filter = bound_texts(params);
            let keyspaces = self.keyspaces.lock().unwrap().clone();
            rows(
                version,
                stream,
                &[
                    ("keyspace_name", TypeSpec::Varchar),
                    ("durable_writes", TypeSpec::Boolean),
                    (
                        "replication",
                        TypeSpec::Map(Box::new(TypeSpec::Varchar), Box::new(TypeSpec::Varchar)),
                    ),
                ],
                keyspaces
                    .into_iter()
                    .filter(|name| filter.is_empty() || filter.contains(name))
                    .map(|name| {
                        vec![
                            text(&name),
                            Some(CqlValue::Boolean(true)),
                            Some(CqlValue::Map(vec![
                                (
                                    CqlValue::Text("class".into()),
                                    CqlValue::Text(
                                        "org.apache.cassandra.locator.SimpleStrategy".into(),
                                    ),
                                ),
                                (
                                    CqlValue::Text("replication_factor".into()),
                                    CqlValue::Text("1".into()),
                                ),
                            ])),
                        ]
                    })
                    .collect(),
            )
        } else if query.starts_with("SELECT * FROM system_schema.") {
            rows(version, stream, &[("keyspace_name", TypeSpec::Varchar)], vec![])
        } else if let Some(keyspace) = query.strip_prefix("USE ") {
            let keyspace = keyspace.trim_matches(|c| c == '"' || c == ';' || c == ' ');
            Frame::new_res_result(
                version,
                stream,
                &ResResultBody::SetKeyspace(BodyResResultSetKeyspace::new(keyspace.into())),
            )
        } else {
            self.answer_user_query(query.into(), version, stream).await
        }
    }

    async fn answer_user_query(&self, query: String, version: Version, stream: StreamId) -> Frame {
        self.queries.lock().unwrap().push(query);

        let delay = *self.response_delay.lock().unwrap();
        if !delay.is_zero() {
            sleep(delay).await;
        }

        if self.overloaded.load(Ordering::SeqCst) {
            Frame::new_res_error(
                version,
                stream,
                &ErrorBody {
                    error_code: OVERLOADED_ERROR_CODE,
                    message: "Too many requests".into(),
                    additional_info: AdditionalErrorInfo::Overloaded,
                },
            )
        } else {
            Frame::new_res_result(version, stream, &ResResultBody::Void)
        }
    }
}

fn text(value: &str) -> Option<CqlValue> {
    Some(CqlValue::Text(value.into()))
}

fn rows(
    version: Version,
    stream: StreamId,
    columns: &[(&str, TypeSpec)],
    values: Vec<Vec<Option<CqlValue>>>,
) -> Frame {
    let col_specs = columns
        .iter()
        .map(|(name, type_spec)| ColSpec::new(None, (*name).into(), type_spec.clone()))
        .collect();

    let body = BodyResResultRows::from_values(col_specs, values).unwrap();
    Frame::new_res_result(version, stream, &ResResultBody::Rows(body))
}

fn bound_texts(params: &QueryParams) -> Vec<String> {
    match &params.values {
        Some(QueryValues::SimpleValues(values)) => values
            .iter()
            .filter_map(|value| value.as_slice())
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .collect(),
        _ => vec![],
    }
}

fn serve_connection(stream: TcpStream, state: Arc<NodeState>) {
    let (mut reader, mut writer) = stream.into_split();
    let (sender, mut receiver) = unbounded_channel::<Vec<u8>>();

    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = receiver.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let reader_state = state.clone();
    let reader_task = tokio::spawn(async move {
        while let Ok(request) = parse_frame(&mut reader).await {
            let state = reader_state.clone();
            let sender = sender.clone();

            // requests are answered concurrently, so a slow one does not hold up the rest
            tokio::spawn(async move {
                if let Some(response) = state.respond(request, &sender).await {
                    let _ = sender.send(response.encode());
                }
            });
        }
    });

    let mut tasks = state.tasks.lock().unwrap();
    tasks.push(writer_task);
    tasks.push(reader_task);
}

/// A single fake node listening on a random local port.
pub struct FakeNode {
    addr: SocketAddr,
    state: Arc<NodeState>,
}

impl FakeNode {
    pub async fn start() -> FakeNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(NodeState::new());

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                serve_connection(stream, accept_state.clone());
            }
        });

        state.tasks.lock().unwrap().push(accept_task);

        FakeNode { addr, state }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host_id(&self) -> Uuid {
        self.state.host_id
    }

    pub fn set_peers(&self, peers: &[&FakeNode]) {
        *self.state.peers.lock().unwrap() = peers
            .iter()
            .map(|peer| (peer.host_id(), peer.addr()))
            .collect();
    }

    pub fn add_keyspace(&self, keyspace: &str) {
        self.state.keyspaces.lock().unwrap().push(keyspace.into());
    }

    pub fn set_overloaded(&self, overloaded: bool) {
        self.state.overloaded.store(overloaded, Ordering::SeqCst);
    }

    pub fn set_response_delay(&self, delay: Duration) {
        *self.state.response_delay.lock().unwrap() = delay;
    }

    /// Makes the node forget every statement prepared on it so far.
    pub fn forget_prepared(&self) {
        self.state.prepared.lock().unwrap().clear();
    }

    /// Queries other than system table reads and keyspace switches, in arrival order.
    pub fn user_queries(&self) -> Vec<String> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn has_event_listeners(&self) -> bool {
        !self.state.event_senders.lock().unwrap().is_empty()
    }

    /// Pushes an event to every connection registered for events.
    pub fn push_event(&self, event: ServerEvent) {
        self.state
            .event_senders
            .lock()
            .unwrap()
            .retain(|(version, sender)| {
                sender
                    .send(Frame::new_res_event(*version, event.clone()).encode())
                    .is_ok()
            });
    }

    /// Closes the listener and every open connection.
    pub async fn stop(&self) {
        for task in self.abort_tasks() {
            let _ = task.await;
        }
    }

    fn abort_tasks(&self) -> Vec<JoinHandle<()>> {
        self.state.event_senders.lock().unwrap().clear();

        let tasks = self.state.tasks.lock().unwrap().drain(..).collect::<Vec<_>>();
        for task in &tasks {
            task.abort();
        }

        tasks
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Starts `size` nodes which know about each other.
pub async fn start_cluster(size: usize) -> Vec<FakeNode> {
    let mut nodes = Vec::with_capacity(size);
    for _ in 0..size {
        nodes.push(FakeNode::start().await);
    }

    for node in &nodes {
        let peers = nodes
            .iter()
            .filter(|peer| peer.addr() != node.addr())
            .collect::<Vec<_>>();
        node.set_peers(&peers);
    }

    nodes
}

/// Session builder with the given node as the only contact point.
pub async fn session_builder(contact_point: &FakeNode) -> TcpSessionBuilder<TestLoadBalancing> {
    let config = NodeTcpConfigBuilder::new()
        .with_contact_point(contact_point.addr().into())
        .with_heartbeat_interval(None)
        .build()
        .await
        .unwrap();

    TcpSessionBuilder::new(RoundRobinLoadBalancingStrategy::new(), config).with_reconnection_policy(
        Arc::new(ConstantReconnectionPolicy::new(Duration::from_millis(50))),
    )
}

pub fn status_change(change_type: StatusChangeType, addr: SocketAddr) -> ServerEvent {
    ServerEvent::StatusChange(StatusChange {
        change_type,
        addr: CInet::new(addr),
    })
}

pub fn keyspace_change(change_type: SchemaChangeType, keyspace: &str) -> ServerEvent {
    ServerEvent::SchemaChange(SchemaChange {
        change_type,
        target: SchemaChangeTarget::Keyspace,
        options: SchemaChangeOptions::Keyspace(keyspace.into()),
    })
}

/// Polls the condition until it holds, failing the test after a few seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
