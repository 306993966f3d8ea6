use derivative::Derivative;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{self, Receiver};
use tokio::task::JoinHandle;
use tracing::*;

use crate::cluster::connection_pool::ConnectionPoolFactory;
use crate::cluster::control_connection::ControlConnection;
use crate::cluster::send_frame::{send_frame, ExecutionOptions};
use crate::cluster::topology::Node;
use crate::cluster::{
    ClusterMetadata, ClusterMetadataManager, ConnectionManager, ConnectionPoolConfig,
    KeyspaceHolder, NodeTcpConfig, SessionContext, TcpConnectionManager,
};
use crate::error::{Error, Result};
use crate::events::TopologyEvent;
use crate::frame::message_error::AdditionalErrorInfo;
use crate::frame::Frame;
use crate::load_balancing::node_distance_evaluator::{
    AllLocalNodeDistanceEvaluator, NodeDistanceEvaluator,
};
use crate::load_balancing::{
    InitializingWrapperLoadBalancingStrategy, LoadBalancingStrategy, QueryPlan, Request,
};
use crate::query::{PreparedQuery, QueryValues};
use crate::retry::{
    DefaultRetryPolicy, ExponentialReconnectionPolicy, ReconnectionPolicy, RetryPolicy,
};
use crate::speculative_execution::SpeculativeExecutionPolicy;
use crate::statement::{StatementParams, StatementParamsBuilder};
use crate::transport::{CqlTransport, TransportTcp};

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Session using plain TCP connections.
pub type TcpSession<LB> = Session<TransportTcp, TcpConnectionManager, LB>;

/// Session holding one pool of authorized connections per node, and a control connection keeping
/// cluster metadata up to date. Dropping the session stops its background tasks.
pub struct Session<
    T: CqlTransport + 'static,
    CM: ConnectionManager<T> + 'static,
    LB: LoadBalancingStrategy<T, CM> + Send + Sync + 'static,
> {
    load_balancing: Arc<InitializingWrapperLoadBalancingStrategy<T, CM, LB>>,
    keyspace_holder: Arc<KeyspaceHolder>,
    retry_policy: Box<dyn RetryPolicy + Send + Sync>,
    speculative_execution_policy: Option<Box<dyn SpeculativeExecutionPolicy + Send + Sync>>,
    request_timeout: Duration,
    cluster_metadata_manager: Arc<ClusterMetadataManager<T, CM>>,
    topology_event_sender: broadcast::Sender<TopologyEvent>,
    control_connection_handle: JoinHandle<()>,
}

impl<
        T: CqlTransport + 'static,
        CM: ConnectionManager<T> + 'static,
        LB: LoadBalancingStrategy<T, CM> + Send + Sync + 'static,
    > Drop for Session<T, CM, LB>
{
    fn drop(&mut self) {
        self.control_connection_handle.abort();
    }
}

impl<
        T: CqlTransport + 'static,
        CM: ConnectionManager<T> + 'static,
        LB: LoadBalancingStrategy<T, CM> + Send + Sync + 'static,
    > Session<T, CM, LB>
{
    /// Executes given frame, routing it according to the load balancing strategy and applying
    /// retry and speculative execution policies. Returns the first successful response.
    pub async fn execute_request(&self, frame: Frame, params: &StatementParams) -> Result<Frame> {
        let query_plan = self.statement_query_plan(params);
        self.send_with_plan(&frame, params, query_plan).await
    }

    async fn send_with_plan(
        &self,
        frame: &Frame,
        params: &StatementParams,
        query_plan: QueryPlan<T, CM>,
    ) -> Result<Frame> {
        let options = ExecutionOptions {
            is_idempotent: params.is_idempotent,
            timeout: params.timeout.unwrap_or(self.request_timeout),
            deadline: params.deadline,
            retry_policy: params
                .retry_policy
                .as_deref()
                .unwrap_or(self.retry_policy.as_ref()),
            speculative_execution_policy: params
                .speculative_execution_policy
                .as_deref()
                .or(self.speculative_execution_policy.as_deref()),
        };

        send_frame(frame, query_plan, &options).await
    }

    fn statement_query_plan(&self, params: &StatementParams) -> QueryPlan<T, CM> {
        let current_keyspace = self.keyspace_holder.current_keyspace();
        let request = Request::new(
            params
                .keyspace
                .as_deref()
                .or_else(|| current_keyspace.as_ref().map(|keyspace| keyspace.as_str())),
            Some(params.query_params.consistency),
        );

        self.query_plan(Some(request))
    }

    /// Executes a query with default parameters.
    #[inline]
    pub async fn query<Q: ToString>(&self, query: Q) -> Result<Frame> {
        self.query_with_params(query, StatementParamsBuilder::new().build())
            .await
    }

    /// Executes a query with bound values and default parameters.
    #[inline]
    pub async fn query_with_values<Q: ToString, V: Into<QueryValues>>(
        &self,
        query: Q,
        values: V,
    ) -> Result<Frame> {
        self.query_with_params(
            query,
            StatementParamsBuilder::new()
                .with_values(values.into())
                .build(),
        )
        .await
    }

    /// Executes a query with custom parameters. A successful `USE` query changes the keyspace of
    /// all connections.
    pub async fn query_with_params<Q: ToString>(
        &self,
        query: Q,
        params: StatementParams,
    ) -> Result<Frame> {
        let frame = Frame::new_req_query(
            query.to_string(),
            params.query_params.clone(),
            self.cluster_metadata_manager.protocol_version(),
        );

        let response = self.execute_request(frame, &params).await?;
        self.update_keyspace(&response);

        Ok(response)
    }

    /// Prepares a query for later execution.
    pub async fn prepare<Q: ToString>(&self, query: Q) -> Result<PreparedQuery> {
        let params = StatementParamsBuilder::new().idempotent(true).build();
        let query_plan = self.statement_query_plan(&params);

        self.prepare_with_plan(query.to_string(), &params, query_plan)
            .await
    }

    async fn prepare_with_plan(
        &self,
        query: String,
        params: &StatementParams,
        query_plan: QueryPlan<T, CM>,
    ) -> Result<PreparedQuery> {
        let frame = Frame::new_req_prepare(
            query.clone(),
            self.cluster_metadata_manager.protocol_version(),
        );

        let prepared = self
            .send_with_plan(&frame, params, query_plan)
            .await?
            .response_body()?
            .into_prepared()
            .ok_or_else(|| Error::General("Expected prepared result!".into()))?;

        Ok(PreparedQuery::new(query, prepared))
    }

    /// Executes a prepared query with bound values and default parameters.
    #[inline]
    pub async fn execute_with_values<V: Into<QueryValues>>(
        &self,
        prepared: &PreparedQuery,
        values: V,
    ) -> Result<Frame> {
        self.execute(
            prepared,
            StatementParamsBuilder::new()
                .with_values(values.into())
                .build(),
        )
        .await
    }

    /// Executes a prepared query. If the node serving the request does not know the statement, it
    /// is prepared again on that node and executed once more, starting with the same node.
    pub async fn execute(&self, prepared: &PreparedQuery, params: StatementParams) -> Result<Frame> {
        let mut params = params;
        if params.keyspace.is_none() {
            params.keyspace.clone_from(&prepared.keyspace);
        }

        let query_plan = self.statement_query_plan(&params);
        let result = self
            .execute_prepared_id(prepared, &params, query_plan)
            .await;

        let Some(addr) = unprepared_node(&result) else {
            return result;
        };

        debug!(query = %prepared.query, %addr, "Statement unknown to node. Preparing again.");

        let mut query_plan = self.statement_query_plan(&params);
        if let Some(position) = query_plan
            .iter()
            .position(|node| node.broadcast_rpc_address() == addr)
        {
            query_plan[..=position].rotate_right(1);
        }

        let prepare_params = StatementParamsBuilder::new().idempotent(true).build();
        let reprepared = self
            .prepare_with_plan(prepared.query.clone(), &prepare_params, query_plan.clone())
            .await?;

        self.execute_prepared_id(&reprepared, &params, query_plan)
            .await
    }

    async fn execute_prepared_id(
        &self,
        prepared: &PreparedQuery,
        params: &StatementParams,
        query_plan: QueryPlan<T, CM>,
    ) -> Result<Frame> {
        let frame = Frame::new_req_execute(
            prepared.id.clone(),
            params.query_params.clone(),
            self.cluster_metadata_manager.protocol_version(),
        );

        let response = self.send_with_plan(&frame, params, query_plan).await?;
        self.update_keyspace(&response);

        Ok(response)
    }

    fn update_keyspace(&self, response: &Frame) {
        if let Some(set_keyspace) = response
            .response_body()
            .ok()
            .and_then(|body| body.into_set_keyspace())
        {
            debug!(keyspace = %set_keyspace.body, "Changing session keyspace.");
            self.keyspace_holder
                .update_current_keyspace(set_keyspace.body);
        }
    }

    /// Returns current cluster metadata snapshot.
    #[inline]
    pub fn cluster_metadata(&self) -> Arc<ClusterMetadata<T, CM>> {
        self.cluster_metadata_manager.metadata()
    }

    /// Returns the keyspace set by the last `USE` query, if any.
    #[inline]
    pub fn current_keyspace(&self) -> Option<Arc<String>> {
        self.keyspace_holder.current_keyspace()
    }

    /// Returns query plan for given request. If no request is given, return a generic plan for
    /// establishing connection(s) to node(s).
    #[inline]
    pub fn query_plan(&self, request: Option<Request>) -> QueryPlan<T, CM> {
        self.load_balancing
            .query_plan(request, self.cluster_metadata().as_ref())
    }

    /// Creates a new receiver of topology events: nodes going up or down, joining or leaving the
    /// cluster.
    #[inline]
    pub fn subscribe_topology_changes(&self) -> Receiver<TopologyEvent> {
        self.topology_event_sender.subscribe()
    }

    /// Calls given callback for every topology event, until the session is dropped. Events are
    /// skipped if the callback can't keep up.
    pub fn subscribe_topology_changes_with<F: Fn(TopologyEvent) + Send + 'static>(
        &self,
        callback: F,
    ) -> JoinHandle<()> {
        let mut receiver = self.subscribe_topology_changes();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Topology event callback is lagging behind.");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn connect(
        load_balancing: LB,
        connection_manager: CM,
        contact_points: Vec<SocketAddr>,
        keyspace_holder: Arc<KeyspaceHolder>,
        retry_policy: Box<dyn RetryPolicy + Send + Sync>,
        speculative_execution_policy: Option<Box<dyn SpeculativeExecutionPolicy + Send + Sync>>,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
        node_distance_evaluator: Box<dyn NodeDistanceEvaluator + Send + Sync>,
        connection_pool_config: ConnectionPoolConfig,
        event_channel_capacity: usize,
        request_timeout: Duration,
    ) -> Result<Self> {
        if contact_points.is_empty() {
            return Err("No contact points given!".into());
        }

        let connection_pool_factory = Arc::new(ConnectionPoolFactory::new(
            connection_pool_config,
            connection_manager,
            keyspace_holder.keyspace_receiver(),
            reconnection_policy.clone(),
        ));

        let contact_points: Vec<_> = contact_points
            .into_iter()
            .map(|addr| {
                Arc::new(Node::new_contact_point(
                    connection_pool_factory.clone(),
                    addr,
                ))
            })
            .collect();

        let (topology_event_sender, _) = broadcast::channel(event_channel_capacity);
        let session_context = Arc::new(SessionContext::default());

        let cluster_metadata_manager = Arc::new(ClusterMetadataManager::new(
            contact_points.clone(),
            connection_pool_factory,
            session_context.clone(),
            node_distance_evaluator,
            topology_event_sender.clone(),
        ));

        let load_balancing = Arc::new(InitializingWrapperLoadBalancingStrategy::new(
            load_balancing,
            contact_points,
        ));

        let mut control_connection = ControlConnection::new(
            load_balancing.clone(),
            reconnection_policy,
            cluster_metadata_manager.clone(),
            session_context,
        );

        control_connection.connect().await?;

        let control_connection_handle = tokio::spawn(control_connection.run());

        Ok(Session {
            load_balancing,
            keyspace_holder,
            retry_policy,
            speculative_execution_policy,
            request_timeout,
            cluster_metadata_manager,
            topology_event_sender,
            control_connection_handle,
        })
    }
}

// address of the node which did not recognize a prepared statement
fn unprepared_node(result: &Result<Frame>) -> Option<SocketAddr> {
    match result.as_ref().map_err(Error::root_cause) {
        Err(Error::Server { body, addr })
            if matches!(body.additional_info, AdditionalErrorInfo::Unprepared(_)) =>
        {
            Some(*addr)
        }
        _ => None,
    }
}

/// Builder for plain TCP sessions.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TcpSessionBuilder<
    LB: LoadBalancingStrategy<TransportTcp, TcpConnectionManager> + Send + Sync + 'static,
> {
    #[derivative(Debug = "ignore")]
    load_balancing: LB,
    config: NodeTcpConfig,
    #[derivative(Debug = "ignore")]
    retry_policy: Box<dyn RetryPolicy + Send + Sync>,
    #[derivative(Debug = "ignore")]
    speculative_execution_policy: Option<Box<dyn SpeculativeExecutionPolicy + Send + Sync>>,
    #[derivative(Debug = "ignore")]
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    #[derivative(Debug = "ignore")]
    node_distance_evaluator: Box<dyn NodeDistanceEvaluator + Send + Sync>,
    connection_pool_config: ConnectionPoolConfig,
    event_channel_capacity: usize,
    request_timeout: Duration,
}

impl<LB: LoadBalancingStrategy<TransportTcp, TcpConnectionManager> + Send + Sync + 'static>
    TcpSessionBuilder<LB>
{
    /// Creates a new builder with default session configuration.
    pub fn new(load_balancing: LB, config: NodeTcpConfig) -> Self {
        TcpSessionBuilder {
            load_balancing,
            config,
            retry_policy: Box::<DefaultRetryPolicy>::default(),
            speculative_execution_policy: None,
            reconnection_policy: Arc::new(ExponentialReconnectionPolicy::default()),
            node_distance_evaluator: Box::<AllLocalNodeDistanceEvaluator>::default(),
            connection_pool_config: Default::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets new retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: Box<dyn RetryPolicy + Send + Sync>) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets new speculative execution policy.
    #[must_use]
    pub fn with_speculative_execution_policy(
        mut self,
        speculative_execution_policy: Box<dyn SpeculativeExecutionPolicy + Send + Sync>,
    ) -> Self {
        self.speculative_execution_policy = Some(speculative_execution_policy);
        self
    }

    /// Sets new reconnection policy, used by connection pools and the control connection.
    #[must_use]
    pub fn with_reconnection_policy(
        mut self,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    ) -> Self {
        self.reconnection_policy = reconnection_policy;
        self
    }

    /// Sets new node distance evaluator. Computing node distance is fundamental to proper
    /// topology-aware load balancing.
    #[must_use]
    pub fn with_node_distance_evaluator(
        mut self,
        node_distance_evaluator: Box<dyn NodeDistanceEvaluator + Send + Sync>,
    ) -> Self {
        self.node_distance_evaluator = node_distance_evaluator;
        self
    }

    /// Sets connection pool configuration.
    #[must_use]
    pub fn with_connection_pool_config(
        mut self,
        connection_pool_config: ConnectionPoolConfig,
    ) -> Self {
        self.connection_pool_config = connection_pool_config;
        self
    }

    /// Sets the capacity of the topology event channel. Slow subscribers miss events once the
    /// capacity is exceeded.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, event_channel_capacity: usize) -> Self {
        self.event_channel_capacity = event_channel_capacity.max(1);
        self
    }

    /// Sets the default timeout of a single request attempt.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Connects to the cluster and discovers its topology.
    pub async fn build(self) -> Result<TcpSession<LB>> {
        let keyspace_holder = Arc::new(KeyspaceHolder::default());
        let connection_manager = TcpConnectionManager::new(&self.config, keyspace_holder.clone());

        Session::connect(
            self.load_balancing,
            connection_manager,
            self.config.contact_points,
            keyspace_holder,
            self.retry_policy,
            self.speculative_execution_policy,
            self.reconnection_policy,
            self.node_distance_evaluator,
            self.connection_pool_config,
            self.event_channel_capacity,
            self.request_timeout,
        )
        .await
    }
}
