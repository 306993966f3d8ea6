use atomic::Atomic;
use bytemuck::NoUninit;
use derive_more::Display;
use futures::future::join_all;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch::Receiver;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::sleep;
use tracing::*;

use crate::cluster::connection_manager::use_keyspace_frame;
use crate::cluster::topology::{NodeDistance, NodeState};
use crate::cluster::ConnectionManager;
use crate::error::{Error, Result};
use crate::frame::Version;
use crate::retry::{ReconnectionPolicy, ReconnectionSchedule};
use crate::transport::CqlTransport;

const DEFAULT_LOCAL_MIN_SIZE: usize = 1;
const DEFAULT_LOCAL_MAX_SIZE: usize = 8;
const DEFAULT_REMOTE_MIN_SIZE: usize = 1;
const DEFAULT_REMOTE_MAX_SIZE: usize = 2;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// transports don't signal freed stream ids, so waiters poll in addition to being notified
const CAPACITY_POLL_INTERVAL: Duration = Duration::from_millis(5);
const MIN_MAINTENANCE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, NoUninit)]
#[repr(u8)]
enum ReconnectionState {
    NotRunning,
    InProgress,
}

/// Behaviour when all connections of a pool are saturated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PoolOverflow {
    /// Wait for free capacity, at most for the connect timeout, then fail with
    /// [`Error::Busy`].
    #[default]
    Queue,
    /// Fail with [`Error::Busy`] immediately.
    Fail,
}

/// Configuration for node connection pools. Pools start with the minimum number of connections,
/// grow up to the maximum when all connections are saturated, and shrink back after connections
/// stay idle for `idle_timeout`.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionPoolConfig {
    local_min_size: usize,
    local_max_size: usize,
    remote_min_size: usize,
    remote_max_size: usize,
    overflow: PoolOverflow,
    idle_timeout: Duration,
    connect_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        ConnectionPoolConfig {
            local_min_size: DEFAULT_LOCAL_MIN_SIZE,
            local_max_size: DEFAULT_LOCAL_MAX_SIZE,
            remote_min_size: DEFAULT_REMOTE_MIN_SIZE,
            remote_max_size: DEFAULT_REMOTE_MAX_SIZE,
            overflow: Default::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectionPoolConfig {
    /// Creates a new configuration with given pool sizes for local and remote nodes.
    ///
    /// # Panics
    ///
    /// Panics if a minimum size is 0 or greater than the corresponding maximum size.
    pub fn new(
        local_min_size: usize,
        local_max_size: usize,
        remote_min_size: usize,
        remote_max_size: usize,
    ) -> Self {
        assert!(local_min_size > 0 && local_min_size <= local_max_size);
        assert!(remote_min_size > 0 && remote_min_size <= remote_max_size);

        ConnectionPoolConfig {
            local_min_size,
            local_max_size,
            remote_min_size,
            remote_max_size,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_overflow(mut self, overflow: PoolOverflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Sets the time after which excess idle connections are closed.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the time limit for establishing a connection, including the handshake. Also bounds
    /// waiting for capacity when overflowing requests are queued.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns (min, max) pool size for nodes at given distance.
    pub fn size_limits(&self, distance: NodeDistance) -> (usize, usize) {
        match distance {
            NodeDistance::Local => (self.local_min_size, self.local_max_size),
            _ => (self.remote_min_size, self.remote_max_size),
        }
    }
}

async fn new_connection<T: CqlTransport, CM: ConnectionManager<T>>(
    connection_manager: &CM,
    broadcast_rpc_address: SocketAddr,
    timeout: Duration,
    error_handler: mpsc::Sender<Error>,
) -> Result<T> {
    tokio::time::timeout(
        timeout,
        connection_manager.connection(None, Some(error_handler), broadcast_rpc_address),
    )
    .await
    .map_err(|_| {
        Error::Timeout(format!(
            "Timeout waiting for connection to: {broadcast_rpc_address}"
        ))
    })
    .and_then(|result| result)
}

pub(crate) struct ConnectionPoolFactory<
    T: CqlTransport + 'static,
    CM: ConnectionManager<T> + 'static,
> {
    config: ConnectionPoolConfig,
    connection_manager: Arc<CM>,
    keyspace_receiver: Receiver<Option<String>>,
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    _transport: PhantomData<T>,
}

impl<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> ConnectionPoolFactory<T, CM> {
    pub(crate) fn new(
        config: ConnectionPoolConfig,
        connection_manager: CM,
        keyspace_receiver: Receiver<Option<String>>,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    ) -> Self {
        ConnectionPoolFactory {
            config,
            connection_manager: Arc::new(connection_manager),
            keyspace_receiver,
            reconnection_policy,
            _transport: Default::default(),
        }
    }

    #[inline]
    pub(crate) fn connection_manager(&self) -> &CM {
        self.connection_manager.as_ref()
    }

    #[inline]
    pub(crate) fn config(&self) -> &ConnectionPoolConfig {
        &self.config
    }

    /// Creates a pool with the minimum number of connections. Connections which cannot be
    /// established are retried in the background; if none can be established, the node is marked
    /// down until one succeeds.
    pub(crate) async fn create(
        &self,
        node_distance: NodeDistance,
        broadcast_rpc_address: SocketAddr,
        node_state: Arc<Atomic<NodeState>>,
    ) -> Result<Arc<ConnectionPool<T, CM>>> {
        let (min_size, max_size) = self.config.size_limits(node_distance);
        let (error_sender, error_receiver) = mpsc::channel(max_size);

        let connections = join_all((0..min_size).map(|_| {
            new_connection(
                self.connection_manager.as_ref(),
                broadcast_rpc_address,
                self.config.connect_timeout,
                error_sender.clone(),
            )
        }))
        .await;

        let mut established = Vec::with_capacity(max_size);
        for connection in connections {
            match connection {
                Ok(connection) => established.push(Arc::new(connection)),
                // unrecoverable
                Err(Error::InvalidProtocol(addr)) => return Err(Error::InvalidProtocol(addr)),
                Err(error) => {
                    warn!(%error, %broadcast_rpc_address, "Error establishing pool connection.")
                }
            }
        }

        let established_count = established.len();
        let pool = Arc::new(ConnectionPool {
            connection_manager: self.connection_manager.clone(),
            broadcast_rpc_address,
            config: self.config,
            min_size,
            max_size,
            connections: RwLock::new(established),
            growing: AtomicBool::new(false),
            capacity_notify: Notify::new(),
            closed: AtomicBool::new(false),
            reconnection_state: Atomic::new(ReconnectionState::NotRunning),
            reconnection_policy: self.reconnection_policy.clone(),
            node_state,
            error_sender,
        });

        pool.update_node_state(if established_count > 0 {
            NodeState::Up
        } else {
            NodeState::Down
        });

        pool.monitor_connections(error_receiver);
        pool.watch_keyspace(
            self.keyspace_receiver.clone(),
            self.connection_manager.version(),
        );
        pool.start_maintenance();

        if established_count < min_size {
            pool.start_reconnection();
        }

        Ok(pool)
    }
}

/// A bounded, self-healing set of connections to a single node.
pub(crate) struct ConnectionPool<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    connection_manager: Arc<CM>,
    broadcast_rpc_address: SocketAddr,
    config: ConnectionPoolConfig,
    min_size: usize,
    max_size: usize,
    connections: RwLock<Vec<Arc<T>>>,
    growing: AtomicBool,
    capacity_notify: Notify,
    closed: AtomicBool,
    reconnection_state: Atomic<ReconnectionState>,
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    node_state: Arc<Atomic<NodeState>>,
    error_sender: mpsc::Sender<Error>,
}

impl<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> ConnectionPool<T, CM> {
    /// Borrows the least loaded live connection with free stream ids.
    pub(crate) async fn connection(self: &Arc<Self>) -> Result<Arc<T>> {
        let deadline = Instant::now() + self.config.connect_timeout;

        loop {
            if self.is_closed() {
                return Err(Error::NoConnectionsAvailable(self.broadcast_rpc_address));
            }

            let notified = self.capacity_notify.notified();

            let (connection, live) = self.least_loaded().await;
            if let Some(connection) = connection {
                return Ok(connection);
            }

            if live == 0 {
                return Err(Error::NoConnectionsAvailable(self.broadcast_rpc_address));
            }

            if live < self.max_size {
                self.grow();
            }

            if self.config.overflow == PoolOverflow::Fail || Instant::now() >= deadline {
                return Err(Error::Busy(self.broadcast_rpc_address));
            }

            trace!(broadcast_rpc_address = %self.broadcast_rpc_address, "Waiting for pool capacity.");

            tokio::select! {
                _ = notified => {}
                _ = sleep(CAPACITY_POLL_INTERVAL) => {}
            }
        }
    }

    /// Closes all connections, failing their in-flight requests. Until reopened, the pool does not
    /// reconnect and borrowing fails immediately.
    pub(crate) async fn close(&self) {
        debug!(broadcast_rpc_address = %self.broadcast_rpc_address, "Closing connection pool.");

        self.closed.store(true, Ordering::Relaxed);

        let connections = std::mem::take(&mut *self.connections.write().await);
        for connection in connections {
            connection.close();
        }

        self.capacity_notify.notify_waiters();
    }

    /// Re-establishes the minimum number of connections.
    pub(crate) fn reopen(self: &Arc<Self>) {
        if self.closed.swap(false, Ordering::Relaxed) {
            debug!(broadcast_rpc_address = %self.broadcast_rpc_address, "Reopening connection pool.");
        }

        self.start_reconnection();
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Checks if any connection is still available.
    pub(crate) async fn is_any_connection_up(&self) -> bool {
        self.connections
            .read()
            .await
            .iter()
            .any(|connection| !connection.is_broken())
    }

    /// Current number of connections, including broken ones not yet evicted.
    pub(crate) async fn size(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn least_loaded(&self) -> (Option<Arc<T>>, usize) {
        let connections = self.connections.read().await;

        let mut live = 0;
        let connection = connections
            .iter()
            .filter(|connection| !connection.is_broken())
            .inspect(|_| live += 1)
            .filter(|connection| connection.in_flight() < connection.max_in_flight())
            .min_by_key(|connection| connection.in_flight())
            .cloned();

        (connection, live)
    }

    fn update_node_state(&self, state: NodeState) {
        let result = self
            .node_state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current != state && current != NodeState::Ignored).then_some(state)
            });

        if let Ok(previous) = result {
            debug!(broadcast_rpc_address = %self.broadcast_rpc_address, %previous, %state, "Node state changed.");
        }
    }

    async fn new_connection(&self) -> Result<T> {
        new_connection(
            self.connection_manager.as_ref(),
            self.broadcast_rpc_address,
            self.config.connect_timeout,
            self.error_sender.clone(),
        )
        .await
    }

    // opens a single additional connection in the background
    fn grow(self: &Arc<Self>) {
        if self
            .growing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let pool = self.clone();
        tokio::spawn(async move {
            debug!(broadcast_rpc_address = %pool.broadcast_rpc_address, "Growing connection pool.");

            match pool.new_connection().await {
                Ok(connection) => {
                    let mut connections = pool.connections.write().await;
                    if connections.len() < pool.max_size && !pool.is_closed() {
                        connections.push(Arc::new(connection));
                    } else {
                        connection.close();
                    }
                }
                Err(error) => {
                    warn!(%error, broadcast_rpc_address = %pool.broadcast_rpc_address, "Error growing connection pool.");
                }
            }

            pool.growing.store(false, Ordering::Release);
            pool.capacity_notify.notify_waiters();
        });
    }

    async fn evict_broken(&self) -> usize {
        let mut connections = self.connections.write().await;
        let before = connections.len();

        connections.retain(|connection| {
            if connection.is_broken() {
                connection.close();
                false
            } else {
                true
            }
        });

        before - connections.len()
    }

    // closes connections above the minimum size which are idle and not borrowed
    async fn shrink_idle(&self) {
        let mut connections = self.connections.write().await;
        let mut excess = connections.len().saturating_sub(self.min_size);
        if excess == 0 {
            return;
        }

        let idle_timeout = self.config.idle_timeout;
        connections.retain(|connection| {
            if excess > 0
                && Arc::strong_count(connection) == 1
                && connection.in_flight() == 0
                && connection.last_used().elapsed() >= idle_timeout
            {
                excess -= 1;
                connection.close();
                false
            } else {
                true
            }
        });
    }

    async fn fill_to_min_size(&self) -> Result<()> {
        loop {
            if self.connections.read().await.len() >= self.min_size {
                return Ok(());
            }

            let connection = self.new_connection().await?;

            let mut connections = self.connections.write().await;
            if self.is_closed() {
                connection.close();
                return Ok(());
            }

            if connections.len() < self.max_size {
                connections.push(Arc::new(connection));
            }

            drop(connections);

            self.update_node_state(NodeState::Up);
            self.capacity_notify.notify_waiters();
        }
    }

    fn start_reconnection(self: &Arc<Self>) {
        if self
            .reconnection_state
            .compare_exchange(
                ReconnectionState::NotRunning,
                ReconnectionState::InProgress,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return;
        }

        let schedule = self.reconnection_policy.new_node_schedule();
        tokio::spawn(Self::run_reconnection_loop(schedule, Arc::downgrade(self)));
    }

    async fn run_reconnection_loop(
        mut reconnection_schedule: Box<dyn ReconnectionSchedule + Send + Sync>,
        pool: Weak<Self>,
    ) {
        let restartable = loop {
            // the pool might be gone
            let Some(current_pool) = pool.upgrade() else {
                return;
            };

            if current_pool.is_closed() {
                break true;
            }

            current_pool.evict_broken().await;

            match current_pool.fill_to_min_size().await {
                Ok(_) => {
                    debug!(broadcast_rpc_address = %current_pool.broadcast_rpc_address, "All connections reestablished.");
                    break true;
                }
                Err(Error::InvalidProtocol(_)) => {
                    warn!(broadcast_rpc_address = %current_pool.broadcast_rpc_address, "Ignoring node, since it does not support negotiated protocol version.");
                    current_pool
                        .node_state
                        .store(NodeState::Ignored, Ordering::Relaxed);
                    break false;
                }
                Err(error) => {
                    if !current_pool.is_any_connection_up().await {
                        current_pool.update_node_state(NodeState::Down);
                    }

                    let Some(delay) = reconnection_schedule.next_delay() else {
                        warn!(%error, broadcast_rpc_address = %current_pool.broadcast_rpc_address, "Giving up reconnecting.");
                        break false;
                    };

                    debug!(%error, broadcast_rpc_address = %current_pool.broadcast_rpc_address, ?delay, "Reconnection failed.");

                    drop(current_pool);
                    sleep(delay).await;
                }
            }
        };

        if let Some(pool) = pool.upgrade() {
            pool.finish_reconnection(restartable).await;
        }
    }

    // the pool could have been closed and reopened after the loop decided to stop, in which case
    // `reopen` could not start a new loop
    async fn finish_reconnection(self: &Arc<Self>, restartable: bool) {
        self.reconnection_state
            .store(ReconnectionState::NotRunning, Ordering::Release);

        if restartable && !self.is_closed() && self.size().await < self.min_size {
            debug!(broadcast_rpc_address = %self.broadcast_rpc_address, "Pool reopened while reconnecting. Restarting reconnection.");
            self.start_reconnection();
        }
    }

    fn monitor_connections(self: &Arc<Self>, mut receiver: mpsc::Receiver<Error>) {
        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(error) = receiver.recv().await {
                let Some(current_pool) = pool.upgrade() else {
                    break;
                };

                if current_pool.is_closed() {
                    continue;
                }

                warn!(%error, broadcast_rpc_address = %current_pool.broadcast_rpc_address, "Connection down.");

                current_pool.evict_broken().await;
                if !current_pool.is_any_connection_up().await {
                    current_pool.update_node_state(NodeState::Down);
                }

                current_pool.start_reconnection();
            }

            debug!("Pool monitoring stopped.");
        });
    }

    fn start_maintenance(self: &Arc<Self>) {
        let interval = (self.config.idle_timeout / 2).max(MIN_MAINTENANCE_INTERVAL);
        let pool = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                sleep(interval).await;

                let Some(current_pool) = pool.upgrade() else {
                    break;
                };

                if current_pool.is_closed() {
                    continue;
                }

                // connections can break without a transport error, e.g. with too many orphans
                if current_pool.evict_broken().await > 0 {
                    current_pool.start_reconnection();
                }

                current_pool.shrink_idle().await;
            }
        });
    }

    fn watch_keyspace(
        self: &Arc<Self>,
        mut keyspace_receiver: Receiver<Option<String>>,
        version: Version,
    ) {
        // new connections restore the current keyspace during startup
        keyspace_receiver.borrow_and_update();

        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            while keyspace_receiver.changed().await.is_ok() {
                let keyspace = keyspace_receiver.borrow_and_update().clone();

                let Some(current_pool) = pool.upgrade() else {
                    break;
                };

                let Some(keyspace) = keyspace else {
                    continue;
                };

                let use_frame = use_keyspace_frame(&keyspace, version);
                let connections = current_pool.connections.read().await.clone();
                let broadcast_rpc_address = current_pool.broadcast_rpc_address;

                join_all(
                    connections
                        .iter()
                        .filter(|connection| !connection.is_broken())
                        .map(|connection| {
                            let use_frame = &use_frame;
                            async move {
                                if let Err(error) = connection.write_frame(use_frame).await {
                                    error!(%error, %broadcast_rpc_address, "Error setting keyspace for connection!");
                                }
                            }
                        }),
                )
                .await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use atomic::Atomic;
    use futures::FutureExt;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc::{Sender, UnboundedSender};
    use tokio::sync::watch;
    use tokio::time::{sleep, timeout};

    use crate::cluster::connection_pool::{
        ConnectionPool, ConnectionPoolConfig, ConnectionPoolFactory, PoolOverflow,
        ReconnectionState,
    };
    use crate::cluster::topology::{NodeDistance, NodeState};
    use crate::cluster::ConnectionManager;
    use crate::error::{Error, ErrorKind, Result};
    use crate::frame::{Frame, Version};
    use crate::future::BoxFuture;
    use crate::retry::ConstantReconnectionPolicy;
    use crate::transport::CqlTransport;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9042)
    }

    #[derive(Debug)]
    struct FakeTransport {
        in_flight: AtomicUsize,
        broken: AtomicBool,
        closed: AtomicBool,
        created: Instant,
    }

    impl FakeTransport {
        fn new(in_flight: usize) -> Self {
            FakeTransport {
                in_flight: AtomicUsize::new(in_flight),
                broken: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                created: Instant::now(),
            }
        }
    }

    impl CqlTransport for FakeTransport {
        fn write_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Frame>> {
            let response = Frame::new_res_ready(frame.version, 0);
            async move { Ok(response) }.boxed()
        }

        fn is_broken(&self) -> bool {
            self.broken.load(Ordering::Relaxed)
        }

        fn address(&self) -> SocketAddr {
            addr()
        }

        fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::Relaxed)
        }

        fn pending_slots(&self) -> usize {
            self.in_flight()
        }

        fn max_in_flight(&self) -> usize {
            1
        }

        fn last_used(&self) -> Instant {
            self.created
        }

        fn close(&self) {
            self.broken.store(true, Ordering::Relaxed);
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    // the first `saturated` connections start with all stream ids taken
    #[derive(Default)]
    struct FakeConnectionManager {
        created: AtomicUsize,
        saturated: AtomicUsize,
        failing: AtomicBool,
        invalid_protocol: AtomicBool,
        error_handlers: Mutex<Vec<Sender<Error>>>,
    }

    impl ConnectionManager<FakeTransport> for FakeConnectionManager {
        fn connection(
            &self,
            _event_handler: Option<UnboundedSender<Frame>>,
            error_handler: Option<Sender<Error>>,
            addr: SocketAddr,
        ) -> BoxFuture<Result<FakeTransport>> {
            let result = if self.invalid_protocol.load(Ordering::Relaxed) {
                Err(Error::InvalidProtocol(addr))
            } else if self.failing.load(Ordering::Relaxed) {
                Err(Error::Connect {
                    addr,
                    reason: "refused".into(),
                })
            } else {
                self.error_handlers
                    .lock()
                    .unwrap()
                    .extend(error_handler);

                let saturated = self
                    .saturated
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |saturated| {
                        saturated.checked_sub(1)
                    })
                    .is_ok();

                self.created.fetch_add(1, Ordering::Relaxed);
                Ok(FakeTransport::new(usize::from(saturated)))
            };

            async move { result }.boxed()
        }

        fn version(&self) -> Version {
            Version::V4
        }
    }

    fn factory(
        config: ConnectionPoolConfig,
        manager: FakeConnectionManager,
    ) -> ConnectionPoolFactory<FakeTransport, FakeConnectionManager> {
        let (_, keyspace_receiver) = watch::channel(None);
        ConnectionPoolFactory::new(
            config,
            manager,
            keyspace_receiver,
            Arc::new(ConstantReconnectionPolicy::new(Duration::from_millis(10))),
        )
    }

    async fn create_pool(
        factory: &ConnectionPoolFactory<FakeTransport, FakeConnectionManager>,
    ) -> (
        Arc<ConnectionPool<FakeTransport, FakeConnectionManager>>,
        Arc<Atomic<NodeState>>,
    ) {
        let state = Arc::new(Atomic::new(NodeState::Unknown));
        let pool = factory
            .create(NodeDistance::Local, addr(), state.clone())
            .await
            .unwrap();

        (pool, state)
    }

    async fn wait_until<F: std::future::Future<Output = bool>>(condition: impl Fn() -> F) {
        timeout(Duration::from_secs(5), async {
            while !condition().await {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn should_create_min_size_connections() {
        let factory = factory(ConnectionPoolConfig::new(2, 4, 1, 1), Default::default());
        let (pool, state) = create_pool(&factory).await;

        assert_eq!(pool.size().await, 2);
        assert_eq!(state.load(Ordering::Relaxed), NodeState::Up);
        assert!(pool.connection().await.is_ok());
    }

    #[tokio::test]
    async fn should_grow_up_to_max_size() {
        let manager = FakeConnectionManager::default();
        manager.saturated.store(usize::MAX, Ordering::Relaxed);

        let factory = factory(
            ConnectionPoolConfig::new(1, 3, 1, 1).with_overflow(PoolOverflow::Fail),
            manager,
        );
        let (pool, _) = create_pool(&factory).await;
        let pool = &pool;

        for expected_size in 2..=3 {
            let error = pool.connection().await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Busy);

            wait_until(move || async move { pool.size().await == expected_size }).await;
        }

        assert!(matches!(pool.connection().await, Err(Error::Busy(_))));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(pool.size().await, 3);
        assert_eq!(factory.connection_manager().created.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn should_queue_until_pool_grows() {
        let manager = FakeConnectionManager::default();
        manager.saturated.store(1, Ordering::Relaxed);

        let factory = factory(ConnectionPoolConfig::new(1, 2, 1, 1), manager);
        let (pool, _) = create_pool(&factory).await;

        let connection = pool.connection().await.unwrap();
        assert_eq!(connection.in_flight(), 0);
        assert_eq!(pool.size().await, 2);
    }

    #[tokio::test]
    async fn should_fail_borrowing_while_closed() {
        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), Default::default());
        let (pool, state) = create_pool(&factory).await;
        let pool = &pool;

        let connection = pool.connection().await.unwrap();
        pool.close().await;

        assert!(connection.closed.load(Ordering::Relaxed));
        assert!(matches!(
            pool.connection().await,
            Err(Error::NoConnectionsAvailable(_))
        ));

        state.store(NodeState::Down, Ordering::Relaxed);
        pool.reopen();

        wait_until(move || async move { pool.connection().await.is_ok() }).await;
        assert_eq!(state.load(Ordering::Relaxed), NodeState::Up);
    }

    #[tokio::test]
    async fn should_reconnect_when_reopened_while_reconnection_stops() {
        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), Default::default());
        let (pool, _) = create_pool(&factory).await;
        let pool = &pool;

        pool.close().await;

        // a reconnection loop which has seen the pool closed, but has not stopped yet
        pool.reconnection_state
            .store(ReconnectionState::InProgress, Ordering::Relaxed);
        pool.reopen();

        sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.size().await, 0);

        pool.finish_reconnection(true).await;

        wait_until(move || async move { pool.connection().await.is_ok() }).await;
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn should_not_restart_given_up_reconnection() {
        let manager = FakeConnectionManager::default();
        manager.failing.store(true, Ordering::Relaxed);

        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), manager);
        let (pool, _) = create_pool(&factory).await;

        pool.reconnection_state
            .store(ReconnectionState::InProgress, Ordering::Relaxed);
        pool.finish_reconnection(false).await;

        assert_eq!(
            pool.reconnection_state.load(Ordering::Relaxed),
            ReconnectionState::NotRunning
        );
    }

    #[test]
    #[should_panic]
    fn should_reject_empty_minimum_pool_size() {
        ConnectionPoolConfig::new(0, 1, 1, 1);
    }

    #[tokio::test]
    async fn should_replace_broken_connections() {
        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), Default::default());
        let (pool, _) = create_pool(&factory).await;
        let (factory, pool) = (&factory, &pool);

        let connection = pool.connection().await.unwrap();
        connection.broken.store(true, Ordering::Relaxed);

        let error_handler = factory.connection_manager().error_handlers.lock().unwrap()[0].clone();
        error_handler
            .send(Error::ConnectionClosed("reset".into()))
            .await
            .unwrap();

        wait_until(move || async move {
            factory.connection_manager().created.load(Ordering::Relaxed) == 2
                && pool.is_any_connection_up().await
        })
        .await;

        let new_connection = pool.connection().await.unwrap();
        assert!(!Arc::ptr_eq(&connection, &new_connection));
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn should_shrink_idle_connections() {
        let manager = FakeConnectionManager::default();
        manager.saturated.store(1, Ordering::Relaxed);

        let factory = factory(
            ConnectionPoolConfig::new(1, 2, 1, 1).with_idle_timeout(Duration::from_millis(20)),
            manager,
        );
        let (pool, _) = create_pool(&factory).await;
        let pool = &pool;

        drop(pool.connection().await.unwrap());
        assert_eq!(pool.size().await, 2);

        wait_until(move || async move { pool.size().await == 1 }).await;
    }

    #[tokio::test]
    async fn should_mark_unreachable_node_down_and_recover() {
        let manager = FakeConnectionManager::default();
        manager.failing.store(true, Ordering::Relaxed);

        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), manager);
        let (pool, state) = create_pool(&factory).await;
        let state = &state;

        assert_eq!(state.load(Ordering::Relaxed), NodeState::Down);
        assert!(matches!(
            pool.connection().await,
            Err(Error::NoConnectionsAvailable(_))
        ));

        factory
            .connection_manager()
            .failing
            .store(false, Ordering::Relaxed);

        wait_until(move || async move { state.load(Ordering::Relaxed) == NodeState::Up }).await;
        assert!(pool.connection().await.is_ok());
    }

    #[tokio::test]
    async fn should_propagate_invalid_protocol() {
        let manager = FakeConnectionManager::default();
        manager.invalid_protocol.store(true, Ordering::Relaxed);

        let factory = factory(ConnectionPoolConfig::new(1, 1, 1, 1), manager);
        let result = factory
            .create(
                NodeDistance::Local,
                addr(),
                Arc::new(Atomic::new(NodeState::Unknown)),
            )
            .await;

        assert!(matches!(result, Err(Error::InvalidProtocol(_))));
    }
}
