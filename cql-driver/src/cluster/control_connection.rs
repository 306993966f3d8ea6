use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{
    channel, unbounded_channel, Receiver, Sender, UnboundedReceiver, UnboundedSender,
};
use tokio::time::sleep;
use tracing::*;

use crate::cluster::{ClusterMetadataManager, ConnectionManager, SessionContext};
use crate::error::{Error, Result};
use crate::events::{ServerEvent, SimpleServerEvent, StatusChange, StatusChangeType};
use crate::frame::Frame;
use crate::load_balancing::LoadBalancingStrategy;
use crate::retry::ReconnectionPolicy;
use crate::transport::CqlTransport;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Dedicated connection used for discovering the cluster and listening to server events. Events
/// are applied one at a time, in the order they were received.
pub(crate) struct ControlConnection<
    T: CqlTransport + 'static,
    CM: ConnectionManager<T> + 'static,
    LB: LoadBalancingStrategy<T, CM> + Send + Sync,
> {
    load_balancing: Arc<LB>,
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    cluster_metadata_manager: Arc<ClusterMetadataManager<T, CM>>,
    session_context: Arc<SessionContext<T>>,
    // unbounded, so reading responses to refresh queries never waits for event processing
    event_frame_sender: UnboundedSender<Frame>,
    event_frame_receiver: UnboundedReceiver<Frame>,
    error_sender: Sender<Error>,
    error_receiver: Receiver<Error>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>, LB: LoadBalancingStrategy<T, CM> + Send + Sync>
    ControlConnection<T, CM, LB>
{
    pub(crate) fn new(
        load_balancing: Arc<LB>,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
        cluster_metadata_manager: Arc<ClusterMetadataManager<T, CM>>,
        session_context: Arc<SessionContext<T>>,
    ) -> Self {
        let (event_frame_sender, event_frame_receiver) = unbounded_channel();
        let (error_sender, error_receiver) = channel(1);

        ControlConnection {
            load_balancing,
            reconnection_policy,
            cluster_metadata_manager,
            session_context,
            event_frame_sender,
            event_frame_receiver,
            error_sender,
            error_receiver,
        }
    }

    /// Tries to establish the connection with each node of the query plan once, then registers
    /// for events and refreshes metadata.
    pub(crate) async fn connect(&mut self) -> Result<()> {
        let nodes = self
            .load_balancing
            .query_plan(None, self.cluster_metadata_manager.metadata().as_ref());

        let mut last_error = None;
        for node in nodes {
            let connection = match node
                .new_connection(
                    Some(self.event_frame_sender.clone()),
                    Some(self.error_sender.clone()),
                )
                .await
            {
                Ok(connection) => Arc::new(connection),
                Err(error) => {
                    warn!(%error, broadcast_rpc_address = %node.broadcast_rpc_address(), "Error establishing control connection.");
                    last_error = Some(error);
                    continue;
                }
            };

            // errors of previous connections are stale by now
            while self.error_receiver.try_recv().is_ok() {}

            self.session_context
                .control_connection_transport
                .store(Some(connection.clone()));

            match self.register(connection.as_ref()).await {
                Ok(_) => match self.cluster_metadata_manager.refresh_metadata().await {
                    Ok(_) => {
                        debug!(address = %connection.address(), "Established new control connection.");
                        return Ok(());
                    }
                    Err(error) => {
                        error!(%error, "Error refreshing metadata! Trying next node.");
                        last_error = Some(error);
                    }
                },
                Err(error) => {
                    error!(%error, "Error subscribing to events! Trying next node.");
                    last_error = Some(error);
                }
            }

            self.close_transport();
        }

        Err(last_error.unwrap_or_else(|| "No nodes found for control connection!".into()))
    }

    /// Listens to events, reconnecting whenever the connection fails. Runs until cancelled.
    pub(crate) async fn run(mut self) {
        loop {
            self.listen().await;
            self.close_transport();

            let mut schedule = self.reconnection_policy.new_node_schedule();
            while let Err(error) = self.connect().await {
                let delay = schedule.next_delay().unwrap_or(DEFAULT_RECONNECT_DELAY);
                warn!(%error, ?delay, "Control connection unavailable. Waiting before reconnecting.");
                sleep(delay).await;
            }
        }
    }

    async fn register(&self, connection: &T) -> Result<()> {
        let register_frame = Frame::new_req_register(
            vec![
                SimpleServerEvent::SchemaChange,
                SimpleServerEvent::StatusChange,
                SimpleServerEvent::TopologyChange,
            ],
            self.cluster_metadata_manager.protocol_version(),
        );

        connection.write_frame(&register_frame).await.map(|_| ())
    }

    // returns when the connection needs to be re-established
    async fn listen(&mut self) {
        let Some(connection) = self
            .session_context
            .control_connection_transport
            .load_full()
        else {
            return;
        };

        loop {
            tokio::select! {
                error = self.error_receiver.recv() => {
                    if let Some(error) = error {
                        error!(%error, "Error in control connection! Trying to reconnect.");
                    }

                    return;
                }
                frame = self.event_frame_receiver.recv() => {
                    let Some(frame) = frame else {
                        return;
                    };

                    let Some(event) = frame
                        .response_body()
                        .ok()
                        .and_then(|body| body.into_server_event())
                    else {
                        warn!(opcode = ?frame.opcode, "Ignoring invalid event frame.");
                        continue;
                    };

                    let control_node_down = matches!(
                        &event,
                        ServerEvent::StatusChange(StatusChange {
                            change_type: StatusChangeType::Down,
                            addr,
                        }) if addr.addr == connection.address()
                    );

                    if let Err(error) = self.cluster_metadata_manager.process_event(event).await {
                        error!(%error, "Error processing server event! Trying to reconnect.");
                        return;
                    }

                    if control_node_down {
                        warn!(address = %connection.address(), "Control node is down. Trying to reconnect.");
                        return;
                    }
                }
            }
        }
    }

    fn close_transport(&self) {
        if let Some(connection) = self
            .session_context
            .control_connection_transport
            .swap(None)
        {
            connection.close();
        }
    }
}
