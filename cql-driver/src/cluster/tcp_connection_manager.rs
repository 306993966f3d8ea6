use futures::FutureExt;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{Sender, UnboundedSender};
use tracing::*;

use crate::authenticators::SaslAuthenticatorProvider;
use crate::cluster::connection_manager::{startup, ConnectionManager};
use crate::cluster::{KeyspaceHolder, NodeTcpConfig};
use crate::error::{Error, Result};
use crate::frame::{Frame, Version};
use crate::future::BoxFuture;
use crate::transport::{TransportConfig, TransportTcp};

/// Establishes TCP connections, negotiating the protocol version on the first successful
/// handshake. Once a connection succeeds, the version stays fixed for all later connections.
pub struct TcpConnectionManager {
    authenticator_provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    keyspace_holder: Arc<KeyspaceHolder>,
    transport_config: TransportConfig,
    version: AtomicU8,
    version_fixed: AtomicBool,
}

impl ConnectionManager<TransportTcp> for TcpConnectionManager {
    fn connection(
        &self,
        event_handler: Option<UnboundedSender<Frame>>,
        error_handler: Option<Sender<Error>>,
        addr: SocketAddr,
    ) -> BoxFuture<Result<TransportTcp>> {
        async move {
            loop {
                let version = self.version();
                let result = self
                    .establish_connection(
                        event_handler.clone(),
                        error_handler.clone(),
                        addr,
                        version,
                    )
                    .await;

                match result {
                    Ok(transport) => {
                        self.version_fixed.store(true, Ordering::Relaxed);
                        return Ok(transport);
                    }
                    Err(Error::Server { body, .. }) if body.is_bad_protocol() => {
                        if self.version_fixed.load(Ordering::Relaxed) {
                            return Err(Error::InvalidProtocol(addr));
                        }

                        let lower_version =
                            version.downgrade().ok_or(Error::InvalidProtocol(addr))?;

                        warn!(%addr, %version, %lower_version, "Protocol version rejected, downgrading.");

                        // another connection might have downgraded already
                        let _ = self.version.compare_exchange(
                            version.into(),
                            lower_version.into(),
                            Ordering::Relaxed,
                            Ordering::Relaxed,
                        );
                    }
                    Err(error) => return Err(error),
                }
            }
        }
        .boxed()
    }

    #[inline]
    fn version(&self) -> Version {
        Version::try_from(self.version.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

impl TcpConnectionManager {
    pub fn new(config: &NodeTcpConfig, keyspace_holder: Arc<KeyspaceHolder>) -> Self {
        TcpConnectionManager {
            authenticator_provider: config.authenticator_provider.clone(),
            keyspace_holder,
            transport_config: config.transport_config,
            version: AtomicU8::new(config.version.into()),
            version_fixed: AtomicBool::new(false),
        }
    }

    async fn establish_connection(
        &self,
        event_handler: Option<UnboundedSender<Frame>>,
        error_handler: Option<Sender<Error>>,
        addr: SocketAddr,
        version: Version,
    ) -> Result<TransportTcp> {
        let transport = TransportTcp::new(
            addr,
            version,
            self.keyspace_holder.clone(),
            event_handler,
            error_handler,
            self.transport_config,
        )
        .await?;

        startup(
            &transport,
            self.authenticator_provider.deref(),
            self.keyspace_holder.deref(),
            version,
        )
        .await?;

        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::authenticators::NoneAuthenticatorProvider;
    use crate::cluster::connection_manager::ConnectionManager;
    use crate::cluster::{KeyspaceHolder, NodeTcpConfig, TcpConnectionManager};
    use crate::error::{Error, ErrorKind};
    use crate::frame::message_error::{AdditionalErrorInfo, ErrorBody};
    use crate::frame::{Frame, Version};
    use crate::frame_parser::parse_frame;
    use crate::transport::{CqlTransport, TransportConfig};

    fn config(version: Version) -> NodeTcpConfig {
        NodeTcpConfig {
            contact_points: vec![],
            authenticator_provider: Arc::new(NoneAuthenticatorProvider),
            version,
            transport_config: TransportConfig {
                heartbeat_interval: None,
                ..Default::default()
            },
        }
    }

    fn bad_protocol() -> ErrorBody {
        ErrorBody {
            error_code: 0x000A,
            message: "Invalid or unsupported protocol version".into(),
            additional_info: AdditionalErrorInfo::Protocol,
        }
    }

    // accepts connections and answers STARTUP with READY only for the given version
    async fn start_node(supported: Version) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    while let Ok(request) = parse_frame(&mut socket).await {
                        let response = if request.version == supported {
                            Frame::new_res_ready(request.version, request.stream)
                        } else {
                            Frame::new_res_error(request.version, request.stream, &bad_protocol())
                        };

                        if socket.write_all(&response.encode()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn should_downgrade_version() {
        let addr = start_node(Version::V3).await;
        let manager = TcpConnectionManager::new(
            &config(Version::V4),
            Arc::new(KeyspaceHolder::default()),
        );

        let transport = manager.connection(None, None, addr).await.unwrap();
        assert_eq!(transport.version(), Version::V3);
        assert_eq!(manager.version(), Version::V3);
        assert!(!transport.is_broken());
    }

    #[tokio::test]
    async fn should_keep_negotiated_version() {
        let old_node = start_node(Version::V3).await;
        let new_node = start_node(Version::V4).await;
        let manager = TcpConnectionManager::new(
            &config(Version::V4),
            Arc::new(KeyspaceHolder::default()),
        );

        manager.connection(None, None, old_node).await.unwrap();

        let transport = manager.connection(None, None, new_node).await;
        assert!(matches!(transport, Err(Error::InvalidProtocol(addr)) if addr == new_node));
    }

    #[tokio::test]
    async fn should_fail_without_lower_version() {
        let addr = start_node(Version::V4).await;
        let manager = TcpConnectionManager::new(
            &config(Version::V3),
            Arc::new(KeyspaceHolder::default()),
        );

        let error = manager.connection(None, None, addr).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ConnectError);
    }
}
