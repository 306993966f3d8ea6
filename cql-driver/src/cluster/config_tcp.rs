use derivative::Derivative;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;

use crate::authenticators::{NoneAuthenticatorProvider, SaslAuthenticatorProvider};
use crate::cluster::NodeAddress;
use crate::error::Result;
use crate::frame::Version;
use crate::transport::{TransportConfig, MAX_STREAM_IDS};

/// Cluster-wide TCP connection config.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct NodeTcpConfig {
    pub contact_points: Vec<SocketAddr>,
    #[derivative(Debug = "ignore")]
    pub authenticator_provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    /// Highest protocol version to try. Lower versions are negotiated automatically.
    pub version: Version,
    pub transport_config: TransportConfig,
}

/// Builder structure that helps to configure TCP connections to the cluster.
pub struct NodeTcpConfigBuilder {
    addrs: Vec<NodeAddress>,
    authenticator_provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    version: Version,
    transport_config: TransportConfig,
}

impl Default for NodeTcpConfigBuilder {
    fn default() -> Self {
        NodeTcpConfigBuilder {
            addrs: vec![],
            authenticator_provider: Arc::new(NoneAuthenticatorProvider),
            version: Version::default(),
            transport_config: Default::default(),
        }
    }
}

impl NodeTcpConfigBuilder {
    pub fn new() -> NodeTcpConfigBuilder {
        Default::default()
    }

    /// Sets new authenticator.
    #[must_use]
    pub fn with_authenticator_provider(
        mut self,
        authenticator_provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    ) -> Self {
        self.authenticator_provider = authenticator_provider;
        self
    }

    /// Adds initial node address (a contact point).
    #[must_use]
    pub fn with_contact_point(mut self, addr: NodeAddress) -> Self {
        self.addrs.push(addr);
        self
    }

    /// Adds initial node addresses.
    #[must_use]
    pub fn with_contact_points(mut self, addrs: Vec<NodeAddress>) -> Self {
        self.addrs.extend(addrs);
        self
    }

    /// Sets the highest protocol version to use.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets TCP_NODELAY for new connections.
    #[must_use]
    pub fn with_tcp_nodelay(mut self, tcp_nodelay: bool) -> Self {
        self.transport_config.tcp_nodelay = tcp_nodelay;
        self
    }

    /// Sets the capacity of the outgoing frame queue of each connection.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.transport_config.buffer_size = buffer_size;
        self
    }

    /// Sets the idle interval after which a heartbeat is sent. `None` disables heartbeats.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Option<Duration>) -> Self {
        self.transport_config.heartbeat_interval = heartbeat_interval;
        self
    }

    #[must_use]
    pub fn with_heartbeat_timeout(mut self, heartbeat_timeout: Duration) -> Self {
        self.transport_config.heartbeat_timeout = heartbeat_timeout;
        self
    }

    /// Sets the maximum number of concurrent requests per connection.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.transport_config.max_in_flight = max_in_flight.clamp(1, MAX_STREAM_IDS);
        self
    }

    /// Sets the number of orphaned stream ids after which a connection is replaced.
    #[must_use]
    pub fn with_max_orphaned(mut self, max_orphaned: usize) -> Self {
        self.transport_config.max_orphaned = max_orphaned;
        self
    }

    /// Finalizes building process, resolving hostnames.
    pub async fn build(self) -> Result<NodeTcpConfig> {
        // replace with map() when async lambdas become available
        let mut contact_points = Vec::with_capacity(self.addrs.len());
        for addr in self.addrs {
            match addr {
                NodeAddress::Direct(addr) => contact_points.push(addr),
                NodeAddress::Hostname(hostname) => {
                    contact_points.extend(lookup_host(hostname).await?)
                }
            }
        }

        Ok(NodeTcpConfig {
            contact_points,
            authenticator_provider: self.authenticator_provider,
            version: self.version,
            transport_config: self.transport_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use crate::cluster::{NodeAddress, NodeTcpConfigBuilder};
    use crate::frame::Version;
    use crate::transport::MAX_STREAM_IDS;

    #[tokio::test]
    async fn should_collect_contact_points() {
        let direct = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 9042);
        let config = NodeTcpConfigBuilder::new()
            .with_contact_point(direct.into())
            .with_contact_points(vec![NodeAddress::from("127.0.0.1:9043")])
            .with_version(Version::V3)
            .with_max_in_flight(100_000)
            .build()
            .await
            .unwrap();

        assert_eq!(
            config.contact_points,
            vec![
                direct,
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9043)
            ]
        );
        assert_eq!(config.version, Version::V3);
        assert_eq!(config.transport_config.max_in_flight, MAX_STREAM_IDS);
    }
}
