use derive_more::Display;
use std::net::SocketAddr;

/// Representation of a contact point address. Can be a direct socket address or a hostname. In
/// the latter case, the host can be resolved to multiple addresses, each becoming a separate
/// contact point.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum NodeAddress {
    #[display("{_0}")]
    Direct(SocketAddr),
    #[display("{_0}")]
    Hostname(String),
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        NodeAddress::Direct(addr)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        NodeAddress::Hostname(value)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        // prefer not to resolve literal socket addresses
        value
            .parse()
            .map(NodeAddress::Direct)
            .unwrap_or_else(|_| NodeAddress::Hostname(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use crate::cluster::NodeAddress;

    #[test]
    fn should_parse_literal_addresses() {
        assert_eq!(
            NodeAddress::from("127.0.0.1:9042"),
            NodeAddress::Direct(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9042))
        );
        assert_eq!(
            NodeAddress::from("localhost:9042"),
            NodeAddress::Hostname("localhost:9042".into())
        );
    }
}
