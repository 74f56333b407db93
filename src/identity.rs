use std::fmt;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Key used to attribute requests to one caller: the peer IP address without
/// its port. IPv4-mapped IPv6 addresses are folded to plain IPv4.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn from_ip(ip: IpAddr) -> Self {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        Self(ip.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("peer address unavailable")]
    MissingPeer,

    #[error("unusable peer address: {0}")]
    Unusable(IpAddr),
}

// Derive the client identity from the connection's peer address
pub fn extract_client_identity(peer: Option<SocketAddr>) -> Result<ClientIdentity, IdentityError> {
    let addr = peer.ok_or(IdentityError::MissingPeer)?;
    let ip = addr.ip();
    if ip.is_unspecified() {
        return Err(IdentityError::Unusable(ip));
    }
    Ok(ClientIdentity::from_ip(ip))
}
