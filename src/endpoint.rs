//! Remote endpoint identity of one packet stream.
//!
//! A queue is keyed by the sender's IP address and UDP port. Port zero marks
//! the queue unbound: setting a non-zero port arms it, zeroing the port
//! disarms it. The address family rides along in [`IpAddr`], which is the
//! tagged V4/V6 union this crate uses everywhere.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Address + port of the remote sender feeding a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl RemoteEndpoint {
    /// An unbound endpoint: unspecified IPv4 address, port zero.
    pub fn unbound() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }

    /// A queue is active exactly when its port is non-zero.
    pub fn is_bound(&self) -> bool {
        self.port != 0
    }

    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// Socket address form, available only while bound.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.is_bound().then(|| SocketAddr::new(self.addr, self.port))
    }
}

impl From<SocketAddr> for RemoteEndpoint {
    fn from(sa: SocketAddr) -> Self {
        Self {
            addr: sa.ip(),
            port: sa.port(),
        }
    }
}

impl std::fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
