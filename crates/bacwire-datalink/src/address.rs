use bacwire_core::npdu::NpduAddress;
use core::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Where a device is reached: the UDP endpoint, plus the remote network
/// address when the device sits behind a BACnet router.
///
/// Addresses are immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    socket: SocketAddr,
    remote: Option<NpduAddress>,
}

impl Address {
    pub const BACNET_IP_DEFAULT_PORT: u16 = 47808;

    pub const fn ip(socket: SocketAddr) -> Self {
        Self {
            socket,
            remote: None,
        }
    }

    pub const fn routed(socket: SocketAddr, remote: NpduAddress) -> Self {
        Self {
            socket,
            remote: Some(remote),
        }
    }

    pub fn local_broadcast(port: u16) -> Self {
        Self::ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port))
    }

    pub fn bacnet_default(addr: IpAddr) -> Self {
        Self::ip(SocketAddr::new(addr, Self::BACNET_IP_DEFAULT_PORT))
    }

    pub const fn socket_addr(&self) -> SocketAddr {
        self.socket
    }

    pub const fn remote(&self) -> Option<NpduAddress> {
        self.remote
    }

    /// Same address as `self` with the routed part replaced.
    pub const fn with_remote(self, remote: Option<NpduAddress>) -> Self {
        Self {
            socket: self.socket,
            remote,
        }
    }

    /// Whether a frame from `other` may answer a request sent to `self`.
    ///
    /// The UDP endpoints must agree. Routed parts must agree too, unless one
    /// side carries none: a device registered by IP alone still answers
    /// through its router with an SNET/SADR attached.
    pub fn is_equivalent(&self, other: &Address) -> bool {
        if self.socket != other.socket {
            return false;
        }
        match (self.remote, other.remote) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(socket: SocketAddr) -> Self {
        Self::ip(socket)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote {
            Some(remote) => write!(f, "{}@{}", remote, self.socket),
            None => write!(f, "{}", self.socket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Address;
    use bacwire_core::npdu::NpduAddress;
    use std::net::SocketAddr;

    fn sock(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn equivalence_ignores_missing_route() {
        let remote = NpduAddress::new(5, &[0x0A]).unwrap();
        let plain = Address::ip(sock("192.168.1.10:47808"));
        let routed = Address::routed(sock("192.168.1.10:47808"), remote);
        assert!(plain.is_equivalent(&routed));
        assert!(routed.is_equivalent(&plain));
        assert_ne!(plain, routed);
    }

    #[test]
    fn equivalence_requires_same_endpoint_and_route() {
        let a = Address::routed(
            sock("192.168.1.10:47808"),
            NpduAddress::new(5, &[0x0A]).unwrap(),
        );
        let b = Address::routed(
            sock("192.168.1.10:47808"),
            NpduAddress::new(5, &[0x0B]).unwrap(),
        );
        assert!(!a.is_equivalent(&b));
        assert!(!Address::ip(sock("192.168.1.10:47808"))
            .is_equivalent(&Address::ip(sock("192.168.1.11:47808"))));
    }

    #[test]
    fn display_shows_route() {
        let routed = Address::routed(sock("10.0.0.1:47808"), NpduAddress::new(7, &[0x12]).unwrap());
        assert_eq!(routed.to_string(), "7:12@10.0.0.1:47808");
        assert_eq!(Address::bacnet_default("10.0.0.2".parse().unwrap()).to_string(), "10.0.0.2:47808");
    }
}
