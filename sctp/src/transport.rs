//! A single peer destination address and its path state.

use crate::af::AddressFamily;
use crate::output::Packet;
use std::fmt;
use std::net::SocketAddr;

/// Index of a transport within its association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(pub(crate) usize);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport#{}", self.0)
    }
}

/// Cached route towards a transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pmtu: u32,
    /// The device computes the SCTP checksum.
    pub checksum_offload: bool,
    obsolete: bool,
}

impl Route {
    pub fn new(pmtu: u32) -> Self {
        Self {
            pmtu,
            checksum_offload: false,
            obsolete: false,
        }
    }

    pub fn with_offload(mut self) -> Self {
        self.checksum_offload = true;
        self
    }

    /// Forces a fresh lookup before the next transmission.
    pub fn invalidate(&mut self) {
        self.obsolete = true;
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }
}

#[derive(Debug)]
pub struct Transport {
    id: TransportId,
    addr: SocketAddr,
    pub cwnd: u32,
    pub ssthresh: u32,
    /// Bytes sent on this path and not yet acknowledged.
    pub flight_size: u32,
    pub pathmtu: u32,
    /// An RTT measurement is outstanding on this path.
    pub rto_pending: bool,
    pub(crate) route: Option<Route>,
    pub(crate) packet: Packet,
}

impl Transport {
    pub(crate) fn new(
        id: TransportId,
        addr: SocketAddr,
        pathmtu: u32,
        local_port: u16,
        peer_port: u16,
    ) -> Self {
        Self {
            id,
            addr,
            cwnd: initial_cwnd(pathmtu),
            ssthresh: u32::MAX,
            flight_size: 0,
            pathmtu,
            rto_pending: false,
            route: None,
            packet: Packet::new(id, AddressFamily::of(&addr), local_port, peer_port),
        }
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.addr)
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// The packet being assembled for this path.
    pub fn packet(&self) -> &Packet {
        &self.packet
    }
}

/// RFC 4960 7.2.1: min(4*MTU, max(2*MTU, 4380)).
fn initial_cwnd(pathmtu: u32) -> u32 {
    (4 * pathmtu).min((2 * pathmtu).max(4380))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_cwnd() {
        assert_eq!(initial_cwnd(1500), 4380);
        assert_eq!(initial_cwnd(512), 2048);
        assert_eq!(initial_cwnd(9000), 18000);
    }

    #[test]
    fn test_new_transport() {
        let addr: SocketAddr = "[2001:db8::1]:5000".parse().unwrap();
        let transport = Transport::new(TransportId(0), addr, 1500, 5000, 5001);
        assert_eq!(transport.family(), AddressFamily::Ipv6);
        assert_eq!(transport.flight_size, 0);
        assert!(transport.route().is_none());
        assert_eq!(transport.packet().overhead(), 40 + 12);
        assert!(transport.packet().is_empty());
    }

    #[test]
    fn test_route_invalidate() {
        let mut route = Route::new(1500).with_offload();
        assert!(route.checksum_offload);
        assert!(!route.is_obsolete());
        route.invalidate();
        assert!(route.is_obsolete());
    }
}
