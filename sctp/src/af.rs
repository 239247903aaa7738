//! Address-family hooks used to route and emit finished datagrams.

use crate::error::{Result, SctpError};
use crate::transport::Route;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Network-layer family of a transport address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Size of the network header preceding the SCTP common header.
    pub fn net_header_len(self) -> u32 {
        match self {
            AddressFamily::Ipv4 => 20,
            AddressFamily::Ipv6 => 40,
        }
    }
}

/// A finished SCTP datagram handed to [`AfSpecific::xmit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub dest: SocketAddr,
    /// Common header and chunks; the network header is the hook's business.
    pub bytes: Vec<u8>,
    /// Network-layer fragmentation is permitted.
    pub ipfragok: bool,
    /// The checksum field is left for the route to fill in.
    pub checksum_offload: bool,
    /// ECT codepoint should be set on the outer header.
    pub ecn_capable: bool,
}

/// Per-family operations the output path depends on.
pub trait AfSpecific {
    /// Resolves a route for `dest`, or `None` if unreachable.
    fn route(&mut self, dest: SocketAddr) -> Option<Route>;

    /// Marks outgoing traffic as ECN-capable. Called once per datagram.
    fn ecn_capable(&mut self) {}

    fn xmit(&mut self, datagram: Datagram) -> Result<()>;
}

/// In-memory egress: datagrams are kept instead of sent.
///
/// Handy for simulations and for driving the output path without sockets.
#[derive(Debug, Default)]
pub struct MemoryAf {
    routes: HashMap<SocketAddr, Route>,
    default_route: Option<Route>,
    fail_xmit: Option<String>,
    pub sent: Vec<Datagram>,
    pub ecn_marks: usize,
}

impl MemoryAf {
    /// Every destination is reachable through `route`.
    pub fn with_default_route(route: Route) -> Self {
        Self {
            default_route: Some(route),
            ..Self::default()
        }
    }

    pub fn add_route(&mut self, dest: SocketAddr, route: Route) {
        self.routes.insert(dest, route);
    }

    pub fn remove_routes(&mut self) {
        self.routes.clear();
        self.default_route = None;
    }

    /// Makes subsequent `xmit` calls fail with `reason` until cleared.
    pub fn fail_xmit(&mut self, reason: Option<&str>) {
        self.fail_xmit = reason.map(str::to_string);
    }

    pub fn take_sent(&mut self) -> Vec<Datagram> {
        std::mem::take(&mut self.sent)
    }
}

impl AfSpecific for MemoryAf {
    fn route(&mut self, dest: SocketAddr) -> Option<Route> {
        self.routes.get(&dest).cloned().or_else(|| self.default_route.clone())
    }

    fn ecn_capable(&mut self) {
        self.ecn_marks += 1;
    }

    fn xmit(&mut self, datagram: Datagram) -> Result<()> {
        if let Some(reason) = &self.fail_xmit {
            return Err(SctpError::Transmit(reason.clone()));
        }
        self.sent.push(datagram);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_header_len() {
        let v4: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let v6: SocketAddr = "[::1]:5000".parse().unwrap();
        assert_eq!(AddressFamily::of(&v4).net_header_len(), 20);
        assert_eq!(AddressFamily::of(&v6).net_header_len(), 40);
    }

    #[test]
    fn test_memory_af_routes() {
        let dest: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let mut af = MemoryAf::default();
        assert!(af.route(dest).is_none());

        af.add_route(dest, Route::new(1400));
        assert_eq!(af.route(dest).map(|r| r.pmtu), Some(1400));

        af.remove_routes();
        assert!(af.route(dest).is_none());
    }

    #[test]
    fn test_memory_af_xmit_failure() {
        let dest: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let mut af = MemoryAf::with_default_route(Route::new(1500));
        af.fail_xmit(Some("link down"));
        let datagram = Datagram {
            dest,
            bytes: vec![0; 12],
            ipfragok: false,
            checksum_offload: false,
            ecn_capable: false,
        };
        assert!(af.xmit(datagram.clone()).is_err());

        af.fail_xmit(None);
        af.xmit(datagram).unwrap();
        assert_eq!(af.take_sent().len(), 1);
        assert!(af.sent.is_empty());
    }
}
