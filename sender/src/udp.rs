//! UDP encapsulation of SCTP datagrams (RFC 6951)

use logging::Logger;
use sctp::{AfSpecific, Datagram, Result, Route, SctpError};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

/// UDP header carried in front of every encapsulated packet.
pub const UDP_HEADER_SIZE: u32 = 8;

/// Egress that sends each SCTP datagram as the payload of a UDP datagram
pub struct UdpAf {
    socket: UdpSocket,
    link_mtu: u32,
    logger: Logger,
    bytes_sent: u64,
    bytes_received: u64,
}

impl UdpAf {
    /// Create a non-blocking UDP socket bound to `bind_addr`
    ///
    /// # Arguments
    /// * `bind_addr` - Local address for bind
    /// * `link_mtu` - MTU of the link below UDP
    /// * `logger` - Logger
    pub fn new(bind_addr: SocketAddr, link_mtu: u32, logger: Logger) -> Result<Self> {
        logger.info(&format!("Creating UDP socket at {}", bind_addr));

        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| SctpError::Transmit(format!("Error creating socket: {}", e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| SctpError::Transmit(format!("Error setting non-blocking: {}", e)))?;

        Ok(UdpAf {
            socket,
            link_mtu,
            logger,
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some((data, addr)))` - Data and sender address received
    /// * `Ok(None)` - No data available
    pub fn receive(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; 65536];

        match self.socket.recv_from(&mut buf) {
            Ok((size, addr)) => {
                buf.truncate(size);
                self.bytes_received += size as u64;
                Ok(Some((buf, addr)))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(SctpError::Transmit(format!("Error receiving: {}", e))),
        }
    }

    /// Returns (bytes_sent, bytes_received)
    pub fn stats(&self) -> (u64, u64) {
        (self.bytes_sent, self.bytes_received)
    }
}

impl AfSpecific for UdpAf {
    fn route(&mut self, _dest: SocketAddr) -> Option<Route> {
        Some(Route::new(self.link_mtu.saturating_sub(UDP_HEADER_SIZE)))
    }

    fn xmit(&mut self, datagram: Datagram) -> Result<()> {
        let sent = self
            .socket
            .send_to(&datagram.bytes, datagram.dest)
            .map_err(|e| SctpError::Transmit(format!("Error sending to {}: {}", datagram.dest, e)))?;

        self.bytes_sent += sent as u64;
        if self.bytes_sent % 100_000 < sent as u64 {
            self.logger
                .debug(&format!("Total bytes sent: {}", self.bytes_sent));
        }
        Ok(())
    }
}

impl std::fmt::Debug for UdpAf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpAf")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("link_mtu", &self.link_mtu)
            .field("bytes_sent", &self.bytes_sent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::LogLevel;

    fn udp_af() -> UdpAf {
        let (logger, _capture) = Logger::in_memory(LogLevel::Debug);
        UdpAf::new("127.0.0.1:0".parse().unwrap(), 1500, logger).unwrap()
    }

    #[test]
    fn test_route_leaves_room_for_udp_header() {
        let mut af = udp_af();
        let route = af.route("127.0.0.1:9".parse().unwrap()).unwrap();
        assert_eq!(route.pmtu, 1492);
        assert!(!route.checksum_offload);
    }

    #[test]
    fn test_xmit_reaches_peer() {
        let mut af = udp_af();
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();

        af.xmit(Datagram {
            dest: peer.local_addr().unwrap(),
            bytes: vec![1, 2, 3, 4],
            ipfragok: false,
            checksum_offload: false,
            ecn_capable: false,
        })
        .unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3, 4]);
        assert_eq!(from, af.local_addr().unwrap());
        assert_eq!(af.stats(), (4, 0));
    }

    #[test]
    fn test_receive_without_data() {
        let mut af = udp_af();
        assert!(af.receive().unwrap().is_none());
    }
}
