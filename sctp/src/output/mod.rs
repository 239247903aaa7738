//! Packet assembly and transmission.
//!
//! A [`Packet`] collects chunks bound for one transport until it is full or
//! the caller flushes it, then serializes them into a single datagram:
//!
//! ```text
//! +----------------+---------+---------+-----+---------+
//! | common header  | chunk 1 | chunk 2 | ... | chunk N |
//! | (12 bytes)     | padded  | padded  |     | padded  |
//! +----------------+---------+---------+-----+---------+
//! ```
//!
//! Admission ([`Packet::append_chunk`]) enforces the peer window,
//! congestion window, Nagle and path MTU, and pulls in AUTH and SACK
//! chunks where they can ride along. Refused chunks are handed back with
//! the reason so the caller can retry later.

mod append;
mod transmit;

use crate::af::AddressFamily;
use crate::chunk::ChunkType;
use crate::outbound::OutboundChunk;
use crate::transport::TransportId;
use std::fmt;

/// Size of the SCTP common header.
pub const SCTP_HEADER_SIZE: usize = 12;

/// Why a chunk was not admitted. These are flow-control signals, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmitStatus {
    /// The chunk does not fit in the path MTU; send the packet first.
    PmtuFull,
    /// The peer's receive window or the congestion window is exhausted.
    RwndFull,
    /// Held back to coalesce small writes.
    NagleDelay,
}

impl fmt::Display for XmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmitStatus::PmtuFull => write!(f, "PMTU full"),
            XmitStatus::RwndFull => write!(f, "receive window full"),
            XmitStatus::NagleDelay => write!(f, "Nagle delay"),
        }
    }
}

/// A refused chunk, returned to the caller with the reason.
#[derive(Debug, PartialEq)]
pub struct Refused {
    pub status: XmitStatus,
    pub chunk: OutboundChunk,
}

pub type XmitResult = std::result::Result<(), Refused>;

#[derive(Debug, PartialEq)]
pub struct Packet {
    transport: TransportId,
    source_port: u16,
    destination_port: u16,
    vtag: u32,
    /// Network plus common header bytes.
    overhead: u32,
    /// Overhead plus the word-rounded length of every queued chunk.
    size: u32,
    has_cookie_echo: bool,
    has_sack: bool,
    has_auth: bool,
    has_data: bool,
    ipfragok: bool,
    /// Position of the AUTH chunk in `chunks`.
    auth_index: Option<usize>,
    chunks: Vec<OutboundChunk>,
}

impl Packet {
    pub fn new(
        transport: TransportId,
        family: AddressFamily,
        source_port: u16,
        destination_port: u16,
    ) -> Self {
        let overhead = family.net_header_len() + SCTP_HEADER_SIZE as u32;
        Self {
            transport,
            source_port,
            destination_port,
            vtag: 0,
            overhead,
            size: overhead,
            has_cookie_echo: false,
            has_sack: false,
            has_auth: false,
            has_data: false,
            ipfragok: false,
            auth_index: None,
            chunks: Vec::new(),
        }
    }

    /// Rebinds the packet to a transport and port pair. Any queued chunks
    /// are dropped.
    pub fn init(
        &mut self,
        transport: TransportId,
        family: AddressFamily,
        source_port: u16,
        destination_port: u16,
    ) {
        self.transport = transport;
        self.source_port = source_port;
        self.destination_port = destination_port;
        self.overhead = family.net_header_len() + SCTP_HEADER_SIZE as u32;
        self.vtag = 0;
        self.free();
    }

    /// Returns the packet to its just-initialized state, keeping the
    /// binding and verification tag.
    pub fn reset(&mut self) {
        self.size = self.overhead;
        self.has_cookie_echo = false;
        self.has_sack = false;
        self.has_auth = false;
        self.has_data = false;
        self.ipfragok = false;
        self.auth_index = None;
        self.chunks.clear();
    }

    /// Drops every queued chunk and resets. Control chunks are gone for
    /// good; DATA handles survive wherever else they are held.
    pub fn free(&mut self) {
        self.chunks.clear();
        self.reset();
    }

    pub fn transport(&self) -> TransportId {
        self.transport
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    pub fn destination_port(&self) -> u16 {
        self.destination_port
    }

    pub fn vtag(&self) -> u32 {
        self.vtag
    }

    pub fn overhead(&self) -> u32 {
        self.overhead
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn has_cookie_echo(&self) -> bool {
        self.has_cookie_echo
    }

    pub fn has_sack(&self) -> bool {
        self.has_sack
    }

    pub fn has_auth(&self) -> bool {
        self.has_auth
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// Network-layer fragmentation is allowed for this packet.
    pub fn ipfragok(&self) -> bool {
        self.ipfragok
    }

    pub fn chunks(&self) -> &[OutboundChunk] {
        &self.chunks
    }

    /// Queued chunk types in wire order.
    pub fn chunk_types(&self) -> Vec<Option<ChunkType>> {
        self.chunks.iter().map(OutboundChunk::chunk_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_packet_overhead() {
        let v4 = Packet::new(TransportId(0), AddressFamily::Ipv4, 5000, 5001);
        assert_eq!(v4.overhead(), 32);
        assert_eq!(v4.size(), 32);
        assert!(v4.is_empty());

        let v6 = Packet::new(TransportId(1), AddressFamily::Ipv6, 5000, 5001);
        assert_eq!(v6.size(), 52);
    }

    #[test]
    fn test_init_rebinds_and_clears_vtag() {
        let mut packet = Packet::new(TransportId(0), AddressFamily::Ipv4, 1, 2);
        packet.vtag = 99;
        packet.ipfragok = true;
        packet.init(TransportId(3), AddressFamily::Ipv6, 7, 8);

        assert_eq!(packet, Packet::new(TransportId(3), AddressFamily::Ipv6, 7, 8));
    }

    #[test]
    fn test_reset_keeps_vtag() {
        let mut packet = Packet::new(TransportId(0), AddressFamily::Ipv4, 1, 2);
        packet.vtag = 42;
        packet.size = 400;
        packet.has_sack = true;
        packet.auth_index = Some(0);
        packet.reset();

        assert_eq!(packet.vtag(), 42);
        assert_eq!(packet.size(), packet.overhead());
        assert!(!packet.has_sack());
        assert_eq!(packet.auth_index, None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(XmitStatus::RwndFull.to_string(), "receive window full");
    }
}
