//! SCTP association context
//!
//! Holds everything the output path reads or updates besides the packet
//! itself: peer window and capabilities, TSN/SSN generators, the outbound
//! queue counters, timers, socket state, counters and the address-family
//! hooks. Handshake and receive processing live elsewhere; this type only
//! exposes the entry points they need (`establish`, `note_received_tsn`).

use crate::af::AfSpecific;
use crate::auth::AuthKey;
use crate::chunk::{
    ChunkType, DATA_CHUNK_HEADER_SIZE, MAX_SACK_ENTRIES, SackChunk, SctpChunk, word_round,
    word_trunc,
};
use crate::config::{MIN_PATHMTU, OutputConfig};
use crate::error::{Result, SctpError};
use crate::outbound::ControlChunk;
use crate::outqueue::OutQueue;
use crate::output::{Packet, SCTP_HEADER_SIZE};
use crate::stats::Mib;
use crate::timer::Timer;
use crate::transport::{Route, Transport, TransportId};
use logging::Logger;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// SCTP association states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    /// Initial state, no association
    Closed,
    /// INIT sent, waiting for INIT-ACK
    CookieWait,
    /// COOKIE-ECHO sent, waiting for COOKIE-ACK
    CookieEchoed,
    /// Association established
    Established,
    /// Shutdown initiated
    ShutdownPending,
    /// Shutdown sent
    ShutdownSent,
    /// Shutdown received
    ShutdownReceived,
    /// Shutdown acknowledged
    ShutdownAckSent,
}

impl AssociationState {
    /// States in which DATA may be queued by the user.
    pub fn accepts_data(self) -> bool {
        matches!(
            self,
            AssociationState::CookieWait
                | AssociationState::CookieEchoed
                | AssociationState::Established
        )
    }

    /// States in which queued DATA may be put on the wire.
    pub fn can_send_data(self) -> bool {
        matches!(
            self,
            AssociationState::CookieEchoed
                | AssociationState::Established
                | AssociationState::ShutdownPending
                | AssociationState::ShutdownReceived
        )
    }
}

/// What we know about the peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub vtag: u32,
    /// Peer's receive window as last advertised, minus data sent since.
    pub rwnd: u32,
    pub auth_capable: bool,
    pub prsctp_capable: bool,
    pub ecn_capable: bool,
    /// A SACK is owed to the peer.
    pub sack_needed: bool,
    /// Chunk types the peer wants authenticated.
    pub auth_chunks: Vec<ChunkType>,
    pub last_sent_to: Option<TransportId>,
}

/// Socket-level options and the pending error slot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SocketState {
    pub nodelay: bool,
    /// First unreported send error.
    pub err: Option<SctpError>,
}

impl SocketState {
    pub fn take_error(&mut self) -> Option<SctpError> {
        self.err.take()
    }
}

/// TSNs received from the peer, enough to build a SACK.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveState {
    cumulative_tsn: u32,
    out_of_order: BTreeSet<u32>,
    duplicates: Vec<u32>,
}

impl ReceiveState {
    pub fn new(peer_initial_tsn: u32) -> Self {
        Self {
            cumulative_tsn: peer_initial_tsn.wrapping_sub(1),
            ..Self::default()
        }
    }

    pub fn cumulative_tsn(&self) -> u32 {
        self.cumulative_tsn
    }

    /// Records an arriving TSN. Returns false for duplicates.
    pub fn record(&mut self, tsn: u32) -> bool {
        if !tsn_gt(tsn, self.cumulative_tsn) || !self.out_of_order.insert(tsn) {
            self.duplicates.push(tsn);
            return false;
        }
        while self
            .out_of_order
            .remove(&self.cumulative_tsn.wrapping_add(1))
        {
            self.cumulative_tsn = self.cumulative_tsn.wrapping_add(1);
        }
        true
    }

    /// Gap ack blocks as offsets from the cumulative TSN.
    pub fn gap_blocks(&self) -> Vec<(u16, u16)> {
        let mut offsets: Vec<u32> = self
            .out_of_order
            .iter()
            .map(|tsn| tsn.wrapping_sub(self.cumulative_tsn))
            .filter(|offset| *offset <= u16::MAX as u32)
            .collect();
        offsets.sort_unstable();

        let mut blocks: Vec<(u16, u16)> = Vec::new();
        for offset in offsets {
            let offset = offset as u16;
            match blocks.last_mut() {
                Some((_, end)) if *end + 1 == offset => *end = offset,
                _ => blocks.push((offset, offset)),
            }
        }
        blocks
    }

    fn take_duplicates(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.duplicates)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timers {
    /// Delayed SACK.
    pub sack: Timer,
    pub autoclose: Timer,
}

/// Expiries reported by [`Association::poll_timers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The delayed SACK fired; a SACK has been queued.
    SackDue,
    /// The association sat idle for the autoclose interval.
    Autoclose,
}

#[derive(Debug)]
pub struct Association<A: AfSpecific> {
    pub(crate) state: AssociationState,
    local_port: u16,
    peer_port: u16,
    pub(crate) peer: PeerInfo,
    /// Our receive window and the value last advertised in a SACK.
    pub(crate) rwnd: u32,
    pub(crate) a_rwnd: u32,
    rx: ReceiveState,
    pub(crate) outq: OutQueue,
    next_tsn: u32,
    /// Next SSN per outbound stream.
    ssn: Vec<u16>,
    pathmtu: Option<u32>,
    frag_point: u32,
    default_pathmtu: u32,
    pmtud_enabled: bool,
    pub(crate) no_checksums: bool,
    pub(crate) ecn_enabled: bool,
    pub(crate) autoclose: Option<Duration>,
    pub(crate) timers: Timers,
    pub(crate) socket: SocketState,
    need_ecne: bool,
    last_ecne_tsn: u32,
    auth_key: Option<AuthKey>,
    pub(crate) transports: Vec<Transport>,
    pub(crate) mib: Mib,
    af: A,
    logger: Logger,
}

impl<A: AfSpecific> Association<A> {
    pub fn new(
        config: &OutputConfig,
        af: A,
        logger: &Logger,
        local_port: u16,
        peer_port: u16,
    ) -> Result<Self> {
        config.validate()?;
        let auth_key = config.auth_key()?;
        let auth_chunks = config.auth_chunk_types()?;

        let mut association = Self {
            state: AssociationState::Closed,
            local_port,
            peer_port,
            peer: PeerInfo {
                vtag: 0,
                rwnd: config.rwnd,
                auth_capable: auth_key.is_some(),
                prsctp_capable: false,
                ecn_capable: config.ecn_enabled,
                sack_needed: false,
                auth_chunks,
                last_sent_to: None,
            },
            rwnd: config.rwnd,
            a_rwnd: config.rwnd,
            rx: ReceiveState::default(),
            outq: OutQueue::new(),
            next_tsn: rand::random(),
            ssn: vec![0; config.outbound_streams as usize],
            pathmtu: None,
            frag_point: 0,
            default_pathmtu: config.default_pathmtu,
            pmtud_enabled: config.pmtud_enabled,
            no_checksums: config.no_checksums,
            ecn_enabled: config.ecn_enabled,
            autoclose: config.autoclose(),
            timers: Timers {
                sack: Timer::new(config.sack_delay()),
                autoclose: Timer::new(config.autoclose().unwrap_or_default()),
            },
            socket: SocketState {
                nodelay: config.nodelay,
                err: None,
            },
            need_ecne: false,
            last_ecne_tsn: 0,
            auth_key,
            transports: Vec::new(),
            mib: Mib::default(),
            af,
            logger: logger.for_component("SCTP"),
        };
        association.frag_point = association.compute_frag_point(config.default_pathmtu);
        Ok(association)
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn set_state(&mut self, state: AssociationState) {
        if self.state != state {
            self.logger
                .info(&format!("association state {:?} -> {:?}", self.state, state));
            self.state = state;
        }
    }

    /// Entry point for a handshake completed elsewhere.
    pub fn establish(&mut self, peer_vtag: u32, peer_rwnd: u32, peer_initial_tsn: u32) {
        self.peer.vtag = peer_vtag;
        self.peer.rwnd = peer_rwnd;
        self.rx = ReceiveState::new(peer_initial_tsn);
        self.set_state(AssociationState::Established);
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn peer_mut(&mut self) -> &mut PeerInfo {
        &mut self.peer
    }

    pub fn socket(&self) -> &SocketState {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut SocketState {
        &mut self.socket
    }

    pub fn outq(&self) -> &OutQueue {
        &self.outq
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn mib(&self) -> &Mib {
        &self.mib
    }

    pub fn af(&self) -> &A {
        &self.af
    }

    pub fn af_mut(&mut self) -> &mut A {
        &mut self.af
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn auth_key(&self) -> Option<&AuthKey> {
        self.auth_key.as_ref()
    }

    pub fn receive_state(&self) -> &ReceiveState {
        &self.rx
    }

    /// Our receive window, advertised in SACKs.
    pub fn set_rwnd(&mut self, rwnd: u32) {
        self.rwnd = rwnd;
    }

    /// TSN the next new DATA chunk will get.
    pub fn next_tsn(&self) -> u32 {
        self.next_tsn
    }

    pub(crate) fn take_tsn(&mut self) -> u32 {
        let tsn = self.next_tsn;
        self.next_tsn = self.next_tsn.wrapping_add(1);
        tsn
    }

    pub fn outbound_streams(&self) -> u16 {
        self.ssn.len() as u16
    }

    /// SSN the next message on `stream_id` will carry.
    pub fn ssn_peek(&self, stream_id: u16) -> u16 {
        self.ssn.get(stream_id as usize).copied().unwrap_or(0)
    }

    /// Consumes the next SSN on `stream_id`.
    pub(crate) fn ssn_next(&mut self, stream_id: u16) -> u16 {
        match self.ssn.get_mut(stream_id as usize) {
            Some(next) => {
                let ssn = *next;
                *next = next.wrapping_add(1);
                ssn
            }
            None => 0,
        }
    }

    /// Association-wide path MTU, once a transport exists.
    pub fn pathmtu(&self) -> Option<u32> {
        self.pathmtu
    }

    /// Largest DATA payload that fits in one packet at the current PMTU.
    pub fn frag_point(&self) -> u32 {
        self.frag_point
    }

    pub fn add_transport(&mut self, addr: SocketAddr) -> TransportId {
        let id = TransportId(self.transports.len());
        self.transports.push(Transport::new(
            id,
            addr,
            self.default_pathmtu,
            self.local_port,
            self.peer_port,
        ));
        self.logger.debug(&format!("added {} for {}", id, addr));
        self.sync_pmtu();
        id
    }

    pub fn transport(&self, id: TransportId) -> Option<&Transport> {
        self.transports.get(id.0)
    }

    pub fn transport_mut(&mut self, id: TransportId) -> Option<&mut Transport> {
        self.transports.get_mut(id.0)
    }

    pub fn transports(&self) -> &[Transport] {
        &self.transports
    }

    /// Transport ids are only minted by `add_transport`, so indexing holds
    /// unless a packet is used with a foreign association.
    pub(crate) fn path(&self, id: TransportId) -> &Transport {
        &self.transports[id.0]
    }

    pub(crate) fn path_mut(&mut self, id: TransportId) -> &mut Transport {
        &mut self.transports[id.0]
    }

    /// Recomputes the association PMTU as the smallest transport PMTU and
    /// derives the fragmentation point from it.
    pub fn sync_pmtu(&mut self) {
        let Some(pmtu) = self.transports.iter().map(|t| t.pathmtu).min() else {
            return;
        };
        if self.pathmtu != Some(pmtu) {
            self.logger.info(&format!("association PMTU set to {}", pmtu));
        }
        self.pathmtu = Some(pmtu);
        self.frag_point = self.compute_frag_point(pmtu);
    }

    fn compute_frag_point(&self, pmtu: u32) -> u32 {
        let net_header = self
            .transports
            .iter()
            .map(|t| t.family().net_header_len())
            .max()
            .unwrap_or(20);
        let mut frag = pmtu.saturating_sub(
            net_header + SCTP_HEADER_SIZE as u32 + DATA_CHUNK_HEADER_SIZE as u32,
        );
        if let Some(key) = self.auth_key.as_ref().filter(|_| self.requires_auth(ChunkType::Data)) {
            let auth_len = word_round(8 + key.algorithm.digest_len() as u32);
            frag = frag.saturating_sub(auth_len);
        }
        word_trunc(frag)
    }

    /// Looks up a route for `id` if it has none or it went stale. Adopts
    /// the route's MTU when PMTU discovery is on.
    pub(crate) fn refresh_route(&mut self, id: TransportId) -> Option<Route> {
        let transport = &mut self.transports[id.0];
        let stale = transport.route.as_ref().is_none_or(Route::is_obsolete);
        let mut mtu_changed = false;
        if stale {
            transport.route = self.af.route(transport.addr());
            if let Some(route) = &transport.route
                && self.pmtud_enabled
            {
                let pmtu = route.pmtu.max(MIN_PATHMTU);
                mtu_changed = pmtu != transport.pathmtu;
                transport.pathmtu = pmtu;
            }
        }
        let route = transport.route.clone();
        if stale && self.pmtud_enabled {
            if mtu_changed {
                self.logger
                    .info(&format!("{} PMTU now {}", id, self.transports[id.0].pathmtu));
            }
            self.sync_pmtu();
        }
        route
    }

    /// Whether the peer requires chunks of `chunk_type` to be authenticated.
    pub fn requires_auth(&self, chunk_type: ChunkType) -> bool {
        self.peer.auth_capable && self.peer.auth_chunks.contains(&chunk_type)
    }

    /// Receive-side hook: a DATA chunk with `tsn` arrived. A SACK becomes
    /// due and the delayed-SACK timer starts if idle.
    pub fn note_received_tsn(&mut self, tsn: u32, now: Instant) -> bool {
        let fresh = self.rx.record(tsn);
        self.peer.sack_needed = true;
        if !self.timers.sack.is_pending() {
            self.timers.sack.arm(now);
        }
        fresh
    }

    /// Builds a SACK from the receive state, advertising `a_rwnd`.
    pub fn make_sack(&mut self) -> ControlChunk {
        // Gap blocks first, then as many duplicates as still fit the
        // 16-bit length. The rest of the duplicates are dropped.
        let mut gap_ack_blocks = self.rx.gap_blocks();
        gap_ack_blocks.truncate(MAX_SACK_ENTRIES);
        let mut duplicate_tsns = self.rx.take_duplicates();
        duplicate_tsns.truncate(MAX_SACK_ENTRIES - gap_ack_blocks.len());

        let sack = SackChunk {
            cumulative_tsn: self.rx.cumulative_tsn(),
            a_rwnd: self.a_rwnd,
            gap_ack_blocks,
            duplicate_tsns,
        };
        let mut chunk = ControlChunk::wrap(SctpChunk::Sack(sack));
        chunk.auth = self.requires_auth(ChunkType::Sack);
        chunk
    }

    /// AUTH chunk with a zeroed HMAC for the active key.
    pub fn make_auth(&self) -> Option<ControlChunk> {
        self.auth_key
            .as_ref()
            .map(|key| ControlChunk::wrap(key.placeholder_chunk()))
    }

    /// Starts echoing congestion experienced at `lowest_tsn`.
    pub fn request_ecne(&mut self, lowest_tsn: u32) {
        self.need_ecne = true;
        self.last_ecne_tsn = lowest_tsn;
    }

    /// The peer reduced its window; stop echoing.
    pub fn on_cwr(&mut self) {
        self.need_ecne = false;
    }

    /// ECN-Echo to lead the next packet with, while one is owed.
    pub fn ecne_prepend(&mut self) -> Option<ControlChunk> {
        if !self.need_ecne {
            return None;
        }
        let mut chunk = ControlChunk::wrap(SctpChunk::Ecne {
            lowest_tsn: self.last_ecne_tsn,
        });
        chunk.auth = self.requires_auth(ChunkType::Ecne);
        Some(chunk)
    }

    pub(crate) fn mark_ecn(&mut self) {
        self.af.ecn_capable();
    }

    pub(crate) fn xmit(&mut self, datagram: crate::af::Datagram) -> Result<()> {
        self.af.xmit(datagram)
    }

    /// Runs `f` on the packet being assembled for `id`.
    ///
    /// The packet is taken out of its transport for the duration so that
    /// `f` can borrow the association mutably next to it.
    ///
    /// # Panics
    ///
    /// If `id` was not returned by this association's `add_transport`.
    pub fn with_packet<R>(
        &mut self,
        id: TransportId,
        f: impl FnOnce(&mut Packet, &mut Self) -> R,
    ) -> R {
        let transport = &mut self.transports[id.0];
        let placeholder = Packet::new(id, transport.family(), self.local_port, self.peer_port);
        let mut packet = std::mem::replace(&mut transport.packet, placeholder);
        let out = f(&mut packet, self);
        self.transports[id.0].packet = packet;
        out
    }

    /// Handles timer expiries up to `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.timers.sack.expired(now) {
            self.timers.sack.disarm();
            self.a_rwnd = self.rwnd;
            let sack = self.make_sack();
            self.queue_control(sack);
            self.peer.sack_needed = false;
            events.push(TimerEvent::SackDue);
        }
        if self.timers.autoclose.expired(now) {
            self.timers.autoclose.disarm();
            self.logger.info("autoclose timer expired");
            events.push(TimerEvent::Autoclose);
        }
        events
    }
}

/// Compare TSNs accounting for wraparound (a > b in serial number arithmetic)
/// Per RFC 1982, a > b if (a - b) mod 2^32 is in range (0, 2^31)
pub(crate) fn tsn_gt(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff > 0 && diff < 0x8000_0000
}
