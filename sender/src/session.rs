//! Drives one association over UDP: queue messages, flush, apply SACKs
//! until everything is acknowledged.

use crate::config::{SenderConfig, SessionConfig};
use crate::udp::{UDP_HEADER_SIZE, UdpAf};
use logging::Logger;
use rand::Rng;
use sctp::config::MIN_PATHMTU;
use sctp::{
    Association, ControlChunk, ParsedPacket, Result, SctpChunk, SctpError, TimerEvent,
    TransportId,
};
use std::net::SocketAddr;
use std::thread;
use std::time::Instant;

/// SACKs reporting gaps without advancing the cumulative TSN before the
/// first missing chunk is fast-retransmitted (RFC 4960 7.2.4).
const FAST_RETRANSMIT_THRESHOLD: u32 = 3;

/// What a finished run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub messages: u32,
    pub bytes_queued: u64,
    pub bytes_acked: u64,
    pub packets_sent: u64,
    pub sacks_received: u32,
    pub retransmitted: usize,
}

pub struct Sender {
    assoc: Association<UdpAf>,
    transport: TransportId,
    session: SessionConfig,
    logger: Logger,
    missing_reports: u32,
}

impl Sender {
    /// Binds the UDP socket and sets up an association that is already
    /// established with the configured peer.
    pub fn new(config: &SenderConfig, logger: &Logger) -> Result<Self> {
        config.validate()?;
        let session = config.session.clone();

        let af = UdpAf::new(
            session.bind_addr()?,
            session.link_mtu,
            logger.for_component("UDP"),
        )?;
        // Fragment for the encapsulated MTU from the first message on.
        let mut output = config.output.clone();
        output.default_pathmtu = output
            .default_pathmtu
            .min(session.link_mtu.saturating_sub(UDP_HEADER_SIZE))
            .max(MIN_PATHMTU);
        let mut assoc = Association::new(
            &output,
            af,
            logger,
            session.local_port,
            session.peer_port,
        )?;
        let transport = assoc.add_transport(session.peer_addr()?);
        assoc.establish(
            session.peer_vtag,
            session.peer_rwnd,
            session.peer_initial_tsn,
        );

        Ok(Sender {
            assoc,
            transport,
            session,
            logger: logger.for_component("Sender"),
            missing_reports: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.assoc.af().local_addr()
    }

    pub fn association(&self) -> &Association<UdpAf> {
        &self.assoc
    }

    /// Queues `message_count` random payloads, spread over the streams.
    pub fn queue_messages(&mut self) -> Result<u64> {
        let mut rng = rand::thread_rng();
        let mut queued = 0u64;

        for index in 0..self.session.message_count {
            let mut payload = vec![0u8; self.session.message_size];
            rng.fill(&mut payload[..]);
            let stream_id = (index % self.session.stream_count as u32) as u16;
            self.assoc.send_message(
                stream_id,
                self.session.ppid,
                &payload,
                self.session.unordered,
            )?;
            queued += payload.len() as u64;
        }

        self.logger.info(&format!(
            "Queued {} messages ({} bytes)",
            self.session.message_count, queued
        ));
        Ok(queued)
    }

    /// Sends everything queued and waits for it to be acknowledged.
    ///
    /// Fails if the peer stays silent for `idle_timeout_ms` while data is
    /// outstanding, or if it aborts.
    pub fn run(&mut self) -> Result<SessionSummary> {
        let mut summary = SessionSummary {
            messages: self.session.message_count,
            bytes_queued: self.queue_messages()?,
            ..SessionSummary::default()
        };
        let mut last_heard = Instant::now();

        loop {
            let report = self.assoc.flush(self.transport)?;
            summary.retransmitted += report.retransmitted;
            if let Some(err) = self.assoc.socket_mut().take_error() {
                self.logger.warn(&format!("Deferred send error: {}", err));
            }

            while let Some((bytes, from)) = self.assoc.af_mut().receive()? {
                last_heard = Instant::now();
                self.handle_datagram(&bytes, from, &mut summary)?;
            }

            let now = Instant::now();
            if self
                .assoc
                .poll_timers(now)
                .contains(&TimerEvent::Autoclose)
            {
                self.logger.info("Association idle, closing");
                break;
            }

            if self.assoc.outq().is_empty() {
                // Anything the timers just queued still has to go out.
                self.assoc.flush(self.transport)?;
                break;
            }

            if now.duration_since(last_heard) > self.session.idle_timeout() {
                return Err(SctpError::Transmit(format!(
                    "no response from {} within {:?}, {} bytes outstanding",
                    self.session.peer_address,
                    self.session.idle_timeout(),
                    self.assoc.outq().outstanding_bytes()
                )));
            }

            thread::sleep(self.session.poll_interval());
        }

        summary.packets_sent = self.assoc.mib().out_packets;
        self.logger.info(&format!("Session finished: {}", self.assoc.mib()));
        Ok(summary)
    }

    fn handle_datagram(
        &mut self,
        bytes: &[u8],
        from: SocketAddr,
        summary: &mut SessionSummary,
    ) -> Result<()> {
        let packet = match ParsedPacket::parse_verified(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.logger
                    .warn(&format!("Dropping datagram from {}: {}", from, e));
                return Ok(());
            }
        };

        for chunk in packet.chunks {
            match chunk {
                SctpChunk::Sack(sack) => {
                    summary.sacks_received += 1;
                    let acked = self.assoc.ack(sack.cumulative_tsn, sack.a_rwnd);
                    summary.bytes_acked += acked as u64;
                    let has_gaps = !sack.gap_ack_blocks.is_empty();
                    self.track_missing(acked, sack.cumulative_tsn, has_gaps);
                }
                SctpChunk::Data(data) => {
                    self.assoc.note_received_tsn(data.tsn, Instant::now());
                }
                SctpChunk::Ecne { lowest_tsn } => {
                    self.reduce_cwnd();
                    self.assoc
                        .queue_control(ControlChunk::new(SctpChunk::Cwr { lowest_tsn })?);
                }
                SctpChunk::Cwr { .. } => self.assoc.on_cwr(),
                SctpChunk::Heartbeat(info) => {
                    self.assoc
                        .queue_control(ControlChunk::new(SctpChunk::HeartbeatAck(info))?);
                }
                SctpChunk::Abort { .. } => {
                    return Err(SctpError::InvalidState(format!(
                        "association aborted by {}",
                        from
                    )));
                }
                other => self.logger.debug(&format!(
                    "Ignoring chunk type {} from {}",
                    other.type_byte(),
                    from
                )),
            }
        }
        Ok(())
    }

    fn track_missing(&mut self, acked: u32, cumulative_tsn: u32, has_gaps: bool) {
        if acked > 0 || !has_gaps {
            self.missing_reports = 0;
            return;
        }
        self.missing_reports += 1;
        if self.missing_reports >= FAST_RETRANSMIT_THRESHOLD {
            self.missing_reports = 0;
            let missing = cumulative_tsn.wrapping_add(1);
            if self.assoc.mark_for_retransmit(missing) {
                self.reduce_cwnd();
            }
        }
    }

    /// RFC 4960 7.2.3/7.2.4: ssthresh = max(cwnd / 2, 4 * MTU), cwnd = ssthresh.
    fn reduce_cwnd(&mut self) {
        if let Some(transport) = self.assoc.transport_mut(self.transport) {
            transport.ssthresh = (transport.cwnd / 2).max(4 * transport.pathmtu);
            transport.cwnd = transport.ssthresh;
            self.logger.info(&format!(
                "Congestion on {}, cwnd now {}",
                transport.addr(),
                transport.cwnd
            ));
        }
    }
}
