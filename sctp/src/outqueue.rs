//! Outbound queue: pending control chunks, pending and retransmittable DATA,
//! and DATA awaiting acknowledgement.

use crate::af::AfSpecific;
use crate::association::{Association, tsn_gt};
use crate::chunk::{ChunkType, DataChunk};
use crate::error::{Result, SctpError};
use crate::outbound::{
    ControlChunk, DataChunkRef, DataMessage, FastRetransmit, OutboundChunk, OutboundData,
};
use crate::output::Refused;
use crate::transport::TransportId;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct OutQueue {
    control: VecDeque<ControlChunk>,
    data: VecDeque<DataChunkRef>,
    retransmit: VecDeque<DataChunkRef>,
    transmitted: Vec<DataChunkRef>,
    /// DATA bytes sent and not yet acknowledged, across all transports.
    pub(crate) outstanding_bytes: u32,
    /// DATA bytes queued and not yet sent.
    pub(crate) out_qlen: u32,
}

impl OutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding_bytes(&self) -> u32 {
        self.outstanding_bytes
    }

    pub fn out_qlen(&self) -> u32 {
        self.out_qlen
    }

    pub fn pending_control(&self) -> usize {
        self.control.len()
    }

    pub fn pending_data(&self) -> usize {
        self.data.len() + self.retransmit.len()
    }

    /// DATA chunks on the wire, oldest first.
    pub fn transmitted(&self) -> &[DataChunkRef] {
        &self.transmitted
    }

    pub fn is_empty(&self) -> bool {
        self.control.is_empty()
            && self.data.is_empty()
            && self.retransmit.is_empty()
            && self.transmitted.is_empty()
    }
}

/// Result of one [`Association::flush`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub control_sent: usize,
    pub data_sent: usize,
    pub retransmitted: usize,
}

impl<A: AfSpecific> Association<A> {
    /// Queues a control chunk, marking it for AUTH if the peer asked.
    pub fn queue_control(&mut self, mut chunk: ControlChunk) {
        if let Some(chunk_type) = chunk.body().chunk_type() {
            chunk.set_requests_auth(self.requires_auth(chunk_type));
        }
        self.outq.control.push_back(chunk);
    }

    /// Queues a DATA chunk built by the caller.
    pub fn queue_data(&mut self, chunk: DataChunkRef) -> Result<()> {
        let stream_id = chunk.borrow().chunk().stream_id;
        if stream_id >= self.outbound_streams() {
            return Err(SctpError::InvalidPacket(format!(
                "stream {} outside {} outbound streams",
                stream_id,
                self.outbound_streams()
            )));
        }
        {
            let mut data = chunk.borrow_mut();
            data.auth = self.requires_auth(ChunkType::Data);
            self.outq.out_qlen += data.data_size();
        }
        self.outq.data.push_back(chunk);
        Ok(())
    }

    /// Splits a user message into DATA chunks of at most `frag_point`
    /// bytes and queues them.
    pub fn send_message(
        &mut self,
        stream_id: u16,
        ppid: u32,
        payload: &[u8],
        unordered: bool,
    ) -> Result<Rc<DataMessage>> {
        if !self.state.accepts_data() {
            return Err(SctpError::InvalidState(format!(
                "cannot send in state {:?}",
                self.state
            )));
        }
        if payload.is_empty() {
            return Err(SctpError::InvalidPacket("empty user message".into()));
        }

        let frag_point = (self.frag_point() as usize).max(1);
        let msg = DataMessage::new(true, false);
        let fragments = payload.chunks(frag_point).count();

        for (index, fragment) in payload.chunks(frag_point).enumerate() {
            let mut chunk = DataChunk::new(stream_id, ppid, fragment.to_vec());
            chunk.unordered = unordered;
            chunk.beginning = index == 0;
            chunk.ending = index + 1 == fragments;
            self.queue_data(OutboundData::new(chunk, Rc::clone(&msg))?.into_ref())?;
        }

        self.logger().debug(&format!(
            "queued {} byte message on stream {} in {} chunks",
            payload.len(),
            stream_id,
            fragments
        ));
        Ok(msg)
    }

    /// Moves as much queued traffic as windows allow onto transport `id`.
    ///
    /// Control chunks go first, then retransmissions, then new DATA. The
    /// last partial packet is sent before returning.
    pub fn flush(&mut self, id: TransportId) -> Result<FlushReport> {
        let vtag = self.peer.vtag;
        let ecn_capable = self.ecn_enabled && self.peer.ecn_capable;

        self.with_packet(id, |packet, assoc| {
            let mut report = FlushReport::default();
            packet.config(assoc, vtag, ecn_capable);

            while let Some(chunk) = assoc.outq.control.pop_front() {
                match packet.transmit_chunk(assoc, OutboundChunk::Control(chunk), false) {
                    Ok(()) => report.control_sent += 1,
                    Err(Refused { status, chunk }) => {
                        assoc
                            .logger()
                            .debug(&format!("control chunk held back: {}", status));
                        if let OutboundChunk::Control(chunk) = chunk {
                            assoc.outq.control.push_front(chunk);
                        }
                        break;
                    }
                }
            }

            if assoc.state.can_send_data() {
                while let Some((chunk, retransmission)) = assoc.next_data() {
                    // New DATA leaves the queue length before admission so
                    // Nagle does not count it twice.
                    let queued = if retransmission { 0 } else { chunk.borrow().data_size() };
                    assoc.outq.out_qlen = assoc.outq.out_qlen.saturating_sub(queued);
                    if let Err(refused) =
                        packet.transmit_chunk(assoc, OutboundChunk::Data(Rc::clone(&chunk)), false)
                    {
                        assoc.outq.out_qlen += queued;
                        assoc
                            .logger()
                            .debug(&format!("DATA held back: {}", refused.status));
                        break;
                    }
                    if retransmission {
                        assoc.outq.retransmit.pop_front();
                        let mut data = chunk.borrow_mut();
                        if data.fast_retransmit == FastRetransmit::Needed {
                            data.fast_retransmit = FastRetransmit::Done;
                        }
                        report.retransmitted += 1;
                    } else {
                        assoc.outq.data.pop_front();
                        report.data_sent += 1;
                    }
                    assoc.outq.transmitted.push(chunk);
                }
            }

            packet.transmit(assoc).map(|()| report)
        })
    }

    fn next_data(&self) -> Option<(DataChunkRef, bool)> {
        self.outq
            .retransmit
            .front()
            .map(|chunk| (Rc::clone(chunk), true))
            .or_else(|| self.outq.data.front().map(|chunk| (Rc::clone(chunk), false)))
    }

    /// Applies a cumulative acknowledgement. Returns the number of DATA
    /// bytes newly acknowledged.
    pub fn ack(&mut self, cumulative_tsn: u32, a_rwnd: u32) -> u32 {
        let mut acked = 0;
        let Association {
            outq, transports, ..
        } = self;

        let is_acked = |chunk: &DataChunkRef| {
            chunk
                .borrow()
                .tsn()
                .is_some_and(|tsn| !tsn_gt(tsn, cumulative_tsn))
        };
        let (done, pending): (Vec<_>, Vec<_>) = outq.transmitted.drain(..).partition(&is_acked);
        outq.transmitted = pending;
        // Already out of the flight when they were marked.
        outq.retransmit.retain(|chunk| !is_acked(chunk));

        for chunk in done {
            let data = chunk.borrow();
            let size = data.data_size();
            acked += size;
            if let Some(transport) = data.transport().and_then(|id| transports.get_mut(id.0)) {
                transport.flight_size = transport.flight_size.saturating_sub(size);
                if data.rtt_in_progress() {
                    transport.rto_pending = false;
                }
            }
        }

        outq.outstanding_bytes = outq.outstanding_bytes.saturating_sub(acked);
        // RFC 4960 6.2.1: peer window minus what is still outstanding.
        self.peer.rwnd = a_rwnd.saturating_sub(self.outq.outstanding_bytes);
        if acked > 0 {
            self.logger().debug(&format!(
                "cumulative ack {} released {} bytes, peer rwnd {}",
                cumulative_tsn, acked, self.peer.rwnd
            ));
        }
        acked
    }

    /// Marks a transmitted chunk for fast retransmission. Its bytes leave
    /// the flight so the retransmission can be admitted.
    pub fn mark_for_retransmit(&mut self, tsn: u32) -> bool {
        let Some(position) = self
            .outq
            .transmitted
            .iter()
            .position(|chunk| chunk.borrow().tsn() == Some(tsn))
        else {
            return false;
        };
        let chunk = self.outq.transmitted.remove(position);
        {
            let mut data = chunk.borrow_mut();
            let size = data.data_size();
            if let Some(transport) = data.transport.and_then(|id| self.transports.get_mut(id.0)) {
                transport.flight_size = transport.flight_size.saturating_sub(size);
                if data.rtt_in_progress {
                    transport.rto_pending = false;
                }
            }
            self.outq.outstanding_bytes = self.outq.outstanding_bytes.saturating_sub(size);
            self.peer.rwnd = self.peer.rwnd.saturating_add(size);
            data.rtt_in_progress = false;
            data.resent = true;
            data.fast_retransmit = FastRetransmit::Needed;
        }
        self.logger()
            .info(&format!("TSN {} marked for fast retransmit", tsn));
        self.outq.retransmit.push_back(chunk);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::af::MemoryAf;
    use crate::association::AssociationState;
    use crate::chunk::SctpChunk;
    use crate::config::OutputConfig;
    use crate::transport::Route;
    use logging::{LogLevel, Logger};

    fn setup(config: OutputConfig) -> (Association<MemoryAf>, TransportId) {
        let (logger, _capture) = Logger::in_memory(LogLevel::Debug);
        let af = MemoryAf::with_default_route(Route::new(config.default_pathmtu));
        let mut assoc = Association::new(&config, af, &logger, 5000, 5001).unwrap();
        let id = assoc.add_transport("10.0.0.2:5001".parse().unwrap());
        assoc.establish(0xBEEF, 1 << 20, 1);
        (assoc, id)
    }

    #[test]
    fn test_send_message_fragments() {
        let (mut assoc, _id) = setup(OutputConfig::default());
        let frag = assoc.frag_point() as usize;
        assoc.send_message(2, 51, &vec![7u8; frag * 2 + 10], false).unwrap();

        assert_eq!(assoc.outq().pending_data(), 3);
        assert_eq!(assoc.outq().out_qlen(), (frag * 2 + 10) as u32);
        let flags: Vec<(bool, bool)> = assoc
            .outq
            .data
            .iter()
            .map(|c| (c.borrow().chunk().beginning, c.borrow().chunk().ending))
            .collect();
        assert_eq!(flags, vec![(true, false), (false, false), (false, true)]);
    }

    #[test]
    fn test_send_message_rejections() {
        let (mut assoc, _id) = setup(OutputConfig::default());
        assert!(assoc.send_message(0, 0, &[], false).is_err());
        assert!(assoc.send_message(10, 0, b"x", false).is_err());
        assoc.set_state(AssociationState::ShutdownSent);
        assert!(matches!(
            assoc.send_message(0, 0, b"x", false),
            Err(SctpError::InvalidState(_))
        ));
    }

    #[test]
    fn test_flush_sends_control_then_data() {
        let (mut assoc, id) = setup(OutputConfig::default());
        assoc.queue_control(ControlChunk::new(SctpChunk::CookieAck).unwrap());
        assoc.send_message(0, 51, b"hello", false).unwrap();

        let report = assoc.flush(id).unwrap();
        assert_eq!(report.control_sent, 1);
        assert_eq!(report.data_sent, 1);
        assert_eq!(assoc.af().sent.len(), 1);
        assert_eq!(assoc.outq().transmitted().len(), 1);
        assert_eq!(assoc.outq().out_qlen(), 0);
        assert_eq!(assoc.outq().outstanding_bytes(), 5);
    }

    #[test]
    fn test_flush_stops_at_cwnd() {
        let (mut assoc, id) = setup(OutputConfig {
            nodelay: true,
            ..OutputConfig::default()
        });
        for _ in 0..10 {
            assoc.send_message(0, 51, &[0u8; 1000], false).unwrap();
        }
        let report = assoc.flush(id).unwrap();
        // cwnd 4380 admits chunks while flight_size < cwnd.
        assert_eq!(report.data_sent, 5);
        assert_eq!(assoc.outq().pending_data(), 5);
        assert_eq!(assoc.af().sent.len(), 5);
    }

    #[test]
    fn test_flush_delays_small_message_while_data_in_flight() {
        let (mut assoc, id) = setup(OutputConfig::default());
        let first_tsn = assoc.next_tsn();
        assoc.send_message(0, 51, &[1u8; 10], false).unwrap();
        assert_eq!(assoc.flush(id).unwrap().data_sent, 1);

        assoc.send_message(0, 51, &[2u8; 800], false).unwrap();
        let report = assoc.flush(id).unwrap();
        assert_eq!(report.data_sent, 0);
        assert_eq!(assoc.outq().pending_data(), 1);
        assert_eq!(assoc.outq().out_qlen(), 800);
        assert_eq!(assoc.af().sent.len(), 1);

        assoc.ack(first_tsn, 1 << 20);
        let report = assoc.flush(id).unwrap();
        assert_eq!(report.data_sent, 1);
        assert_eq!(assoc.outq().out_qlen(), 0);
        assert_eq!(assoc.af().sent.len(), 2);
    }

    #[test]
    fn test_ack_reverses_accounting() {
        let (mut assoc, id) = setup(OutputConfig::default());
        let first_tsn = assoc.next_tsn();
        assoc.send_message(0, 51, &[1u8; 300], false).unwrap();
        assoc.send_message(0, 51, &[2u8; 200], false).unwrap();
        assoc.flush(id).unwrap();
        assert_eq!(assoc.transport(id).unwrap().flight_size, 500);

        assert_eq!(assoc.ack(first_tsn, 1 << 20), 300);
        assert_eq!(assoc.transport(id).unwrap().flight_size, 200);
        assert_eq!(assoc.outq().outstanding_bytes(), 200);
        assert_eq!(assoc.peer().rwnd, (1 << 20) - 200);

        assert_eq!(assoc.ack(first_tsn.wrapping_add(1), 1 << 20), 200);
        assert_eq!(assoc.transport(id).unwrap().flight_size, 0);
        assert!(assoc.outq().is_empty());
        assert!(!assoc.transport(id).unwrap().rto_pending);
    }

    #[test]
    fn test_fast_retransmit_keeps_tsn() {
        let (mut assoc, id) = setup(OutputConfig::default());
        let tsn = assoc.next_tsn();
        assoc.send_message(0, 51, &[9u8; 100], false).unwrap();
        assoc.flush(id).unwrap();

        assert!(assoc.mark_for_retransmit(tsn));
        assert!(!assoc.mark_for_retransmit(tsn.wrapping_add(100)));
        assert_eq!(assoc.transport(id).unwrap().flight_size, 0);

        let report = assoc.flush(id).unwrap();
        assert_eq!(report.retransmitted, 1);
        let chunk = &assoc.outq().transmitted()[0];
        assert_eq!(chunk.borrow().tsn(), Some(tsn));
        assert_eq!(chunk.borrow().fast_retransmit, FastRetransmit::Done);
        assert!(!chunk.borrow().rtt_in_progress());
        assert_eq!(assoc.next_tsn(), tsn.wrapping_add(1));
    }

    #[test]
    fn test_flush_holds_data_before_cookie_echoed() {
        let (mut assoc, id) = setup(OutputConfig::default());
        assoc.set_state(AssociationState::CookieWait);
        assoc.send_message(0, 51, b"early", false).unwrap();
        let report = assoc.flush(id).unwrap();
        assert_eq!(report.data_sent, 0);
        assert!(assoc.af().sent.is_empty());
    }
}
