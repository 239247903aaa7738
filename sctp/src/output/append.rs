//! Chunk admission: window, congestion, Nagle and MTU checks plus
//! opportunistic AUTH/SACK bundling.

use super::{Packet, Refused, XmitResult, XmitStatus};
use crate::af::AfSpecific;
use crate::association::{Association, AssociationState};
use crate::chunk::{ChunkType, word_round};
use crate::outbound::{FastRetransmit, OutboundChunk, OutboundData};
use logging::LogLevel;
use std::time::Instant;

impl Packet {
    /// Sets the verification tag for the next datagram. An empty packet on
    /// an ECN-capable path is led by an ECN-Echo if one is owed.
    pub fn config<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        vtag: u32,
        ecn_capable: bool,
    ) -> &mut Self {
        self.vtag = vtag;

        if ecn_capable
            && self.is_empty()
            && let Some(ecne) = assoc.ecne_prepend()
            && let Err(refused) = self.append_chunk(assoc, OutboundChunk::Control(ecne))
        {
            assoc
                .logger()
                .debug(&format!("ECNE not prepended: {}", refused.status));
        }
        self
    }

    /// Tries to add `chunk` to the packet.
    ///
    /// An AUTH chunk is slipped in first when the chunk must be
    /// authenticated, and a pending SACK rides ahead of DATA. On refusal
    /// nothing about the packet or association has changed except for
    /// such a bundled chunk already admitted, and the chunk comes back
    /// inside [`Refused`].
    pub fn append_chunk<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        mut chunk: OutboundChunk,
    ) -> XmitResult {
        let admission = match &chunk {
            OutboundChunk::Data(data) => {
                let data = data.borrow();
                self.can_append_data(assoc, &data)
            }
            OutboundChunk::Control(_) => Ok(()),
        };

        let chunk_len = word_round(chunk.length() as u32);
        let checks = admission
            .and_then(|()| self.bundle_auth(assoc, &chunk))
            .and_then(|()| self.bundle_sack(assoc, &chunk))
            .and_then(|()| self.will_fit(assoc, &chunk, chunk_len));
        if let Err(status) = checks {
            return Err(Refused { status, chunk });
        }

        match &chunk {
            OutboundChunk::Data(data) => {
                let mut data = data.borrow_mut();
                self.append_data(assoc, &mut data);
                data.sent_at = Some(Instant::now());
                // A SACK or AUTH placed after DATA would be out of order.
                self.has_sack = true;
                self.has_auth = true;
                self.has_data = true;
            }
            OutboundChunk::Control(_) => match chunk.chunk_type() {
                Some(ChunkType::CookieEcho) => self.has_cookie_echo = true,
                Some(ChunkType::Sack) => self.has_sack = true,
                Some(ChunkType::Auth) => {
                    self.has_auth = true;
                    self.auth_index = Some(self.chunks.len());
                }
                _ => {}
            },
        }

        if assoc.logger().enabled(LogLevel::Debug) {
            assoc.logger().debug(&format!(
                "{} appended {} ({} bytes), packet size {}",
                self.transport,
                chunk.chunk_type().map_or("UNKNOWN", |t| t.name()),
                chunk_len,
                self.size + chunk_len
            ));
        }

        chunk.set_transport(self.transport);
        self.size += chunk_len;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Flow-control verdict for a DATA chunk. Has no side effects.
    pub fn can_append_data<A: AfSpecific>(
        &self,
        assoc: &Association<A>,
        chunk: &OutboundData,
    ) -> Result<(), XmitStatus> {
        let datasize = chunk.data_size();
        let rwnd = assoc.peer.rwnd;
        let inflight = assoc.outq.outstanding_bytes();
        let transport = assoc.path(self.transport);

        // RFC 4960 6.1 rule A: a single chunk may test a closed window
        // only when nothing is in flight.
        if datasize > rwnd && inflight > 0 {
            return Err(XmitStatus::RwndFull);
        }

        // Rule B: no new data beyond cwnd, except fast retransmissions.
        if chunk.fast_retransmit != FastRetransmit::Needed
            && transport.flight_size >= transport.cwnd
        {
            return Err(XmitStatus::RwndFull);
        }

        if !assoc.socket.nodelay
            && self.is_empty()
            && inflight > 0
            && assoc.state == AssociationState::Established
        {
            // `out_qlen` no longer counts this chunk once it is dequeued.
            let pending = datasize + assoc.outq.out_qlen();
            let payload_room = transport.pathmtu.saturating_sub(self.overhead);
            if pending < payload_room && chunk.message().can_delay() {
                return Err(XmitStatus::NagleDelay);
            }
        }

        Ok(())
    }

    /// MTU check for a chunk of word-rounded length `chunk_len`. Marks the
    /// packet as fragmentable when an oversized chunk is let through.
    pub(crate) fn will_fit<A: AfSpecific>(
        &mut self,
        assoc: &Association<A>,
        chunk: &OutboundChunk,
        chunk_len: u32,
    ) -> Result<(), XmitStatus> {
        let pmtu = assoc
            .pathmtu()
            .unwrap_or_else(|| assoc.path(self.transport).pathmtu);

        if self.size + chunk_len > pmtu {
            // Oversized chunks still go out alone; control chunks and the
            // first authenticated chunk may push an already started packet
            // past the MTU.
            if self.is_empty()
                || !chunk.is_data()
                || (!self.has_data && chunk.requests_auth())
            {
                self.ipfragok = true;
            } else {
                return Err(XmitStatus::PmtuFull);
            }
        }
        Ok(())
    }

    /// Accounts an admitted DATA chunk and stamps its TSN and SSN.
    pub(crate) fn append_data<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        chunk: &mut OutboundData,
    ) {
        let datasize = chunk.data_size();

        assoc.path_mut(self.transport).flight_size += datasize;
        assoc.outq.outstanding_bytes += datasize;
        assoc.peer.rwnd = assoc.peer.rwnd.saturating_sub(datasize);

        if !assoc.peer.prsctp_capable {
            chunk.message().set_can_abandon(false);
        }

        if !chunk.has_tsn {
            chunk.chunk.tsn = assoc.take_tsn();
            chunk.has_tsn = true;
        }

        if !chunk.has_ssn {
            let stream_id = chunk.chunk.stream_id;
            chunk.chunk.stream_seq = if chunk.chunk.unordered {
                0
            } else if chunk.chunk.ending {
                assoc.ssn_next(stream_id)
            } else {
                assoc.ssn_peek(stream_id)
            };
            chunk.has_ssn = true;
        }
    }

    fn bundle_auth<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        chunk: &OutboundChunk,
    ) -> Result<(), XmitStatus> {
        if !assoc.peer.auth_capable
            || chunk.is(ChunkType::Auth)
            || self.has_auth
            || !chunk.requests_auth()
        {
            return Ok(());
        }

        let Some(auth) = assoc.make_auth() else {
            return Ok(());
        };
        self.append_chunk(assoc, OutboundChunk::Control(auth))
            .map_err(|refused| refused.status)
    }

    fn bundle_sack<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        chunk: &OutboundChunk,
    ) -> Result<(), XmitStatus> {
        if !chunk.is_data()
            || self.has_sack
            || self.has_cookie_echo
            || !assoc.timers.sack.is_pending()
        {
            return Ok(());
        }

        assoc.a_rwnd = assoc.rwnd;
        let sack = assoc.make_sack();
        self.append_chunk(assoc, OutboundChunk::Control(sack))
            .map_err(|refused| refused.status)?;

        assoc.peer.sack_needed = false;
        assoc.timers.sack.disarm();
        assoc.logger().debug("SACK bundled with DATA");
        Ok(())
    }
}
