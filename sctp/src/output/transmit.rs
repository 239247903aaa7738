//! Serialization and hand-off of a finished packet.

use super::{Packet, Refused, XmitResult, XmitStatus};
use crate::af::{AfSpecific, Datagram};
use crate::association::{Association, AssociationState};
use crate::auth;
use crate::checksum::ChecksumPolicy;
use crate::chunk::pad_to_word;
use crate::error::{Result, SctpError};
use crate::outbound::OutboundChunk;
use std::time::Instant;

impl Packet {
    /// Appends `chunk`, sending the packet first if it is full.
    ///
    /// With `one_packet` set the chunk is not retried after the flush and
    /// comes back as [`XmitStatus::PmtuFull`]. A packet carrying a
    /// COOKIE-ECHO is never flushed early. Send errors from the early
    /// flush are parked on the socket rather than returned.
    pub fn transmit_chunk<A: AfSpecific>(
        &mut self,
        assoc: &mut Association<A>,
        chunk: OutboundChunk,
        one_packet: bool,
    ) -> XmitResult {
        match self.append_chunk(assoc, chunk) {
            Err(Refused {
                status: XmitStatus::PmtuFull,
                chunk,
            }) if !self.has_cookie_echo => {
                if let Err(err) = self.transmit(assoc) {
                    assoc
                        .logger()
                        .warn(&format!("sending full packet failed: {}", err));
                    assoc.socket.err = Some(err);
                }
                if one_packet {
                    return Err(Refused {
                        status: XmitStatus::PmtuFull,
                        chunk,
                    });
                }
                self.append_chunk(assoc, chunk)
            }
            other => other,
        }
    }

    /// Serializes the queued chunks into one datagram and hands it to the
    /// address-family hook. The packet is reset whatever the outcome.
    ///
    /// DATA chunks stay accounted as in flight even when this fails; the
    /// outbound queue still holds them for retransmission.
    pub fn transmit<A: AfSpecific>(&mut self, assoc: &mut Association<A>) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let logger = assoc.logger().clone();
        logger.debug(&format!(
            "{} transmitting {} chunks, {} bytes",
            self.transport,
            self.len(),
            self.size
        ));

        let mut buf: Vec<u8> = Vec::new();
        if buf.try_reserve_exact(self.size as usize).is_err() {
            logger.error(&format!("cannot allocate {} byte datagram", self.size));
            self.free();
            return Err(SctpError::NoMemory);
        }

        let Some(route) = assoc.refresh_route(self.transport) else {
            assoc.mib.out_no_routes += 1;
            let dest = assoc.path(self.transport).addr();
            logger.warn(&format!("no route to {}, packet dropped", dest));
            self.free();
            return Err(SctpError::NoRoute(dest.to_string()));
        };

        buf.extend_from_slice(&self.source_port.to_be_bytes());
        buf.extend_from_slice(&self.destination_port.to_be_bytes());
        buf.extend_from_slice(&self.vtag.to_be_bytes());
        buf.extend_from_slice(&[0; 4]);

        let transport_id = self.transport;
        let auth_index = self.auth_index;
        let mut auth_offset = None;
        let mut has_data = false;

        for (index, chunk) in self.chunks.drain(..).enumerate() {
            if Some(index) == auth_index {
                auth_offset = Some(buf.len());
            }
            match chunk {
                OutboundChunk::Data(data) => {
                    let mut data = data.borrow_mut();
                    let transport = assoc.path_mut(transport_id);
                    // Karn: never time a retransmission.
                    if !data.resent && !transport.rto_pending {
                        data.rtt_in_progress = true;
                        transport.rto_pending = true;
                    }
                    has_data = true;
                    data.chunk.encode(&mut buf);
                    assoc.mib.out_data_chunks += 1;
                }
                OutboundChunk::Control(control) => {
                    control.body().encode(&mut buf);
                    assoc.mib.out_ctrl_chunks += 1;
                }
            }
            pad_to_word(&mut buf);
        }

        if let Some(offset) = auth_offset {
            let signed = match assoc.auth_key() {
                Some(key) => auth::sign_in_place(key, &mut buf, offset),
                None => Err(SctpError::Crypto("AUTH chunk without a shared key".into())),
            };
            if let Err(err) = signed {
                logger.error(&format!("signing packet failed: {}", err));
                self.reset();
                return Err(err);
            }
        }

        let policy = ChecksumPolicy::select(assoc.no_checksums, route.checksum_offload);
        let checksum_offload = policy.apply(&mut buf);
        if checksum_offload {
            assoc.mib.out_checksum_offloaded += 1;
        }

        // The egress decides per datagram; the flag below carries the policy.
        assoc.mark_ecn();
        let ecn_capable = assoc.ecn_enabled && assoc.peer.ecn_capable;

        if has_data
            && assoc.state == AssociationState::Established
            && assoc.autoclose.is_some()
            && assoc.timers.autoclose.arm(Instant::now())
        {
            logger.info(&format!(
                "autoclose timer armed for {:?}",
                assoc.timers.autoclose.timeout()
            ));
        }

        let dest = assoc.path(transport_id).addr();
        let datagram = Datagram {
            dest,
            bytes: buf,
            ipfragok: self.ipfragok,
            checksum_offload,
            ecn_capable,
        };
        assoc.peer.last_sent_to = Some(transport_id);
        assoc.mib.out_packets += 1;

        let result = assoc.xmit(datagram);
        if let Err(err) = &result {
            assoc.mib.out_xmit_errors += 1;
            logger.warn(&format!("xmit to {} failed: {}", dest, err));
        }

        self.reset();
        result
    }
}
