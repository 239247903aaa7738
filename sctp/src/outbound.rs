//! Chunks queued for transmission together with their send-side metadata.
//!
//! DATA chunks are shared between the outbound queue and at most one
//! packet, so they travel as [`DataChunkRef`] handles; the queue keeps them
//! for retransmission after the packet is gone. Control chunks are owned by
//! whichever packet holds them and dropped once serialized.

use crate::chunk::{ChunkType, DATA_CHUNK_HEADER_SIZE, DataChunk, MAX_CHUNK_LENGTH, SctpChunk};
use crate::error::{Result, SctpError};
use crate::transport::TransportId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Largest user payload a single DATA chunk can carry.
pub const MAX_DATA_PAYLOAD: usize = u16::MAX as usize - DATA_CHUNK_HEADER_SIZE;

/// Per-message flags shared by all fragments of one user message.
#[derive(Debug)]
pub struct DataMessage {
    can_delay: Cell<bool>,
    can_abandon: Cell<bool>,
}

impl DataMessage {
    pub fn new(can_delay: bool, can_abandon: bool) -> Rc<Self> {
        Rc::new(Self {
            can_delay: Cell::new(can_delay),
            can_abandon: Cell::new(can_abandon),
        })
    }

    /// Small fragments of this message may be held back (Nagle).
    pub fn can_delay(&self) -> bool {
        self.can_delay.get()
    }

    pub fn set_can_delay(&self, can_delay: bool) {
        self.can_delay.set(can_delay);
    }

    /// PR-SCTP may abandon this message.
    pub fn can_abandon(&self) -> bool {
        self.can_abandon.get()
    }

    pub fn set_can_abandon(&self, can_abandon: bool) {
        self.can_abandon.set(can_abandon);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastRetransmit {
    NotNeeded,
    Needed,
    Done,
}

/// A DATA chunk plus the bookkeeping the output path needs.
#[derive(Debug)]
pub struct OutboundData {
    pub(crate) chunk: DataChunk,
    msg: Rc<DataMessage>,
    pub(crate) has_tsn: bool,
    pub(crate) has_ssn: bool,
    pub(crate) auth: bool,
    pub(crate) rtt_in_progress: bool,
    pub(crate) resent: bool,
    pub fast_retransmit: FastRetransmit,
    pub(crate) transport: Option<TransportId>,
    pub(crate) sent_at: Option<Instant>,
}

pub type DataChunkRef = Rc<RefCell<OutboundData>>;

impl OutboundData {
    pub fn new(chunk: DataChunk, msg: Rc<DataMessage>) -> Result<Self> {
        if chunk.data.len() > MAX_DATA_PAYLOAD {
            return Err(SctpError::InvalidPacket(format!(
                "DATA payload of {} bytes exceeds {}",
                chunk.data.len(),
                MAX_DATA_PAYLOAD
            )));
        }
        Ok(Self {
            chunk,
            msg,
            has_tsn: false,
            has_ssn: false,
            auth: false,
            rtt_in_progress: false,
            resent: false,
            fast_retransmit: FastRetransmit::NotNeeded,
            transport: None,
            sent_at: None,
        })
    }

    pub fn into_ref(self) -> DataChunkRef {
        Rc::new(RefCell::new(self))
    }

    pub fn chunk(&self) -> &DataChunk {
        &self.chunk
    }

    pub fn message(&self) -> &Rc<DataMessage> {
        &self.msg
    }

    /// User payload size: declared length minus the DATA header.
    pub fn data_size(&self) -> u32 {
        self.chunk.length() as u32 - DATA_CHUNK_HEADER_SIZE as u32
    }

    /// Assigned TSN, once the chunk has been admitted to a packet.
    pub fn tsn(&self) -> Option<u32> {
        self.has_tsn.then_some(self.chunk.tsn)
    }

    pub fn ssn(&self) -> Option<u16> {
        self.has_ssn.then_some(self.chunk.stream_seq)
    }

    pub fn requests_auth(&self) -> bool {
        self.auth
    }

    pub fn rtt_in_progress(&self) -> bool {
        self.rtt_in_progress
    }

    pub fn is_resent(&self) -> bool {
        self.resent
    }

    pub fn transport(&self) -> Option<TransportId> {
        self.transport
    }

    pub fn sent_at(&self) -> Option<Instant> {
        self.sent_at
    }
}

/// Any non-DATA chunk awaiting transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChunk {
    body: SctpChunk,
    pub(crate) auth: bool,
    pub(crate) transport: Option<TransportId>,
}

impl ControlChunk {
    /// Wraps a control chunk body. DATA bodies are rejected; they must go
    /// through [`OutboundData`] so the queue can retain them. So are bodies
    /// too long for the chunk length field.
    pub fn new(body: SctpChunk) -> Result<Self> {
        if matches!(body, SctpChunk::Data(_)) {
            return Err(SctpError::InvalidPacket(
                "DATA chunks must be queued as OutboundData".into(),
            ));
        }
        if body.encoded_len() > MAX_CHUNK_LENGTH {
            return Err(SctpError::InvalidPacket(format!(
                "chunk of {} bytes exceeds the {} byte limit",
                body.encoded_len(),
                MAX_CHUNK_LENGTH
            )));
        }
        Ok(Self::wrap(body))
    }

    pub(crate) fn wrap(body: SctpChunk) -> Self {
        Self {
            body,
            auth: false,
            transport: None,
        }
    }

    pub fn body(&self) -> &SctpChunk {
        &self.body
    }

    pub fn requests_auth(&self) -> bool {
        self.auth
    }

    pub fn set_requests_auth(&mut self, auth: bool) {
        self.auth = auth;
    }

    pub fn transport(&self) -> Option<TransportId> {
        self.transport
    }
}

/// A chunk as the packet builder sees it.
#[derive(Debug)]
pub enum OutboundChunk {
    Data(DataChunkRef),
    Control(ControlChunk),
}

impl OutboundChunk {
    /// `None` only for control chunks of a type this crate does not model.
    pub fn chunk_type(&self) -> Option<ChunkType> {
        match self {
            OutboundChunk::Data(_) => Some(ChunkType::Data),
            OutboundChunk::Control(control) => control.body.chunk_type(),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, OutboundChunk::Data(_))
    }

    pub(crate) fn is(&self, chunk_type: ChunkType) -> bool {
        self.chunk_type() == Some(chunk_type)
    }

    /// Declared length, excluding padding.
    pub fn length(&self) -> u16 {
        match self {
            OutboundChunk::Data(data) => data.borrow().chunk.length(),
            OutboundChunk::Control(control) => control.body.length(),
        }
    }

    pub fn requests_auth(&self) -> bool {
        match self {
            OutboundChunk::Data(data) => data.borrow().auth,
            OutboundChunk::Control(control) => control.auth,
        }
    }

    pub(crate) fn set_transport(&mut self, transport: TransportId) {
        match self {
            OutboundChunk::Data(data) => data.borrow_mut().transport = Some(transport),
            OutboundChunk::Control(control) => control.transport = Some(transport),
        }
    }
}

impl PartialEq for OutboundChunk {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OutboundChunk::Data(a), OutboundChunk::Data(b)) => Rc::ptr_eq(a, b),
            (OutboundChunk::Control(a), OutboundChunk::Control(b)) => a == b,
            _ => false,
        }
    }
}

impl From<DataChunkRef> for OutboundChunk {
    fn from(data: DataChunkRef) -> Self {
        OutboundChunk::Data(data)
    }
}

impl From<ControlChunk> for OutboundChunk {
    fn from(control: ControlChunk) -> Self {
        OutboundChunk::Control(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_size_excludes_header() {
        let data = OutboundData::new(
            DataChunk::new(0, 51, vec![0; 100]),
            DataMessage::new(true, false),
        )
        .unwrap();
        assert_eq!(data.data_size(), 100);
        assert_eq!(data.tsn(), None);
        assert_eq!(data.ssn(), None);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let result = OutboundData::new(
            DataChunk::new(0, 51, vec![0; MAX_DATA_PAYLOAD + 1]),
            DataMessage::new(false, false),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_control_rejects_data_body() {
        let body = SctpChunk::Data(DataChunk::new(0, 0, vec![1]));
        assert!(ControlChunk::new(body).is_err());
        assert!(ControlChunk::new(SctpChunk::CookieAck).is_ok());
    }

    #[test]
    fn test_control_rejects_body_longer_than_length_field() {
        let err = ControlChunk::new(SctpChunk::Heartbeat(vec![0; 70_000])).unwrap_err();
        assert!(matches!(err, SctpError::InvalidPacket(_)));

        let largest = MAX_CHUNK_LENGTH - 4;
        let chunk = ControlChunk::new(SctpChunk::Heartbeat(vec![0; largest])).unwrap();
        assert_eq!(chunk.body().length(), u16::MAX);
        assert!(ControlChunk::new(SctpChunk::Heartbeat(vec![0; largest + 1])).is_err());
    }

    #[test]
    fn test_outbound_chunk_kind() {
        let control: OutboundChunk = ControlChunk::new(SctpChunk::CookieEcho(vec![0; 3]))
            .unwrap()
            .into();
        assert!(!control.is_data());
        assert!(control.is(ChunkType::CookieEcho));
        assert_eq!(control.length(), 7);

        let data: OutboundChunk = OutboundData::new(
            DataChunk::new(1, 0, vec![0; 5]),
            DataMessage::new(false, false),
        )
        .unwrap()
        .into_ref()
        .into();
        assert!(data.is_data());
        assert_eq!(data.length(), 21);
    }

    #[test]
    fn test_data_equality_is_identity() {
        let make = || {
            OutboundData::new(DataChunk::new(0, 0, vec![1]), DataMessage::new(false, false))
                .unwrap()
                .into_ref()
        };
        let a = make();
        let b = make();
        assert_eq!(OutboundChunk::Data(a.clone()), OutboundChunk::Data(a));
        assert_ne!(OutboundChunk::Data(b), OutboundChunk::Data(make()));
    }

    #[test]
    fn test_message_flags_shared() {
        let msg = DataMessage::new(true, true);
        let data = OutboundData::new(DataChunk::new(0, 0, vec![1]), msg.clone()).unwrap();
        msg.set_can_abandon(false);
        assert!(!data.message().can_abandon());
        assert!(data.message().can_delay());
    }
}
