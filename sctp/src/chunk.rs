//! SCTP chunk wire formats.
//!
//! Every chunk starts with a 4-byte type/flags/length header. The length
//! field counts the header and value but not the trailing padding; padding
//! to a 4-byte boundary is added when the chunk is copied into a datagram.

use crate::error::{Result, SctpError};
use std::fmt;
use std::str::FromStr;

/// Size of the type/flags/length header shared by all chunks.
pub const CHUNK_HEADER_SIZE: usize = 4;

/// Size of the DATA chunk header (chunk header + TSN, stream, SSN, PPID).
pub const DATA_CHUNK_HEADER_SIZE: usize = 16;

/// Largest length the 16-bit chunk length field can declare.
pub const MAX_CHUNK_LENGTH: usize = u16::MAX as usize;

/// Size of the SACK header (chunk header + cumulative TSN, a_rwnd, counts).
pub const SACK_HEADER_SIZE: usize = 16;

/// Gap blocks plus duplicate TSNs that fit in one SACK; each takes 4 bytes.
pub const MAX_SACK_ENTRIES: usize = (MAX_CHUNK_LENGTH - SACK_HEADER_SIZE) / 4;

/// Declared length for `len` bytes. Callers keep `len` within
/// [`MAX_CHUNK_LENGTH`]; anything larger saturates instead of wrapping.
fn declared_length(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Rounds `len` up to the next multiple of 4.
pub const fn word_round(len: u32) -> u32 {
    (len + 3) & !3
}

/// Rounds `len` down to a multiple of 4.
pub const fn word_trunc(len: u32) -> u32 {
    len & !3
}

/// SCTP chunk type identifiers (RFC 4960, RFC 4895, RFC 3758).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkType {
    Data = 0,
    Init = 1,
    InitAck = 2,
    Sack = 3,
    Heartbeat = 4,
    HeartbeatAck = 5,
    Abort = 6,
    Shutdown = 7,
    ShutdownAck = 8,
    Error = 9,
    CookieEcho = 10,
    CookieAck = 11,
    Ecne = 12,
    Cwr = 13,
    ShutdownComplete = 14,
    Auth = 15,
    ForwardTsn = 192,
}

impl ChunkType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Init),
            2 => Some(Self::InitAck),
            3 => Some(Self::Sack),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::HeartbeatAck),
            6 => Some(Self::Abort),
            7 => Some(Self::Shutdown),
            8 => Some(Self::ShutdownAck),
            9 => Some(Self::Error),
            10 => Some(Self::CookieEcho),
            11 => Some(Self::CookieAck),
            12 => Some(Self::Ecne),
            13 => Some(Self::Cwr),
            14 => Some(Self::ShutdownComplete),
            15 => Some(Self::Auth),
            192 => Some(Self::ForwardTsn),
            _ => None,
        }
    }

    /// Name as used in RFCs and configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Init => "INIT",
            Self::InitAck => "INIT_ACK",
            Self::Sack => "SACK",
            Self::Heartbeat => "HEARTBEAT",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
            Self::Abort => "ABORT",
            Self::Shutdown => "SHUTDOWN",
            Self::ShutdownAck => "SHUTDOWN_ACK",
            Self::Error => "ERROR",
            Self::CookieEcho => "COOKIE_ECHO",
            Self::CookieAck => "COOKIE_ACK",
            Self::Ecne => "ECNE",
            Self::Cwr => "CWR",
            Self::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Self::Auth => "AUTH",
            Self::ForwardTsn => "FORWARD_TSN",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChunkType {
    type Err = SctpError;

    /// Accepts the RFC name with `_` or `-` separators, any case.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        (0..=u8::MAX)
            .filter_map(ChunkType::from_u8)
            .find(|t| t.name() == normalized)
            .ok_or_else(|| SctpError::Config(format!("unknown chunk type '{}'", s)))
    }
}

/// DATA chunk
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Type = 0    | Reserved|U|B|E|         Length                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                              TSN                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      Stream Identifier        |   Stream Sequence Number      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  Payload Protocol Identifier                  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \                           User Data                           \
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub unordered: bool,
    /// First fragment of a user message.
    pub beginning: bool,
    /// Last fragment of a user message.
    pub ending: bool,
    pub tsn: u32,
    pub stream_id: u16,
    pub stream_seq: u16,
    pub ppid: u32,
    pub data: Vec<u8>,
}

impl DataChunk {
    /// Unfragmented, ordered chunk. TSN and SSN are filled in on transmission.
    pub fn new(stream_id: u16, ppid: u32, data: Vec<u8>) -> Self {
        Self {
            unordered: false,
            beginning: true,
            ending: true,
            tsn: 0,
            stream_id,
            stream_seq: 0,
            ppid,
            data,
        }
    }

    fn flags(&self) -> u8 {
        (if self.unordered { 0x04 } else { 0 })
            | (if self.beginning { 0x02 } else { 0 })
            | (if self.ending { 0x01 } else { 0 })
    }

    pub fn encoded_len(&self) -> usize {
        DATA_CHUNK_HEADER_SIZE + self.data.len()
    }

    pub fn length(&self) -> u16 {
        declared_length(self.encoded_len())
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(ChunkType::Data as u8);
        buf.push(self.flags());
        buf.extend_from_slice(&self.length().to_be_bytes());
        buf.extend_from_slice(&self.tsn.to_be_bytes());
        buf.extend_from_slice(&self.stream_id.to_be_bytes());
        buf.extend_from_slice(&self.stream_seq.to_be_bytes());
        buf.extend_from_slice(&self.ppid.to_be_bytes());
        buf.extend_from_slice(&self.data);
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < DATA_CHUNK_HEADER_SIZE {
            return Err(SctpError::InvalidPacket("DATA chunk too short".into()));
        }
        let declared = read_u16(data, 2) as usize;
        if declared < DATA_CHUNK_HEADER_SIZE || declared > data.len() {
            return Err(SctpError::InvalidPacket(format!(
                "DATA chunk length {} out of bounds",
                declared
            )));
        }
        let flags = data[1];
        Ok(Self {
            unordered: flags & 0x04 != 0,
            beginning: flags & 0x02 != 0,
            ending: flags & 0x01 != 0,
            tsn: read_u32(data, 4),
            stream_id: read_u16(data, 8),
            stream_seq: read_u16(data, 10),
            ppid: read_u32(data, 12),
            data: data[DATA_CHUNK_HEADER_SIZE..declared].to_vec(),
        })
    }
}

/// SACK chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SackChunk {
    pub cumulative_tsn: u32,
    /// Advertised receiver window credit.
    pub a_rwnd: u32,
    /// Gap ack blocks as (start, end) offsets from the cumulative TSN.
    pub gap_ack_blocks: Vec<(u16, u16)>,
    pub duplicate_tsns: Vec<u32>,
}

impl SackChunk {
    pub fn new(cumulative_tsn: u32, a_rwnd: u32) -> Self {
        Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks: Vec::new(),
            duplicate_tsns: Vec::new(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        SACK_HEADER_SIZE + 4 * (self.gap_ack_blocks.len() + self.duplicate_tsns.len())
    }

    pub fn length(&self) -> u16 {
        declared_length(self.encoded_len())
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(ChunkType::Sack as u8);
        buf.push(0);
        buf.extend_from_slice(&self.length().to_be_bytes());
        buf.extend_from_slice(&self.cumulative_tsn.to_be_bytes());
        buf.extend_from_slice(&self.a_rwnd.to_be_bytes());
        buf.extend_from_slice(&(self.gap_ack_blocks.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.duplicate_tsns.len() as u16).to_be_bytes());
        for (start, end) in &self.gap_ack_blocks {
            buf.extend_from_slice(&start.to_be_bytes());
            buf.extend_from_slice(&end.to_be_bytes());
        }
        for tsn in &self.duplicate_tsns {
            buf.extend_from_slice(&tsn.to_be_bytes());
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(SctpError::InvalidPacket("SACK chunk too short".into()));
        }
        let num_gap_blocks = read_u16(data, 12) as usize;
        let num_dup_tsns = read_u16(data, 14) as usize;
        if data.len() < 16 + 4 * (num_gap_blocks + num_dup_tsns) {
            return Err(SctpError::InvalidPacket("SACK chunk truncated".into()));
        }

        let mut offset = 16;
        let mut gap_ack_blocks = Vec::with_capacity(num_gap_blocks);
        for _ in 0..num_gap_blocks {
            gap_ack_blocks.push((read_u16(data, offset), read_u16(data, offset + 2)));
            offset += 4;
        }
        let mut duplicate_tsns = Vec::with_capacity(num_dup_tsns);
        for _ in 0..num_dup_tsns {
            duplicate_tsns.push(read_u32(data, offset));
            offset += 4;
        }

        Ok(Self {
            cumulative_tsn: read_u32(data, 4),
            a_rwnd: read_u32(data, 8),
            gap_ack_blocks,
            duplicate_tsns,
        })
    }
}

/// AUTH chunk (RFC 4895 section 4.2)
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Type = 0x0F   |   Flags=0     |             Length            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Shared Key Identifier     |   HMAC Identifier             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \                             HMAC                              /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChunk {
    pub shared_key_id: u16,
    pub hmac_id: u16,
    /// Zero-filled until the datagram is signed.
    pub hmac: Vec<u8>,
}

/// Offset of the HMAC inside an AUTH chunk.
pub const AUTH_HMAC_OFFSET: usize = 8;

impl AuthChunk {
    pub fn encoded_len(&self) -> usize {
        AUTH_HMAC_OFFSET + self.hmac.len()
    }

    pub fn length(&self) -> u16 {
        declared_length(self.encoded_len())
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(ChunkType::Auth as u8);
        buf.push(0);
        buf.extend_from_slice(&self.length().to_be_bytes());
        buf.extend_from_slice(&self.shared_key_id.to_be_bytes());
        buf.extend_from_slice(&self.hmac_id.to_be_bytes());
        buf.extend_from_slice(&self.hmac);
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < AUTH_HMAC_OFFSET {
            return Err(SctpError::InvalidPacket("AUTH chunk too short".into()));
        }
        let declared = (read_u16(data, 2) as usize).min(data.len());
        Ok(Self {
            shared_key_id: read_u16(data, 4),
            hmac_id: read_u16(data, 6),
            hmac: data[AUTH_HMAC_OFFSET..declared.max(AUTH_HMAC_OFFSET)].to_vec(),
        })
    }
}

/// Any chunk that can appear in a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SctpChunk {
    Data(DataChunk),
    Sack(SackChunk),
    Auth(AuthChunk),
    /// State cookie echoed back to the peer (opaque).
    CookieEcho(Vec<u8>),
    CookieAck,
    /// ECN-Echo carrying the lowest TSN seen with CE set.
    Ecne { lowest_tsn: u32 },
    /// Congestion window reduced.
    Cwr { lowest_tsn: u32 },
    /// Heartbeat request/ack with opaque sender info.
    Heartbeat(Vec<u8>),
    HeartbeatAck(Vec<u8>),
    /// Abort; T bit set when the sender had no TCB.
    Abort { no_tcb: bool, causes: Vec<u8> },
    Shutdown { cumulative_tsn: u32 },
    ShutdownAck,
    ShutdownComplete { no_tcb: bool },
    /// Anything this crate does not model, kept verbatim.
    Unknown { chunk_type: u8, flags: u8, value: Vec<u8> },
}

impl SctpChunk {
    /// Type byte as it appears on the wire.
    pub fn type_byte(&self) -> u8 {
        match self {
            SctpChunk::Unknown { chunk_type, .. } => *chunk_type,
            other => other.chunk_type().map_or(0xFF, |t| t as u8),
        }
    }

    /// Known chunk type, `None` for [`SctpChunk::Unknown`] with an unmodelled type.
    pub fn chunk_type(&self) -> Option<ChunkType> {
        let t = match self {
            SctpChunk::Data(_) => ChunkType::Data,
            SctpChunk::Sack(_) => ChunkType::Sack,
            SctpChunk::Auth(_) => ChunkType::Auth,
            SctpChunk::CookieEcho(_) => ChunkType::CookieEcho,
            SctpChunk::CookieAck => ChunkType::CookieAck,
            SctpChunk::Ecne { .. } => ChunkType::Ecne,
            SctpChunk::Cwr { .. } => ChunkType::Cwr,
            SctpChunk::Heartbeat(_) => ChunkType::Heartbeat,
            SctpChunk::HeartbeatAck(_) => ChunkType::HeartbeatAck,
            SctpChunk::Abort { .. } => ChunkType::Abort,
            SctpChunk::Shutdown { .. } => ChunkType::Shutdown,
            SctpChunk::ShutdownAck => ChunkType::ShutdownAck,
            SctpChunk::ShutdownComplete { .. } => ChunkType::ShutdownComplete,
            SctpChunk::Unknown { chunk_type, .. } => return ChunkType::from_u8(*chunk_type),
        };
        Some(t)
    }

    /// Header plus value, excluding padding, before it is squeezed into
    /// the 16-bit length field.
    pub fn encoded_len(&self) -> usize {
        let value_len = match self {
            SctpChunk::Data(chunk) => return chunk.encoded_len(),
            SctpChunk::Sack(chunk) => return chunk.encoded_len(),
            SctpChunk::Auth(chunk) => return chunk.encoded_len(),
            SctpChunk::CookieEcho(value)
            | SctpChunk::Heartbeat(value)
            | SctpChunk::HeartbeatAck(value)
            | SctpChunk::Abort { causes: value, .. }
            | SctpChunk::Unknown { value, .. } => value.len(),
            SctpChunk::Ecne { .. } | SctpChunk::Cwr { .. } | SctpChunk::Shutdown { .. } => 4,
            SctpChunk::CookieAck
            | SctpChunk::ShutdownAck
            | SctpChunk::ShutdownComplete { .. } => 0,
        };
        CHUNK_HEADER_SIZE + value_len
    }

    /// Declared length: header plus value, excluding padding.
    pub fn length(&self) -> u16 {
        declared_length(self.encoded_len())
    }

    /// Appends the unpadded chunk to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let flags = match self {
            SctpChunk::Data(chunk) => return chunk.encode(buf),
            SctpChunk::Sack(chunk) => return chunk.encode(buf),
            SctpChunk::Auth(chunk) => return chunk.encode(buf),
            SctpChunk::Abort { no_tcb, .. } | SctpChunk::ShutdownComplete { no_tcb } => {
                u8::from(*no_tcb)
            }
            SctpChunk::Unknown { flags, .. } => *flags,
            _ => 0,
        };
        buf.push(self.type_byte());
        buf.push(flags);
        buf.extend_from_slice(&self.length().to_be_bytes());
        match self {
            SctpChunk::CookieEcho(value)
            | SctpChunk::Heartbeat(value)
            | SctpChunk::HeartbeatAck(value)
            | SctpChunk::Abort { causes: value, .. }
            | SctpChunk::Unknown { value, .. } => buf.extend_from_slice(value),
            SctpChunk::Ecne { lowest_tsn } | SctpChunk::Cwr { lowest_tsn } => {
                buf.extend_from_slice(&lowest_tsn.to_be_bytes())
            }
            SctpChunk::Shutdown { cumulative_tsn } => {
                buf.extend_from_slice(&cumulative_tsn.to_be_bytes())
            }
            _ => {}
        }
    }

    /// Parses one chunk. `data` may extend past the chunk; only the
    /// declared length is consumed.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CHUNK_HEADER_SIZE {
            return Err(SctpError::InvalidPacket("Chunk too short".into()));
        }
        let chunk_type = data[0];
        let flags = data[1];
        let declared = read_u16(data, 2) as usize;
        if declared < CHUNK_HEADER_SIZE || declared > data.len() {
            return Err(SctpError::InvalidPacket(format!(
                "chunk length {} out of bounds",
                declared
            )));
        }
        let data = &data[..declared];
        let value = &data[CHUNK_HEADER_SIZE..];
        let fixed_u32 = |name: &str| -> Result<u32> {
            if value.len() < 4 {
                return Err(SctpError::InvalidPacket(format!("{} chunk too short", name)));
            }
            Ok(read_u32(value, 0))
        };

        let chunk = match ChunkType::from_u8(chunk_type) {
            Some(ChunkType::Data) => SctpChunk::Data(DataChunk::from_bytes(data)?),
            Some(ChunkType::Sack) => SctpChunk::Sack(SackChunk::from_bytes(data)?),
            Some(ChunkType::Auth) => SctpChunk::Auth(AuthChunk::from_bytes(data)?),
            Some(ChunkType::CookieEcho) => SctpChunk::CookieEcho(value.to_vec()),
            Some(ChunkType::CookieAck) => SctpChunk::CookieAck,
            Some(ChunkType::Ecne) => SctpChunk::Ecne {
                lowest_tsn: fixed_u32("ECNE")?,
            },
            Some(ChunkType::Cwr) => SctpChunk::Cwr {
                lowest_tsn: fixed_u32("CWR")?,
            },
            Some(ChunkType::Heartbeat) => SctpChunk::Heartbeat(value.to_vec()),
            Some(ChunkType::HeartbeatAck) => SctpChunk::HeartbeatAck(value.to_vec()),
            Some(ChunkType::Abort) => SctpChunk::Abort {
                no_tcb: flags & 0x01 != 0,
                causes: value.to_vec(),
            },
            Some(ChunkType::Shutdown) => SctpChunk::Shutdown {
                cumulative_tsn: fixed_u32("SHUTDOWN")?,
            },
            Some(ChunkType::ShutdownAck) => SctpChunk::ShutdownAck,
            Some(ChunkType::ShutdownComplete) => SctpChunk::ShutdownComplete {
                no_tcb: flags & 0x01 != 0,
            },
            _ => SctpChunk::Unknown {
                chunk_type,
                flags,
                value: value.to_vec(),
            },
        };
        Ok(chunk)
    }
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Zero-pads `buf` to a 4-byte boundary.
pub(crate) fn pad_to_word(buf: &mut Vec<u8>) {
    let padded = word_round(buf.len() as u32) as usize;
    buf.resize(padded, 0);
}
