//! Datagram decoding
//!
//! Parses what the output path produces: the common header followed by
//! padded chunks.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Source Port Number        |     Destination Port Number   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Verification Tag                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! /                            Chunks                             /
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::checksum::{CHECKSUM_OFFSET, verify_checksum};
use crate::chunk::{ChunkType, SctpChunk, read_u16, read_u32, word_round};
use crate::error::{Result, SctpError};
use crate::output::SCTP_HEADER_SIZE;

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
    /// Checksum field as stored (little-endian CRC32c).
    pub checksum: u32,
    pub chunks: Vec<SctpChunk>,
    /// Byte offset of each chunk within the datagram.
    pub offsets: Vec<usize>,
}

impl ParsedPacket {
    /// Parses a datagram without checking its checksum. Malformed chunk
    /// headers are errors.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SCTP_HEADER_SIZE {
            return Err(SctpError::InvalidPacket("SCTP packet too short".into()));
        }

        let mut chunks = Vec::new();
        let mut offsets = Vec::new();
        let mut offset = SCTP_HEADER_SIZE;

        while offset < data.len() {
            let chunk = SctpChunk::from_bytes(&data[offset..]).map_err(|e| {
                SctpError::InvalidPacket(format!("chunk at offset {}: {}", offset, e))
            })?;
            let declared = read_u16(data, offset + 2) as u32;
            chunks.push(chunk);
            offsets.push(offset);
            offset += word_round(declared) as usize;
        }

        Ok(Self {
            source_port: read_u16(data, 0),
            destination_port: read_u16(data, 2),
            verification_tag: read_u32(data, 4),
            checksum: u32::from_le_bytes([
                data[CHECKSUM_OFFSET],
                data[CHECKSUM_OFFSET + 1],
                data[CHECKSUM_OFFSET + 2],
                data[CHECKSUM_OFFSET + 3],
            ]),
            chunks,
            offsets,
        })
    }

    /// Parses a datagram and rejects it if the CRC32c does not match.
    pub fn parse_verified(data: &[u8]) -> Result<Self> {
        if !verify_checksum(data) {
            return Err(SctpError::InvalidPacket("checksum mismatch".into()));
        }
        Self::parse(data)
    }

    pub fn chunk_types(&self) -> Vec<Option<ChunkType>> {
        self.chunks.iter().map(SctpChunk::chunk_type).collect()
    }

    /// Offset of the first AUTH chunk, for HMAC verification.
    pub fn auth_offset(&self) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| matches!(c, SctpChunk::Auth(_)))
            .map(|index| self.offsets[index])
    }
}
