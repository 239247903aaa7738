//! AUTH chunk signing (RFC 4895).
//!
//! The HMAC covers the AUTH chunk itself, with its HMAC field zeroed,
//! followed by every chunk placed after it in the datagram.

use crate::chunk::{AUTH_HMAC_OFFSET, AuthChunk, ChunkType, SctpChunk, read_u16};
use crate::error::{Result, SctpError};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// HMAC identifiers from the RFC 4895 registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HmacAlgorithm {
    Sha1 = 1,
    Sha256 = 3,
}

impl HmacAlgorithm {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(HmacAlgorithm::Sha1),
            3 => Some(HmacAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Output length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HmacAlgorithm::Sha1 => 20,
            HmacAlgorithm::Sha256 => 32,
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HmacAlgorithm::Sha1 => write!(f, "sha1"),
            HmacAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for HmacAlgorithm {
    type Err = SctpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" | "hmac-sha1" => Ok(HmacAlgorithm::Sha1),
            "sha256" | "sha-256" | "hmac-sha256" => Ok(HmacAlgorithm::Sha256),
            other => Err(SctpError::Config(format!("unsupported HMAC '{}'", other))),
        }
    }
}

/// Active endpoint-pair shared key.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey {
    pub key_id: u16,
    pub algorithm: HmacAlgorithm,
    secret: Vec<u8>,
}

impl AuthKey {
    pub fn new(key_id: u16, algorithm: HmacAlgorithm, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id,
            algorithm,
            secret: secret.into(),
        }
    }

    /// AUTH chunk for this key with a zeroed HMAC field.
    pub fn placeholder_chunk(&self) -> SctpChunk {
        SctpChunk::Auth(AuthChunk {
            shared_key_id: self.key_id,
            hmac_id: self.algorithm.id(),
            hmac: vec![0; self.algorithm.digest_len()],
        })
    }

    pub fn compute(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            HmacAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(&self.secret)
                    .map_err(|e| SctpError::Crypto(format!("HMAC init failed: {}", e)))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            HmacAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(&self.secret)
                    .map_err(|e| SctpError::Crypto(format!("HMAC init failed: {}", e)))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn hmac_range(key: &AuthKey, datagram: &[u8], auth_offset: usize) -> Result<(usize, usize)> {
    let header_end = auth_offset + AUTH_HMAC_OFFSET;
    if datagram.len() < header_end || datagram[auth_offset] != ChunkType::Auth as u8 {
        return Err(SctpError::Crypto(format!(
            "no AUTH chunk at offset {}",
            auth_offset
        )));
    }
    let hmac_id = read_u16(datagram, auth_offset + 6);
    if hmac_id != key.algorithm.id() {
        return Err(SctpError::Crypto(format!(
            "AUTH chunk uses HMAC {} but key {} is {}",
            hmac_id, key.key_id, key.algorithm
        )));
    }
    let end = header_end + key.algorithm.digest_len();
    if datagram.len() < end {
        return Err(SctpError::Crypto("AUTH chunk truncated".into()));
    }
    Ok((header_end, end))
}

/// Fills in the HMAC of the AUTH chunk starting at `auth_offset`.
pub fn sign_in_place(key: &AuthKey, datagram: &mut [u8], auth_offset: usize) -> Result<()> {
    let (start, end) = hmac_range(key, datagram, auth_offset)?;
    datagram[start..end].fill(0);
    let hmac = key.compute(&datagram[auth_offset..])?;
    datagram[start..end].copy_from_slice(&hmac);
    Ok(())
}

/// Checks the HMAC of the AUTH chunk starting at `auth_offset`.
pub fn verify(key: &AuthKey, datagram: &[u8], auth_offset: usize) -> Result<bool> {
    let (start, end) = hmac_range(key, datagram, auth_offset)?;
    let mut covered = datagram[auth_offset..].to_vec();
    let received = datagram[start..end].to_vec();
    covered[start - auth_offset..end - auth_offset].fill(0);
    Ok(key.compute(&covered)? == received)
}
