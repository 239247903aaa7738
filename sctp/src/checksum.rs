//! CRC32c (Castagnoli) checksum for the SCTP common header.

/// Offset of the checksum field in the common header.
pub const CHECKSUM_OFFSET: usize = 8;

/// How the checksum field of an outgoing datagram gets filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Checksums disabled (loopback); the field stays zero.
    Skip,
    /// The route computes it; the field stays zero and the datagram is flagged.
    Offload,
    /// CRC32c computed here and stored little-endian.
    Software,
}

impl ChecksumPolicy {
    pub fn select(no_checksums: bool, route_offload: bool) -> Self {
        if no_checksums {
            ChecksumPolicy::Skip
        } else if route_offload {
            ChecksumPolicy::Offload
        } else {
            ChecksumPolicy::Software
        }
    }

    /// Fills the checksum field of `datagram` per policy. Returns whether
    /// the datagram must be flagged for offload.
    pub fn apply(self, datagram: &mut [u8]) -> bool {
        match self {
            ChecksumPolicy::Skip => false,
            ChecksumPolicy::Offload => true,
            ChecksumPolicy::Software => {
                write_checksum(datagram);
                false
            }
        }
    }
}

/// Computes the CRC32c of `datagram` with its checksum field zeroed and
/// writes it in little-endian order (RFC 4960 Appendix B byte order).
pub fn write_checksum(datagram: &mut [u8]) {
    datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
    let crc = crc32c(datagram);
    datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
}

/// Checks a received datagram's checksum.
pub fn verify_checksum(datagram: &[u8]) -> bool {
    if datagram.len() < CHECKSUM_OFFSET + 4 {
        return false;
    }
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4]);

    let mut copy = datagram.to_vec();
    copy[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
    crc32c(&copy) == u32::from_le_bytes(stored)
}

pub fn crc32c(data: &[u8]) -> u32 {
    const CRC32C_TABLE: [u32; 256] = generate_crc32c_table();

    let mut crc: u32 = 0xFFFFFFFF;
    for byte in data {
        let index = ((crc ^ (*byte as u32)) & 0xFF) as usize;
        crc = CRC32C_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

const fn generate_crc32c_table() -> [u32; 256] {
    const POLYNOMIAL: u32 = 0x82F63B78; // reflected 0x1EDC6F41
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_value() {
        // RFC 3720 B.4 check value.
        assert_eq!(crc32c(b"123456789"), 0xE3069283);
        assert_eq!(crc32c(&[0u8; 32]), 0x8A9136AA);
    }

    #[test]
    fn test_policy_selection() {
        assert_eq!(ChecksumPolicy::select(true, true), ChecksumPolicy::Skip);
        assert_eq!(ChecksumPolicy::select(false, true), ChecksumPolicy::Offload);
        assert_eq!(ChecksumPolicy::select(false, false), ChecksumPolicy::Software);
    }

    #[test]
    fn test_software_checksum_verifies() {
        let mut datagram = vec![0x13, 0x88, 0x13, 0x89, 1, 2, 3, 4, 0, 0, 0, 0, 11, 0, 0, 4];
        assert!(!ChecksumPolicy::Software.apply(&mut datagram));
        assert!(verify_checksum(&datagram));

        datagram[13] ^= 0x01;
        assert!(!verify_checksum(&datagram));
    }

    #[test]
    fn test_offload_and_skip_leave_field_zero() {
        let mut datagram = vec![0xAAu8; 16];
        datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
        assert!(ChecksumPolicy::Offload.apply(&mut datagram));
        assert!(!ChecksumPolicy::Skip.apply(&mut datagram));
        assert_eq!(&datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4], &[0, 0, 0, 0]);
    }
}
