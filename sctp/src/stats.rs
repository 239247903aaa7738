//! Per-association output counters.

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Mib {
    pub out_packets: u64,
    pub out_data_chunks: u64,
    pub out_ctrl_chunks: u64,
    pub out_no_routes: u64,
    pub out_xmit_errors: u64,
    pub out_checksum_offloaded: u64,
}

impl fmt::Display for Mib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets={} data={} ctrl={} noroutes={} xmit_errors={} offloaded={}",
            self.out_packets,
            self.out_data_chunks,
            self.out_ctrl_chunks,
            self.out_no_routes,
            self.out_xmit_errors,
            self.out_checksum_offloaded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mib = Mib {
            out_packets: 3,
            out_no_routes: 1,
            ..Mib::default()
        };
        assert_eq!(
            mib.to_string(),
            "packets=3 data=0 ctrl=0 noroutes=1 xmit_errors=0 offloaded=0"
        );
    }
}
