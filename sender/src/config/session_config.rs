use json_parser::impl_json;
use sctp::{Result, SctpError};
use std::net::SocketAddr;
use std::time::Duration;

/// Endpoint addresses, the peer parameters learned out of band and the
/// traffic to generate.
///
/// There is no handshake: the association starts established with the
/// peer's verification tag, window and initial TSN taken from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local UDP address the encapsulating socket binds to.
    pub bind_address: String,
    /// Peer UDP address datagrams are sent to.
    pub peer_address: String,
    pub local_port: u16,
    pub peer_port: u16,
    pub peer_vtag: u32,
    pub peer_rwnd: u32,
    pub peer_initial_tsn: u32,
    /// MTU of the link under the UDP encapsulation.
    pub link_mtu: u32,
    pub message_count: u32,
    pub message_size: usize,
    /// Messages are spread round-robin over this many streams.
    pub stream_count: u16,
    pub unordered: bool,
    pub ppid: u32,
    pub poll_interval_ms: u64,
    /// Give up when nothing arrives from the peer for this long.
    pub idle_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bind_address: "0.0.0.0:0".to_string(),
            peer_address: "127.0.0.1:9899".to_string(),
            local_port: 5000,
            peer_port: 5000,
            peer_vtag: 1,
            peer_rwnd: 131072,
            peer_initial_tsn: 1,
            link_mtu: 1500,
            message_count: 16,
            message_size: 1024,
            stream_count: 1,
            unordered: false,
            ppid: 0,
            poll_interval_ms: 10,
            idle_timeout_ms: 3000,
        }
    }
}

impl_json! {
    SessionConfig {
        bind_address: String,
        peer_address: String,
        local_port: u16,
        peer_port: u16,
        peer_vtag: u32,
        peer_rwnd: u32,
        peer_initial_tsn: u32,
        link_mtu: u32,
        message_count: u32,
        message_size: usize,
        stream_count: u16,
        unordered: bool,
        ppid: u32,
        poll_interval_ms: u64,
        idle_timeout_ms: u64,
    }
}

impl SessionConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        parse_addr("bind_address", &self.bind_address)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        parse_addr("peer_address", &self.peer_address)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        self.peer_addr()?;
        if self.peer_vtag == 0 {
            return Err(SctpError::Config("peer_vtag must be non-zero".into()));
        }
        if self.stream_count == 0 {
            return Err(SctpError::Config("stream_count must be at least 1".into()));
        }
        if self.message_size == 0 {
            return Err(SctpError::Config("message_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| SctpError::Config(format!("{} '{}': {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn test_bad_address() {
        let config = SessionConfig {
            peer_address: "localhost".into(),
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("peer_address"));
    }

    #[test]
    fn test_zero_streams() {
        let config = SessionConfig {
            stream_count: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
