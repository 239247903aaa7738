//! SCTP error types

use std::fmt;

pub type Result<T> = std::result::Result<T, SctpError>;

/// Errors raised by the packet output path and its helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SctpError {
    /// Buffer for the outgoing datagram could not be allocated.
    NoMemory,
    /// No route to the transport's destination address.
    NoRoute(String),
    /// The address-family transmit hook failed.
    Transmit(String),
    Crypto(String),
    InvalidPacket(String),
    Config(String),
    /// Operation not allowed in the current association state.
    InvalidState(String),
}

impl fmt::Display for SctpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SctpError::NoMemory => write!(f, "Out of memory"),
            SctpError::NoRoute(dest) => write!(f, "No route to {}", dest),
            SctpError::Transmit(msg) => write!(f, "Transmit error: {}", msg),
            SctpError::Crypto(msg) => write!(f, "Crypto error: {}", msg),
            SctpError::InvalidPacket(msg) => write!(f, "Invalid packet: {}", msg),
            SctpError::Config(msg) => write!(f, "Config error: {}", msg),
            SctpError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for SctpError {}

impl From<config_loader::ConfigError> for SctpError {
    fn from(err: config_loader::ConfigError) -> Self {
        SctpError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SctpError {
    fn from(err: std::io::Error) -> Self {
        SctpError::Transmit(err.to_string())
    }
}
