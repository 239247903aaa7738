//! # sctp-sender
//!
//! Pushes user messages through the `sctp` output path over UDP
//! encapsulation and waits for the peer's SACKs.

pub mod config;
pub mod session;
pub mod udp;

pub use config::SenderConfig;
pub use session::{Sender, SessionSummary};
pub use udp::UdpAf;
