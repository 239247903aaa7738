//! SCTP packet output path
//!
//! Builds outgoing SCTP datagrams for an association: chunks are admitted
//! into a per-transport [`Packet`] under receive-window, congestion-window,
//! Nagle and path-MTU rules, AUTH and SACK chunks are bundled where they
//! fit, and the finished datagram is signed, checksummed and handed to an
//! [`AfSpecific`] hook.
//!
//! ```
//! use logging::{LogLevel, Logger};
//! use sctp::{Association, MemoryAf, OutputConfig, Route};
//!
//! let (logger, _capture) = Logger::in_memory(LogLevel::Info);
//! let af = MemoryAf::with_default_route(Route::new(1500));
//! let mut assoc = Association::new(&OutputConfig::default(), af, &logger, 5000, 5000).unwrap();
//! let path = assoc.add_transport("192.0.2.7:5000".parse().unwrap());
//! assoc.establish(0x1234_5678, 65536, 1);
//!
//! assoc.send_message(0, 51, b"hello", false).unwrap();
//! assoc.flush(path).unwrap();
//! assert_eq!(assoc.af().sent.len(), 1);
//! ```

pub mod af;
pub mod association;
pub mod auth;
pub mod checksum;
pub mod chunk;
pub mod config;
pub mod decode;
pub mod error;
pub mod outbound;
pub mod outqueue;
pub mod output;
pub mod stats;
pub mod timer;
pub mod transport;

pub use af::{AddressFamily, AfSpecific, Datagram, MemoryAf};
pub use association::{Association, AssociationState, PeerInfo, SocketState, TimerEvent};
pub use chunk::{ChunkType, DataChunk, SctpChunk};
pub use config::OutputConfig;
pub use decode::ParsedPacket;
pub use error::{Result, SctpError};
pub use outbound::{ControlChunk, DataChunkRef, DataMessage, OutboundChunk, OutboundData};
pub use outqueue::{FlushReport, OutQueue};
pub use output::{Packet, Refused, XmitResult, XmitStatus};
pub use transport::{Route, Transport, TransportId};
