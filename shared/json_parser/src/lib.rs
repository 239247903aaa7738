//! Minimal JSON reader used for configuration files.
//!
//! Parses into a [`JsonValue`] tree and decodes structs through the
//! [`impl_json!`] macro, filling absent fields from `Default`.
//!
//! ```
//! use json_parser::{from_str, impl_json};
//!
//! #[derive(Default)]
//! struct Peer {
//!     port: u16,
//!     host: String,
//! }
//!
//! impl_json! {
//!     Peer {
//!         port: u16,
//!         host: String,
//!     }
//! }
//!
//! let peer: Peer = from_str(r#"{"port": 9899, "host": "10.0.0.2"}"#).unwrap();
//! assert_eq!(peer.port, 9899);
//! ```

pub mod de;
pub mod error;
pub mod macros;
mod parser;
mod value;

pub use de::{Deserialize, from_str};
pub use error::{JsonError, Result};
pub use parser::parse_json;
pub use value::JsonValue;
