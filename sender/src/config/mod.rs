//! Sender configuration

pub mod logging_config;
pub mod sender_config;
pub mod session_config;

pub use logging_config::LoggingConfig;
pub use sender_config::SenderConfig;
pub use session_config::SessionConfig;
