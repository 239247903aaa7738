//! Error types for logging operations.

use std::fmt;
use std::io;

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Errors that can occur while setting up or feeding a logger.
#[derive(Debug)]
pub enum LoggingError {
    /// I/O error from the log file.
    Io(io::Error),
    /// The level string is not one of debug/info/warn/error.
    UnknownLevel(String),
    /// The writer thread is gone.
    Disconnected,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::Io(err) => write!(f, "I/O error: {}", err),
            LoggingError::UnknownLevel(level) => write!(f, "Unknown log level: {}", level),
            LoggingError::Disconnected => write!(f, "Log writer disconnected"),
        }
    }
}

impl std::error::Error for LoggingError {}

impl From<io::Error> for LoggingError {
    fn from(err: io::Error) -> Self {
        LoggingError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_unknown_level_display() {
        let err = LoggingError::UnknownLevel("loud".to_string());
        assert_eq!(err.to_string(), "Unknown log level: loud");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = Error::new(ErrorKind::PermissionDenied, "read-only");
        let logging_err: LoggingError = io_err.into();

        assert!(matches!(logging_err, LoggingError::Io(_)));
    }
}
