use json_parser::JsonError;
use std::fmt;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Failures while locating, reading or decoding a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// No file at the given path, or none of the searched locations had one.
    FileNotFound(String),
    /// The file exists but could not be read.
    ReadError(String),
    /// The content is not valid JSON for the target type.
    Parse { path: String, source: JsonError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ReadError(msg) => write!(f, "Error reading config file: {}", msg),
            ConfigError::Parse { path, source } => {
                write!(f, "Invalid config in {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}
