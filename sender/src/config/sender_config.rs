use json_parser::impl_json;
use sctp::{OutputConfig, Result};
use std::path::Path;

use crate::config::{LoggingConfig, SessionConfig};

/// Environment variable naming the sender's config file.
pub const CONFIG_ENV_VAR: &str = "SCTP_SENDER_CONFIG";

/// sctp-sender configuration
#[derive(Debug, Clone, Default)]
pub struct SenderConfig {
    pub session: SessionConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl_json! {
    SenderConfig {
        session: SessionConfig,
        output: OutputConfig,
        logging: LoggingConfig,
    }
}

impl SenderConfig {
    /// Load and validate configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: SenderConfig = config_loader::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Looks for `filename` in `$SCTP_SENDER_CONFIG`, `./config/` and `./`.
    pub fn find_and_load(filename: &str) -> Result<Self> {
        let path = config_loader::find_config_file(filename, CONFIG_ENV_VAR)?;
        Self::load_from_file(path)
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.output.validate()
    }
}
