//! Output path configuration.

use crate::auth::{AuthKey, HmacAlgorithm};
use crate::chunk::ChunkType;
use crate::error::{Result, SctpError};
use json_parser::impl_json;
use std::path::Path;
use std::time::Duration;

/// Smallest path MTU an association accepts.
pub const MIN_PATHMTU: u32 = 512;
/// Largest path MTU an association accepts.
pub const MAX_PATHMTU: u32 = 65535;

/// Environment variable consulted by [`OutputConfig::find_and_load`].
pub const CONFIG_ENV_VAR: &str = "SCTP_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Disable Nagle-style delay of small DATA chunks.
    pub nodelay: bool,
    /// Idle seconds before the association is closed; 0 disables.
    pub autoclose_secs: u64,
    /// Skip CRC32c (trusted loopback only).
    pub no_checksums: bool,
    pub pmtud_enabled: bool,
    pub default_pathmtu: u32,
    /// Initial peer receive window and our advertised window.
    pub rwnd: u32,
    pub outbound_streams: u16,
    pub sack_delay_ms: u64,
    pub ecn_enabled: bool,
    pub auth_enabled: bool,
    pub auth_hmac: String,
    pub auth_key_id: u16,
    pub auth_secret: String,
    /// Chunk types the peer requires to be authenticated.
    pub auth_chunks: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            nodelay: false,
            autoclose_secs: 0,
            no_checksums: false,
            pmtud_enabled: true,
            default_pathmtu: 1500,
            rwnd: 131072,
            outbound_streams: 10,
            sack_delay_ms: 200,
            ecn_enabled: true,
            auth_enabled: false,
            auth_hmac: "sha1".to_string(),
            auth_key_id: 0,
            auth_secret: String::new(),
            auth_chunks: Vec::new(),
        }
    }
}

impl_json! {
    OutputConfig {
        nodelay: bool,
        autoclose_secs: u64,
        no_checksums: bool,
        pmtud_enabled: bool,
        default_pathmtu: u32,
        rwnd: u32,
        outbound_streams: u16,
        sack_delay_ms: u64,
        ecn_enabled: bool,
        auth_enabled: bool,
        auth_hmac: String,
        auth_key_id: u16,
        auth_secret: String,
        auth_chunks: Vec<String>,
    }
}

impl OutputConfig {
    /// Loads and validates a JSON config file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: OutputConfig = config_loader::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Locates `filename` via `SCTP_CONFIG_PATH`, `./config/` or `./`.
    pub fn find_and_load(filename: &str) -> Result<Self> {
        let path = config_loader::find_config_file(filename, CONFIG_ENV_VAR)?;
        Self::load_from_file(path)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_PATHMTU..=MAX_PATHMTU).contains(&self.default_pathmtu) {
            return Err(SctpError::Config(format!(
                "default_pathmtu {} outside {}..={}",
                self.default_pathmtu, MIN_PATHMTU, MAX_PATHMTU
            )));
        }
        if self.outbound_streams == 0 {
            return Err(SctpError::Config("outbound_streams must be at least 1".into()));
        }
        self.hmac_algorithm()?;
        let chunks = self.auth_chunk_types()?;
        // RFC 4895 section 3.2
        if let Some(forbidden) = chunks.iter().find(|t| {
            matches!(
                t,
                ChunkType::Init | ChunkType::InitAck | ChunkType::ShutdownComplete | ChunkType::Auth
            )
        }) {
            return Err(SctpError::Config(format!(
                "{} chunks cannot be authenticated",
                forbidden
            )));
        }
        if self.auth_enabled && self.auth_secret.is_empty() {
            return Err(SctpError::Config("auth_enabled requires auth_secret".into()));
        }
        Ok(())
    }

    pub fn hmac_algorithm(&self) -> Result<HmacAlgorithm> {
        self.auth_hmac.parse()
    }

    pub fn auth_chunk_types(&self) -> Result<Vec<ChunkType>> {
        self.auth_chunks.iter().map(|name| name.parse()).collect()
    }

    /// Shared key to sign with, if AUTH is enabled.
    pub fn auth_key(&self) -> Result<Option<AuthKey>> {
        if !self.auth_enabled {
            return Ok(None);
        }
        Ok(Some(AuthKey::new(
            self.auth_key_id,
            self.hmac_algorithm()?,
            self.auth_secret.as_bytes(),
        )))
    }

    pub fn sack_delay(&self) -> Duration {
        Duration::from_millis(self.sack_delay_ms)
    }

    pub fn autoclose(&self) -> Option<Duration> {
        (self.autoclose_secs > 0).then(|| Duration::from_secs(self.autoclose_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        OutputConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_small_mtu() {
        let config = OutputConfig {
            default_pathmtu: 500,
            ..OutputConfig::default()
        };
        assert!(matches!(config.validate(), Err(SctpError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_hmac_and_chunks() {
        let config = OutputConfig {
            auth_hmac: "md5".into(),
            ..OutputConfig::default()
        };
        assert!(config.validate().is_err());

        let config = OutputConfig {
            auth_chunks: vec!["DATA".into(), "NOPE".into()],
            ..OutputConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unauthenticatable_chunks() {
        let config = OutputConfig {
            auth_chunks: vec!["INIT".into()],
            ..OutputConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("INIT"));
    }

    #[test]
    fn test_auth_requires_secret() {
        let mut config = OutputConfig {
            auth_enabled: true,
            ..OutputConfig::default()
        };
        assert!(config.validate().is_err());
        config.auth_secret = "s3cret".into();
        config.validate().unwrap();
        let key = config.auth_key().unwrap().unwrap();
        assert_eq!(key.algorithm, HmacAlgorithm::Sha1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "nodelay": true,
                "autoclose_secs": 30,
                "auth_enabled": true,
                "auth_hmac": "sha256",
                "auth_secret": "shared",
                "auth_chunks": ["DATA", "SACK"]
            }}"#
        )
        .unwrap();

        let config = OutputConfig::load_from_file(file.path()).unwrap();
        assert!(config.nodelay);
        assert_eq!(config.autoclose(), Some(Duration::from_secs(30)));
        assert_eq!(config.default_pathmtu, 1500);
        assert_eq!(
            config.auth_chunk_types().unwrap(),
            vec![ChunkType::Data, ChunkType::Sack]
        );
        assert_eq!(config.hmac_algorithm().unwrap(), HmacAlgorithm::Sha256);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_pathmtu": 100}}"#).unwrap();
        assert!(OutputConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = OutputConfig::load_from_file("/nonexistent/sctp.json").unwrap_err();
        assert!(matches!(err, SctpError::Config(_)));
    }
}
