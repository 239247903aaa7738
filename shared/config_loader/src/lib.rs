//! # Config Loader
//!
//! Locates configuration files and decodes them with `json_parser`.
//!
//! ```no_run
//! use config_loader::{find_config_file, load_config_file};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = find_config_file("sctp.json", "SCTP_CONFIG_PATH")?;
//!     let raw = load_config_file(&path)?;
//!     println!("{} bytes of config", raw.len());
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{ConfigError, Result};

use json_parser::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads a configuration file into a string without interpreting it.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))
}

/// Reads and decodes a JSON configuration file.
pub fn load_json<T: Deserialize, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = load_config_file(path)?;
    json_parser::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Searches for `filename`, in order:
/// 1. the path in environment variable `env_var` (if set and existing)
/// 2. `./config/{filename}`
/// 3. `./{filename}`
pub fn find_config_file(filename: &str, env_var: &str) -> Result<PathBuf> {
    let from_env = env::var_os(env_var).map(PathBuf::from);
    let candidates = from_env
        .into_iter()
        .chain([Path::new("./config").join(filename), Path::new(".").join(filename)]);

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found (searched ${}, ./config/{}, ./{})",
        filename, env_var, filename, filename
    )))
}

/// [`find_config_file`] followed by [`load_json`].
pub fn find_and_load<T: Deserialize>(filename: &str, env_var: &str) -> Result<T> {
    let path = find_config_file(filename, env_var)?;
    load_json(path)
}
