use std::fs;
use std::path::{Path, PathBuf};

use super::merge::apply_env_overrides;
use super::{Config, ConfigError};

pub fn config_path() -> PathBuf {
    crate::paths::config_dir().join("config.toml")
}

/// Parse one config file. `Ok(None)` if it does not exist.
pub fn load_file(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Load the effective config: file (explicit or default path), then env
/// overrides. An explicit path must exist; a missing default file means
/// defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_file(path)?.ok_or_else(|| ConfigError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?,
        None => load_file(&config_path())?.unwrap_or_default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}
