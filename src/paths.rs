//! XDG directory helpers for config and log locations.

use std::path::PathBuf;

const APP_DIR: &str = "tomcast";

/// Base directory for persistent data.
///
/// Uses `TOM_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/tomcast` or
/// `~/.local/share/tomcast`.
pub(crate) fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOM_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join(APP_DIR)
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Base directory for configuration files.
///
/// Uses `TOM_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/tomcast` or
/// `~/.config/tomcast`.
pub(crate) fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOM_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join(APP_DIR)
}
