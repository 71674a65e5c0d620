use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{DEFAULT_PORT, PeerIdError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid peer address {raw:?}: {source}")]
    InvalidPeer {
        raw: String,
        #[source]
        source: PeerIdError,
    },
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub node: NodeSettings,
    pub retry: RetrySettings,
    pub engine: EngineSettings,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(addr) = &self.node.listen_addr
            && addr.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "node.listen_addr",
                reason: "must not be empty".into(),
            });
        }
        if self.node.default_port == 0 {
            return Err(ConfigError::Invalid {
                field: "node.default_port",
                reason: "must be non-zero".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.base_delay_ms",
                reason: format!(
                    "{} exceeds retry.max_delay_ms {}",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        if !self.engine.rate.is_finite() || self.engine.rate <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.rate",
                reason: format!("{} is not a positive rate", self.engine.rate),
            });
        }
        if self.engine.vocabulary.is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine.vocabulary",
                reason: "must contain at least one word".into(),
            });
        }
        if self.engine.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.max_connections",
                reason: "must be at least 1".into(),
            });
        }
        if self.engine.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.max_frame_bytes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Address to bind. Unset means the identity's own `host:port`.
    pub listen_addr: Option<String>,
    /// Identity announced to peers. Usually given on the command line.
    pub identity: Option<String>,
    pub peers: Vec<String>,
    /// Port assumed for peer addresses written without one.
    pub default_port: u16,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            listen_addr: None,
            identity: None,
            peers: Vec::new(),
            default_port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 250,
            max_delay_ms: 3_000,
            connect_timeout_ms: 2_000,
            io_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Mean originated messages per second.
    pub rate: f64,
    pub handshake_interval_ms: u64,
    pub accept_poll_ms: u64,
    pub max_connections: usize,
    pub max_frame_bytes: usize,
    pub vocabulary: Vec<String>,
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rate: crate::daemon::DEFAULT_RATE,
            handshake_interval_ms: 400,
            accept_poll_ms: 50,
            max_connections: crate::daemon::DEFAULT_MAX_CONNECTIONS,
            max_frame_bytes: crate::daemon::DEFAULT_MAX_FRAME_BYTES,
            vocabulary: crate::daemon::default_vocabulary(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Compact,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Never,
        }
    }
}
