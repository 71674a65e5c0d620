//! Config loading.

mod load;
mod merge;
mod schema;

pub use load::{config_path, load, load_file};
pub use merge::{apply_env_overrides, apply_overrides_from};
pub use schema::{
    Config, ConfigError, EngineSettings, FileLoggingConfig, LogFormat, LogRotation,
    LoggingConfig, NodeSettings, RetrySettings,
};
