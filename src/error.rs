use thiserror::Error;

use crate::config::ConfigError;
use crate::core::PeerIdError;
use crate::daemon::{SendError, ServerError, WireError};

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Crate-level convenience error.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PeerId(#[from] PeerIdError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Config(_) | Error::PeerId(_) | Error::Wire(_) => Transience::Permanent,
            Error::Server(ServerError::Bind { .. }) => Transience::Retryable,
            Error::Server(ServerError::Io(_)) => Transience::Retryable,
            Error::Send(SendError::Wire { .. }) => Transience::Permanent,
            Error::Send(_) => Transience::Retryable,
        }
    }
}
