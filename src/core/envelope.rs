//! Peer identities and the message envelope exchanged between peers.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port every peer listens on when an identity names only a host.
pub const DEFAULT_PORT: u16 = 55550;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdError {
    #[error("peer identity is empty")]
    Empty,
    #[error("peer identity {raw:?} has no host")]
    MissingHost { raw: String },
    #[error("peer identity {raw:?} has invalid port {port:?}")]
    InvalidPort { raw: String, port: String },
}

/// Network identity of a peer, normalized to `host:port`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Parse `host` or `host:port`, filling in [`DEFAULT_PORT`].
    pub fn parse(raw: &str) -> Result<Self, PeerIdError> {
        Self::parse_with_port(raw, DEFAULT_PORT)
    }

    pub fn parse_with_port(raw: &str, default_port: u16) -> Result<Self, PeerIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PeerIdError::Empty);
        }

        let (host, port) = match trimmed.rsplit_once(':') {
            // `[v6]:port` or `host:port`; a bare v6 literal has colons in the host part.
            Some((host, port)) if !host.contains(':') || host.ends_with(']') => {
                let port = port.parse::<u16>().map_err(|_| PeerIdError::InvalidPort {
                    raw: trimmed.to_string(),
                    port: port.to_string(),
                })?;
                (host.to_string(), port)
            }
            Some(_) => (format!("[{trimmed}]"), default_port),
            None => (trimmed.to_string(), default_port),
        };

        if host.is_empty() || host == "[]" {
            return Err(PeerIdError::MissingHost {
                raw: trimmed.to_string(),
            });
        }

        Ok(Self(format!("{host}:{port}")))
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.0)
    }

    pub fn port(&self) -> u16 {
        self.0
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }
}

impl TryFrom<String> for PeerId {
    type Error = PeerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeerId> for String {
    fn from(value: PeerId) -> Self {
        value.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({:?})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire discriminant for [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Word,
    Ack,
    Ready,
    Shutdown,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Word => "word",
            PayloadKind::Ack => "ack",
            PayloadKind::Ready => "ready",
            PayloadKind::Shutdown => "shutdown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "word" => Some(PayloadKind::Word),
            "ack" => Some(PayloadKind::Ack),
            "ready" => Some(PayloadKind::Ready),
            "shutdown" => Some(PayloadKind::Shutdown),
            _ => None,
        }
    }
}

/// What an envelope carries: an application word or one of the control sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Word(String),
    Ack,
    Ready,
    Shutdown,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Word(_) => PayloadKind::Word,
            Payload::Ack => PayloadKind::Ack,
            Payload::Ready => PayloadKind::Ready,
            Payload::Shutdown => PayloadKind::Shutdown,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Payload::Ack)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Payload::Shutdown)
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Payload::Word(word) => Some(word),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Word(word) => f.write_str(word),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// `(origin, payload, timestamp)` as sent on the wire. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub origin: PeerId,
    pub payload: Payload,
    pub timestamp: u64,
}

impl Envelope {
    pub fn new(origin: PeerId, payload: Payload, timestamp: u64) -> Self {
        Self {
            origin,
            payload,
            timestamp,
        }
    }

    pub fn word(origin: PeerId, word: impl Into<String>, timestamp: u64) -> Self {
        Self::new(origin, Payload::Word(word.into()), timestamp)
    }

    pub fn ack(origin: PeerId, timestamp: u64) -> Self {
        Self::new(origin, Payload::Ack, timestamp)
    }

    /// Handshake envelopes carry no clock value.
    pub fn ready(origin: PeerId) -> Self {
        Self::new(origin, Payload::Ready, 0)
    }

    pub fn shutdown(origin: PeerId, timestamp: u64) -> Self {
        Self::new(origin, Payload::Shutdown, timestamp)
    }
}
