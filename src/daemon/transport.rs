//! Outbound sends: one TCP connection per envelope, with bounded retry.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::core::{Envelope, PeerId};

use super::backoff::RetryPolicy;
use super::frame::DEFAULT_MAX_FRAME_BYTES;
use super::proto::{WireError, encode_wire};
use super::shutdown::ShutdownSignal;

/// Result of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("address {addr} did not resolve")]
    Unresolved { addr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("peer {peer} unreachable after {attempts} attempts: {last}")]
    Exhausted {
        peer: PeerId,
        attempts: u32,
        #[source]
        last: AttemptError,
    },
    #[error("send to {peer} abandoned after {attempts} attempts: shutting down")]
    Cancelled { peer: PeerId, attempts: u32 },
    #[error("envelope for {peer} could not be encoded: {source}")]
    Wire {
        peer: PeerId,
        #[source]
        source: WireError,
    },
}

impl SendError {
    pub fn peer(&self) -> &PeerId {
        match self {
            SendError::Exhausted { peer, .. }
            | SendError::Cancelled { peer, .. }
            | SendError::Wire { peer, .. } => peer,
        }
    }

    /// Only retry exhaustion says anything about the peer itself.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SendError::Exhausted { .. })
    }
}

/// Outbound seam used by the engine.
pub trait Outbound: Send + Sync {
    /// Deliver `envelope` to `peer`, retrying per the configured policy.
    fn send(&self, peer: &PeerId, envelope: &Envelope) -> Result<SendReport, SendError>;

    /// Single best-effort attempt, no retry.
    fn send_once(&self, peer: &PeerId, envelope: &Envelope) -> Result<(), SendError>;
}

#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(2),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Connect, write one frame, close.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    config: TransportConfig,
    shutdown: ShutdownSignal,
}

impl TcpTransport {
    pub fn new(config: TransportConfig, shutdown: ShutdownSignal) -> Self {
        Self { config, shutdown }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn encode(&self, peer: &PeerId, envelope: &Envelope) -> Result<Vec<u8>, SendError> {
        encode_wire(envelope, self.config.max_frame_bytes).map_err(|source| SendError::Wire {
            peer: peer.clone(),
            source,
        })
    }

    fn attempt(&self, peer: &PeerId, frame: &[u8]) -> Result<(), AttemptError> {
        let addrs: Vec<SocketAddr> = peer.as_str().to_socket_addrs()?.collect();
        let mut last = None;
        for addr in addrs {
            match self.write_to(addr, frame) {
                Ok(()) => return Ok(()),
                Err(err) => last = Some(err),
            }
        }
        Err(last
            .map(AttemptError::Io)
            .unwrap_or_else(|| AttemptError::Unresolved {
                addr: peer.to_string(),
            }))
    }

    fn write_to(&self, addr: SocketAddr, frame: &[u8]) -> std::io::Result<()> {
        let mut stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;
        stream.write_all(frame)?;
        stream.flush()?;
        let _ = stream.shutdown(Shutdown::Write);
        Ok(())
    }
}

impl Outbound for TcpTransport {
    fn send(&self, peer: &PeerId, envelope: &Envelope) -> Result<SendReport, SendError> {
        let frame = self.encode(peer, envelope)?;
        let policy = self.config.retry;
        let mut backoff = policy.backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.attempt(peer, &frame) {
                Ok(()) => {
                    tracing::debug!(
                        peer = %peer,
                        kind = envelope.payload.kind().as_str(),
                        ts = envelope.timestamp,
                        attempts,
                        "envelope sent"
                    );
                    return Ok(SendReport { attempts });
                }
                Err(err) => {
                    tracing::warn!(peer = %peer, attempt = attempts, "send attempt failed: {err}");
                    if attempts >= policy.max_attempts.max(1) {
                        return Err(SendError::Exhausted {
                            peer: peer.clone(),
                            attempts,
                            last: err,
                        });
                    }
                    let fired = self.shutdown.sleep(backoff.next_delay());
                    if fired && !envelope.payload.is_shutdown() {
                        return Err(SendError::Cancelled {
                            peer: peer.clone(),
                            attempts,
                        });
                    }
                }
            }
        }
    }

    fn send_once(&self, peer: &PeerId, envelope: &Envelope) -> Result<(), SendError> {
        let frame = self.encode(peer, envelope)?;
        self.attempt(peer, &frame)
            .map_err(|last| SendError::Exhausted {
                peer: peer.clone(),
                attempts: 1,
                last,
            })
    }
}
