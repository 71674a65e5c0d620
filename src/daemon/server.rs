//! Inbound accept loop and per-connection handlers.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::core::PeerId;

use super::engine::{InboundOutcome, PeerEngine};
use super::frame::DEFAULT_MAX_FRAME_BYTES;
use super::proto::{WireError, read_envelope};
use super::shutdown::ShutdownSignal;

pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub max_connections: NonZeroUsize,
    pub accept_poll: Duration,
    pub io_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: NonZeroUsize::new(DEFAULT_MAX_CONNECTIONS)
                .unwrap_or(NonZeroUsize::MIN),
            accept_poll: Duration::from_millis(50),
            io_timeout: Duration::from_secs(2),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

pub struct PeerServer {
    engine: Arc<PeerEngine>,
    config: ServerConfig,
}

pub struct PeerServerHandle {
    join: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl PeerServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept loop to exit. It exits once shutdown fires.
    pub fn join(self) {
        if self.join.join().is_err() {
            tracing::error!("accept loop panicked");
        }
    }
}

/// Bind the listening socket.
pub fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

impl PeerServer {
    pub fn new(engine: Arc<PeerEngine>, config: ServerConfig) -> Self {
        Self { engine, config }
    }

    pub fn start(self, listener: TcpListener) -> Result<PeerServerHandle, ServerError> {
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let runtime = ServerRuntime {
            shutdown: self.engine.shutdown_signal().clone(),
            engine: self.engine,
            config: self.config,
            active_connections: Arc::new(AtomicUsize::new(0)),
        };

        tracing::info!(%local_addr, "listening");
        let join = thread::spawn(move || run_accept_loop(listener, runtime));

        Ok(PeerServerHandle { join, local_addr })
    }
}

#[derive(Clone)]
struct ServerRuntime {
    engine: Arc<PeerEngine>,
    config: ServerConfig,
    shutdown: ShutdownSignal,
    active_connections: Arc<AtomicUsize>,
}

struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn try_acquire(active: &Arc<AtomicUsize>, max: NonZeroUsize) -> Option<Self> {
        let mut current = active.load(Ordering::Acquire);
        loop {
            if current >= max.get() {
                return None;
            }
            match active.compare_exchange(
                current,
                current.saturating_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Self {
                        active: Arc::clone(active),
                    });
                }
                Err(next) => current = next,
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let prev = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "active connection counter underflow");
    }
}

/// Accepts only while a connection slot is free. At the limit, pending
/// peers wait in the listen backlog until a handler finishes.
fn run_accept_loop(listener: TcpListener, runtime: ServerRuntime) {
    while let Some(guard) = acquire_slot(&runtime) {
        let Some((stream, remote)) = accept_next(&listener, &runtime) else {
            break;
        };
        let runtime = runtime.clone();
        thread::spawn(move || {
            if let Err(err) = handle_connection(stream, &runtime, guard) {
                tracing::warn!(%remote, "inbound connection error: {err}");
            }
        });
    }
    tracing::info!("accept loop stopped");
}

/// `None` once shutdown fires.
fn acquire_slot(runtime: &ServerRuntime) -> Option<ConnectionGuard> {
    let mut waiting = false;
    loop {
        if runtime.shutdown.is_triggered() {
            return None;
        }
        if let Some(guard) = ConnectionGuard::try_acquire(
            &runtime.active_connections,
            runtime.config.max_connections,
        ) {
            return Some(guard);
        }
        if !waiting {
            tracing::debug!(
                max = runtime.config.max_connections.get(),
                "connection limit reached; waiting for a free slot"
            );
            waiting = true;
        }
        if runtime.shutdown.sleep(runtime.config.accept_poll) {
            return None;
        }
    }
}

fn accept_next(listener: &TcpListener, runtime: &ServerRuntime) -> Option<(TcpStream, SocketAddr)> {
    loop {
        if runtime.shutdown.is_triggered() {
            return None;
        }
        match listener.accept() {
            Ok(accepted) => return Some(accepted),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => tracing::warn!("accept error: {err}"),
        }
        if runtime.shutdown.sleep(runtime.config.accept_poll) {
            return None;
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    runtime: &ServerRuntime,
    _guard: ConnectionGuard,
) -> Result<(), ConnectionError> {
    // Accepted sockets may inherit nonblocking mode from the listener.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(runtime.config.io_timeout))?;

    while let Some(envelope) = read_envelope(&mut stream, runtime.config.max_frame_bytes)? {
        let origin: PeerId = envelope.origin.clone();
        let outcome = runtime.engine.handle_envelope(envelope);
        tracing::trace!(origin = %origin, ?outcome, "handled envelope");
        if matches!(
            outcome,
            InboundOutcome::Shutdown { .. } | InboundOutcome::Dropped
        ) {
            break;
        }
    }
    Ok(())
}
