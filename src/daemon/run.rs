//! Node runner: wires engine, server and origination thread together.

use std::net::{SocketAddr, TcpListener};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::core::PeerId;

use super::backoff::RetryPolicy;
use super::engine::{DeliverySink, EngineConfig, EngineStats, PeerEngine};
use super::origin::{OriginConfig, Originator, run_origination_loop};
use super::server::{self, PeerServer, PeerServerHandle, ServerConfig, ServerError};
use super::shutdown::{ShutdownReason, ShutdownSignal};
use super::transport::{TcpTransport, TransportConfig};

const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Everything a node needs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub identity: PeerId,
    pub peers: Vec<PeerId>,
    /// Defaults to the identity, so the node listens where peers dial it.
    pub listen_addr: String,
    pub transport: TransportConfig,
    pub server: ServerConfig,
    pub origin: OriginConfig,
    pub handshake_interval: Duration,
}

impl NodeConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let default_port = config.node.default_port;
        let raw_identity = config
            .node
            .identity
            .as_deref()
            .ok_or(ConfigError::Missing("node.identity"))?;
        let identity = PeerId::parse_with_port(raw_identity, default_port).map_err(|source| {
            ConfigError::InvalidPeer {
                raw: raw_identity.to_string(),
                source,
            }
        })?;

        let peers = config
            .node
            .peers
            .iter()
            .map(|raw| {
                PeerId::parse_with_port(raw, default_port).map_err(|source| {
                    ConfigError::InvalidPeer {
                        raw: raw.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let retry = &config.retry;
        let io_timeout = Duration::from_millis(retry.io_timeout_ms);
        let transport = TransportConfig {
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                base: Duration::from_millis(retry.base_delay_ms),
                max: Duration::from_millis(retry.max_delay_ms),
            },
            connect_timeout: Duration::from_millis(retry.connect_timeout_ms),
            io_timeout,
            max_frame_bytes: config.engine.max_frame_bytes,
        };

        let max_connections =
            NonZeroUsize::new(config.engine.max_connections).ok_or(ConfigError::Invalid {
                field: "engine.max_connections",
                reason: "must be at least 1".into(),
            })?;
        let server = ServerConfig {
            max_connections,
            accept_poll: Duration::from_millis(config.engine.accept_poll_ms),
            io_timeout,
            max_frame_bytes: config.engine.max_frame_bytes,
        };

        Ok(Self {
            peers,
            listen_addr: config
                .node
                .listen_addr
                .clone()
                .unwrap_or_else(|| identity.to_string()),
            transport,
            server,
            origin: OriginConfig {
                rate: config.engine.rate,
                vocabulary: config.engine.vocabulary.clone(),
                seed: config.engine.seed,
            },
            handshake_interval: Duration::from_millis(config.engine.handshake_interval_ms),
            identity,
        })
    }
}

/// A running peer.
pub struct Node {
    engine: Arc<PeerEngine>,
    server: PeerServerHandle,
    origination: JoinHandle<u64>,
}

impl Node {
    pub fn start(config: NodeConfig, sink: Arc<dyn DeliverySink>) -> Result<Self, ServerError> {
        let listener = server::bind(&config.listen_addr)?;
        Self::start_with_listener(config, listener, sink)
    }

    /// Start on an already bound listener.
    pub fn start_with_listener(
        config: NodeConfig,
        listener: TcpListener,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self, ServerError> {
        let signal = ShutdownSignal::new();
        let outbound = Arc::new(TcpTransport::new(config.transport, signal.clone()));
        let engine = Arc::new(PeerEngine::new(
            EngineConfig {
                identity: config.identity,
                peers: config.peers,
            },
            outbound,
            sink,
            signal,
        ));

        let server = PeerServer::new(Arc::clone(&engine), config.server).start(listener)?;

        let originator = Originator::new(config.origin);
        let handshake_interval = config.handshake_interval;
        let spawned = {
            let engine = Arc::clone(&engine);
            thread::Builder::new()
                .name("origination".into())
                .spawn(move || run_origination_loop(&engine, originator, handshake_interval))
        };
        let origination = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                engine.shutdown_signal().trigger();
                server.join();
                return Err(ServerError::Io(err));
            }
        };

        tracing::info!(
            identity = %engine.identity(),
            peers = engine.stats().configured.len(),
            "node started"
        );

        Ok(Self {
            engine,
            server,
            origination,
        })
    }

    pub fn engine(&self) -> &Arc<PeerEngine> {
        &self.engine
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Operator-initiated shutdown. Returns false if already shutting down.
    pub fn shutdown(&self) -> bool {
        self.engine.shutdown(ShutdownReason::Local)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.engine.is_shutting_down()
    }

    /// Block until the node has shut down (locally or by a peer), then join
    /// the accept and origination threads.
    pub fn wait(self) -> EngineStats {
        let signal = self.engine.shutdown_signal().clone();
        while !signal.sleep(INTERRUPT_POLL) {}

        self.server.join();
        match self.origination.join() {
            Ok(originated) => tracing::debug!(originated, "origination thread joined"),
            Err(_) => tracing::error!("origination thread panicked"),
        }

        let stats = self.engine.stats();
        tracing::info!(
            clock = stats.clock,
            delivered = stats.delivered,
            acks_sent = stats.acks_sent,
            queued = stats.queued,
            removed = stats.removed.len(),
            "node stopped"
        );
        stats
    }

    /// Run until SIGINT/SIGTERM or a remote shutdown, then wait.
    pub fn run_until_interrupted(self) -> EngineStats {
        let interrupted = Arc::new(AtomicBool::new(false));
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&interrupted)) {
                tracing::warn!(signal, "failed to register signal handler: {err}");
            }
        }

        let shutdown = self.engine.shutdown_signal().clone();
        loop {
            if interrupted.load(Ordering::Relaxed) {
                tracing::info!("interrupt received");
                self.shutdown();
                break;
            }
            if shutdown.sleep(INTERRUPT_POLL) {
                break;
            }
        }
        self.wait()
    }
}
