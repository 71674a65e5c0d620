#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tomcast::config::Config;
use tomcast::daemon::{CollectingSink, EngineStats, Node, NodeConfig};
use tomcast::{Delivered, PeerId};

pub const WAIT: Duration = Duration::from_secs(10);

/// Bind an ephemeral loopback port and derive the identity peers will use.
pub fn reserve_listener() -> (TcpListener, PeerId) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    (listener, PeerId::from_socket_addr(addr))
}

/// An address nothing listens on.
pub fn dead_peer() -> PeerId {
    let (listener, peer) = reserve_listener();
    drop(listener);
    peer
}

/// Config tuned for tests: short retries, fast handshake, frequent origination.
pub fn fast_config(identity: &PeerId, peers: &[PeerId], seed: u64) -> Config {
    let mut config = Config::default();
    config.node.identity = Some(identity.to_string());
    config.node.peers = peers.iter().map(|p| p.to_string()).collect();
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config.retry.connect_timeout_ms = 500;
    config.retry.io_timeout_ms = 500;
    config.engine.rate = 40.0;
    config.engine.handshake_interval_ms = 20;
    config.engine.accept_poll_ms = 5;
    config.engine.seed = Some(seed);
    config
}

pub struct TestNode {
    pub identity: PeerId,
    pub node: Node,
    pub sink: Arc<CollectingSink>,
}

impl TestNode {
    pub fn start(listener: TcpListener, config: &Config) -> Self {
        let node_config = NodeConfig::from_config(config).expect("node config");
        let identity = node_config.identity.clone();
        let sink = Arc::new(CollectingSink::new());
        let node = Node::start_with_listener(node_config, listener, sink.clone())
            .expect("start node");
        Self {
            identity,
            node,
            sink,
        }
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.sink.snapshot()
    }

    pub fn delivered_from(&self, origin: &PeerId) -> usize {
        self.delivered()
            .iter()
            .filter(|message| &message.origin == origin)
            .count()
    }
}

pub struct Cluster {
    pub nodes: Vec<TestNode>,
}

impl Cluster {
    /// Start `size` fully meshed nodes, each also configured with `extra_peers`.
    pub fn start(size: usize, extra_peers: &[PeerId]) -> Self {
        let reserved: Vec<(TcpListener, PeerId)> = (0..size).map(|_| reserve_listener()).collect();
        let identities: Vec<PeerId> = reserved.iter().map(|(_, id)| id.clone()).collect();

        let nodes = reserved
            .into_iter()
            .enumerate()
            .map(|(idx, (listener, identity))| {
                let mut peers: Vec<PeerId> = identities
                    .iter()
                    .filter(|peer| **peer != identity)
                    .cloned()
                    .collect();
                peers.extend(extra_peers.iter().cloned());
                let config = fast_config(&identity, &peers, 1000 + idx as u64);
                TestNode::start(listener, &config)
            })
            .collect();
        Self { nodes }
    }

    pub fn identities(&self) -> Vec<PeerId> {
        self.nodes.iter().map(|n| n.identity.clone()).collect()
    }

    /// Shut the first node down, let the signal propagate, and join everyone.
    pub fn shutdown(self) -> Vec<EngineStats> {
        if let Some(first) = self.nodes.first() {
            first.node.shutdown();
        }
        let propagated = wait_until(WAIT, || {
            self.nodes.iter().all(|n| n.node.is_shutting_down())
        });
        if !propagated {
            for node in &self.nodes {
                node.node.shutdown();
            }
        }
        self.nodes.into_iter().map(|n| n.node.wait()).collect()
    }
}

pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}
