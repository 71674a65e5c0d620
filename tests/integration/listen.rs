use std::sync::Arc;

use tomcast::daemon::{CollectingSink, Node, NodeConfig, Phase};

use crate::fixtures::{WAIT, dead_peer, fast_config, wait_until};

fn start_bound(config: &tomcast::config::Config) -> (Node, Arc<CollectingSink>) {
    let node_config = NodeConfig::from_config(config).expect("node config");
    let sink = Arc::new(CollectingSink::new());
    let node = Node::start(node_config, sink.clone()).expect("start node");
    (node, sink)
}

#[test]
fn node_listens_on_its_identity_by_default() {
    let identity = dead_peer();
    let config = fast_config(&identity, &[], 21);
    assert!(config.node.listen_addr.is_none());

    let (node, _sink) = start_bound(&config);
    assert_eq!(node.local_addr().to_string(), identity.to_string());

    node.shutdown();
    node.wait();
}

#[test]
fn peers_reach_each_other_without_listen_addr() {
    let a = dead_peer();
    let b = dead_peer();
    let patient = |identity: &tomcast::PeerId, peer: &tomcast::PeerId, seed| {
        let mut config = fast_config(identity, std::slice::from_ref(peer), seed);
        config.retry.max_attempts = 50;
        config
    };
    let (node_a, sink_a) = start_bound(&patient(&a, &b, 22));
    let (node_b, sink_b) = start_bound(&patient(&b, &a, 23));

    assert!(wait_until(WAIT, || {
        node_a.engine().phase() == Phase::Active && node_b.engine().phase() == Phase::Active
    }));
    assert!(wait_until(WAIT, || sink_a.len() >= 3 && sink_b.len() >= 3));

    node_a.shutdown();
    assert!(wait_until(WAIT, || node_b.is_shutting_down()));
    node_a.wait();
    node_b.wait();
}
