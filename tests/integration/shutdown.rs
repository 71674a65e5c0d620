use std::thread;
use std::time::Duration;

use tomcast::daemon::Phase;

use crate::fixtures::{
    Cluster, TestNode, WAIT, dead_peer, fast_config, reserve_listener, wait_until,
};

#[test]
fn one_shutdown_stops_the_whole_group() {
    let cluster = Cluster::start(3, &[]);
    assert!(wait_until(WAIT, || {
        cluster
            .nodes
            .iter()
            .all(|n| n.node.engine().phase() == Phase::Active)
    }));

    assert!(cluster.nodes[0].node.shutdown());
    assert!(!cluster.nodes[0].node.shutdown());

    assert!(wait_until(WAIT, || {
        cluster.nodes.iter().all(|n| n.node.is_shutting_down())
    }));

    let stats = cluster.shutdown();
    assert!(stats.iter().all(|s| s.phase == Phase::ShuttingDown));
}

#[test]
fn shutdown_during_handshake() {
    let dead = dead_peer();
    let (listener, identity) = reserve_listener();
    let mut config = fast_config(&identity, &[dead], 3);
    config.retry.max_attempts = 50;
    config.retry.base_delay_ms = 200;
    config.retry.max_delay_ms = 200;

    let node = TestNode::start(listener, &config);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(node.node.engine().phase(), Phase::Bootstrapping);

    assert!(node.node.shutdown());
    let stats = node.node.wait();
    assert_eq!(stats.phase, Phase::ShuttingDown);
    assert_eq!(stats.delivered, 0);
}
