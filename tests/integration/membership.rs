use tomcast::daemon::Phase;

use crate::fixtures::{Cluster, WAIT, dead_peer, wait_until};

#[test]
fn unreachable_peer_is_dropped_and_the_rest_make_progress() {
    let dead = dead_peer();
    let cluster = Cluster::start(2, std::slice::from_ref(&dead));
    let identities = cluster.identities();

    let removed = wait_until(WAIT, || {
        cluster.nodes.iter().all(|node| {
            let stats = node.node.engine().stats();
            stats.removed.contains(&dead) && stats.phase == Phase::Active
        })
    });
    assert!(removed, "dead peer removed on every node");

    for node in &cluster.nodes {
        let stats = node.node.engine().stats();
        assert!(!stats.configured.contains(&dead));
        assert!(!stats.connected.contains(&dead));
    }

    assert!(wait_until(WAIT, || {
        cluster
            .nodes
            .iter()
            .all(|node| identities.iter().all(|o| node.delivered_from(o) >= 2))
    }));

    let stats = cluster.shutdown();
    for stat in stats {
        assert!(stat.removed.contains(&dead));
    }
}
