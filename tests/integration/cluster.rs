use std::collections::BTreeSet;

use tomcast::daemon::{Phase, default_vocabulary};

use crate::fixtures::{Cluster, WAIT, wait_until};

#[test]
fn three_nodes_deliver_from_every_origin() {
    let cluster = Cluster::start(3, &[]);
    let identities = cluster.identities();

    let progressed = wait_until(WAIT, || {
        cluster.nodes.iter().all(|node| {
            identities
                .iter()
                .all(|origin| node.delivered_from(origin) >= 3)
        })
    });
    assert!(progressed, "every node delivers words from every origin");

    for node in &cluster.nodes {
        let stats = node.node.engine().stats();
        assert_eq!(stats.phase, Phase::Active);
        assert!(stats.removed.is_empty());
    }

    let snapshots: Vec<_> = cluster.nodes.iter().map(|n| n.delivered()).collect();
    let stats = cluster.shutdown();

    let vocabulary = default_vocabulary();
    for delivered in &snapshots {
        let mut seen = BTreeSet::new();
        for message in delivered {
            assert!(vocabulary.contains(&message.word), "{message:?}");
            assert!(
                seen.insert((message.origin.clone(), message.timestamp)),
                "delivered twice: {message:?}"
            );
        }
    }

    for stat in &stats {
        assert_eq!(stat.phase, Phase::ShuttingDown);
        assert!(stat.acks_sent > 0);
    }
}

#[test]
fn origin_timestamps_are_unique_across_the_group() {
    let cluster = Cluster::start(3, &[]);
    let identities = cluster.identities();
    assert!(wait_until(WAIT, || {
        cluster
            .nodes
            .iter()
            .all(|node| identities.iter().all(|o| node.delivered_from(o) >= 2))
    }));

    // A node's own deliveries carry stamps it produced with advance_on_send.
    for node in &cluster.nodes {
        let own: Vec<u64> = node
            .delivered()
            .iter()
            .filter(|m| m.origin == node.identity)
            .map(|m| m.timestamp)
            .collect();
        let unique: BTreeSet<u64> = own.iter().copied().collect();
        assert_eq!(unique.len(), own.len());
    }

    cluster.shutdown();
}
