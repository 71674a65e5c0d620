//! Configured and connected peer sets.

use std::collections::BTreeSet;

use super::envelope::PeerId;

/// Membership view of the group.
///
/// Invariant: `connected ⊆ configured`. Removal is permanent; a removed peer
/// is never re-added, even if it later shows up again.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    configured: BTreeSet<PeerId>,
    connected: BTreeSet<PeerId>,
    removed: BTreeSet<PeerId>,
}

impl PeerDirectory {
    pub fn new(configured: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            configured: configured.into_iter().collect(),
            connected: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    pub fn configured(&self) -> &BTreeSet<PeerId> {
        &self.configured
    }

    pub fn connected(&self) -> &BTreeSet<PeerId> {
        &self.connected
    }

    pub fn removed(&self) -> &BTreeSet<PeerId> {
        &self.removed
    }

    pub fn is_configured(&self, peer: &PeerId) -> bool {
        self.configured.contains(peer)
    }

    /// Record a successful contact. Returns true if the peer was newly connected.
    ///
    /// Peers outside `configured` are ignored.
    pub fn mark_connected(&mut self, peer: &PeerId) -> bool {
        if !self.configured.contains(peer) {
            return false;
        }
        self.connected.insert(peer.clone())
    }

    /// Handshake completion (`ready` received from `peer`).
    pub fn mark_ready(&mut self, peer: &PeerId) -> bool {
        self.mark_connected(peer)
    }

    /// `connected ⊇ configured`.
    pub fn is_fully_connected(&self) -> bool {
        self.configured.is_subset(&self.connected)
    }

    /// Drop `peer` from both sets. Returns true if it was configured.
    pub fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.connected.remove(peer);
        if self.configured.remove(peer) {
            self.removed.insert(peer.clone());
            true
        } else {
            false
        }
    }
}
