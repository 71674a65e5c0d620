//! Delivery queue: a timestamp-ordered min-heap gated by peer coverage.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use super::envelope::{Payload, PeerId};

/// A queued message. Equal timestamps keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryQueueEntry {
    pub timestamp: u64,
    pub origin: PeerId,
    pub payload: Payload,
    seq: u64,
}

impl Ord for DeliveryQueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for DeliveryQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An application message handed to the delivery sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub timestamp: u64,
    pub origin: PeerId,
    pub word: String,
}

#[derive(Debug, Default)]
pub struct DeliveryQueue {
    heap: BinaryHeap<Reverse<DeliveryQueueEntry>>,
    origins: BTreeMap<PeerId, usize>,
    next_seq: u64,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, timestamp: u64, origin: PeerId, payload: Payload) {
        *self.origins.entry(origin.clone()).or_default() += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(DeliveryQueueEntry {
            timestamp,
            origin,
            payload,
            seq,
        }));
    }

    pub fn peek_min(&self) -> Option<&DeliveryQueueEntry> {
        self.heap.peek().map(|Reverse(entry)| entry)
    }

    pub fn pop_min(&mut self) -> Option<DeliveryQueueEntry> {
        let Reverse(entry) = self.heap.pop()?;
        if let Some(count) = self.origins.get_mut(&entry.origin) {
            *count -= 1;
            if *count == 0 {
                self.origins.remove(&entry.origin);
            }
        }
        Some(entry)
    }

    /// Distinct origins with at least one queued entry.
    pub fn origins_present(&self) -> BTreeSet<PeerId> {
        self.origins.keys().cloned().collect()
    }

    /// Coverage condition: every configured peer has a queued entry.
    pub fn covers(&self, configured: &BTreeSet<PeerId>) -> bool {
        configured.iter().all(|peer| self.origins.contains_key(peer))
    }

    /// Pop entries in timestamp order while coverage holds.
    ///
    /// Coverage is re-checked before every pop, so draining stops as soon as
    /// some configured peer no longer has an entry queued. Acks are consumed
    /// but never returned.
    pub fn drain_ready(&mut self, configured: &BTreeSet<PeerId>) -> Vec<Delivered> {
        let mut delivered = Vec::new();
        while !self.is_empty() && self.covers(configured) {
            let Some(entry) = self.pop_min() else {
                break;
            };
            if let Payload::Word(word) = entry.payload {
                delivered.push(Delivered {
                    timestamp: entry.timestamp,
                    origin: entry.origin,
                    word,
                });
            }
        }
        delivered
    }
}
