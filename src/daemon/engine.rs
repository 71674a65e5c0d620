//! Peer engine: Lamport clock, ack protocol, delivery gate, handshake.
//!
//! All shared state (clock, queue, directory, phase) lives behind one mutex.
//! Each compound step ("advance clock, push, drain") runs inside a single
//! critical section. Network sends never happen under the lock; their
//! outcome is applied afterwards in a fresh critical section.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::core::{
    Delivered, DeliveryQueue, Envelope, LogicalClock, Payload, PeerDirectory, PeerId,
};

use super::shutdown::{ShutdownCoordinator, ShutdownReason, ShutdownSignal};
use super::transport::Outbound;

/// Where delivered application messages go.
pub trait DeliverySink: Send + Sync {
    /// Called in delivery order while the engine lock is held; keep it cheap.
    fn deliver(&self, message: &Delivered);
}

/// Prints `"{timestamp} {origin} {word}"`, one line per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DeliverySink for StdoutSink {
    fn deliver(&self, message: &Delivered) {
        println!("{} {} {}", message.timestamp, message.origin, message.word);
    }
}

/// Keeps every delivered message in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    delivered: Mutex<Vec<Delivered>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Delivered> {
        self.delivered
            .lock()
            .expect("collecting sink lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.delivered
            .lock()
            .expect("collecting sink lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeliverySink for CollectingSink {
    fn deliver(&self, message: &Delivered) {
        self.delivered
            .lock()
            .expect("collecting sink lock poisoned")
            .push(message.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Broadcasting `ready` until every configured peer is connected.
    Bootstrapping,
    /// Originating and relaying.
    Active,
    /// Terminal.
    ShuttingDown,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Bootstrapping => "bootstrapping",
            Phase::Active => "active",
            Phase::ShuttingDown => "shutting_down",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub identity: PeerId,
    pub peers: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub clock: u64,
    pub phase: Phase,
    pub queued: usize,
    pub configured: BTreeSet<PeerId>,
    pub connected: BTreeSet<PeerId>,
    pub removed: BTreeSet<PeerId>,
    pub delivered: u64,
    pub acks_sent: u64,
}

/// What the engine did with one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Clock advanced to `clock` and the entry was queued. `ack` is the stamp
    /// of the acknowledgment sent back, if any.
    Queued { clock: u64, ack: Option<u64> },
    Ready { newly_connected: bool },
    Shutdown { initiated: bool },
    /// Arrived after shutdown.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendStatus {
    Sent,
    Removed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: Vec<PeerId>,
    pub removed: Vec<PeerId>,
    pub failed: Vec<PeerId>,
}

struct EngineState {
    clock: LogicalClock,
    queue: DeliveryQueue,
    directory: PeerDirectory,
    phase: Phase,
    delivered: u64,
    acks_sent: u64,
}

pub struct PeerEngine {
    identity: PeerId,
    state: Mutex<EngineState>,
    outbound: Arc<dyn Outbound>,
    sink: Arc<dyn DeliverySink>,
    shutdown: ShutdownCoordinator,
}

impl PeerEngine {
    pub fn new(
        config: EngineConfig,
        outbound: Arc<dyn Outbound>,
        sink: Arc<dyn DeliverySink>,
        signal: ShutdownSignal,
    ) -> Self {
        let identity = config.identity;
        let peers = config.peers.into_iter().filter(|peer| {
            if *peer == identity {
                tracing::warn!(peer = %peer, "ignoring own identity in peer list");
                false
            } else {
                true
            }
        });

        let mut state = EngineState {
            clock: LogicalClock::new(),
            queue: DeliveryQueue::new(),
            directory: PeerDirectory::new(peers),
            phase: Phase::Bootstrapping,
            delivered: 0,
            acks_sent: 0,
        };
        refresh_phase(&mut state);

        Self {
            identity,
            state: Mutex::new(state),
            outbound,
            sink,
            shutdown: ShutdownCoordinator::new(signal),
        }
    }

    pub fn identity(&self) -> &PeerId {
        &self.identity
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// True from the moment shutdown is initiated, before the broadcast ends.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_initiated()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        self.shutdown.signal()
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.lock();
        EngineStats {
            clock: state.clock.value(),
            phase: state.phase,
            queued: state.queue.len(),
            configured: state.directory.configured().clone(),
            connected: state.directory.connected().clone(),
            removed: state.directory.removed().clone(),
            delivered: state.delivered,
            acks_sent: state.acks_sent,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state lock poisoned")
    }

    /// Process one envelope read from an inbound connection.
    pub fn handle_envelope(&self, envelope: Envelope) -> InboundOutcome {
        if self.shutdown.signal().is_triggered() {
            tracing::debug!(origin = %envelope.origin, "dropping envelope after shutdown");
            return InboundOutcome::Dropped;
        }

        let Envelope {
            origin,
            payload,
            timestamp,
        } = envelope;

        match payload {
            Payload::Shutdown => {
                tracing::info!(origin = %origin, "shutdown received");
                let initiated = self.shutdown(ShutdownReason::Remote(origin));
                InboundOutcome::Shutdown { initiated }
            }
            Payload::Ready => {
                let mut state = self.lock();
                if state.phase == Phase::ShuttingDown {
                    return InboundOutcome::Dropped;
                }
                let newly_connected = state.directory.mark_ready(&origin);
                if newly_connected {
                    tracing::info!(peer = %origin, "peer ready");
                }
                refresh_phase(&mut state);
                InboundOutcome::Ready { newly_connected }
            }
            payload => {
                let (clock, ack) = {
                    let mut state = self.lock();
                    if state.phase == Phase::ShuttingDown {
                        return InboundOutcome::Dropped;
                    }
                    let clock = state.clock.advance_on_receive(timestamp);
                    let ack = if payload.is_ack() {
                        None
                    } else {
                        state.acks_sent += 1;
                        Some(Envelope::ack(self.identity.clone(), clock))
                    };
                    tracing::debug!(
                        origin = %origin,
                        kind = payload.kind().as_str(),
                        ts = timestamp,
                        clock,
                        "received"
                    );
                    state.queue.push(timestamp, origin.clone(), payload);
                    self.drain_locked(&mut state);
                    (clock, ack)
                };

                let ack_ts = ack.as_ref().map(|ack| ack.timestamp);
                if let Some(ack) = ack {
                    self.send_tracked(&origin, &ack);
                }
                InboundOutcome::Queued { clock, ack: ack_ts }
            }
        }
    }

    /// Originate an application message. Only allowed while active.
    ///
    /// The message is queued locally under the same critical section that
    /// stamps it, then broadcast to every configured peer.
    pub fn originate(&self, word: impl Into<String>) -> Option<(Envelope, BroadcastReport)> {
        let word = word.into();
        let envelope = {
            let mut state = self.lock();
            if state.phase != Phase::Active || self.shutdown.signal().is_triggered() {
                return None;
            }
            if state.clock.is_exhausted() {
                tracing::warn!("logical clock exhausted; not originating");
                return None;
            }
            let timestamp = state.clock.advance_on_send();
            state
                .queue
                .push(timestamp, self.identity.clone(), Payload::Word(word.clone()));
            self.drain_locked(&mut state);
            Envelope::word(self.identity.clone(), word, timestamp)
        };

        tracing::debug!(ts = envelope.timestamp, word = ?envelope.payload.as_word(), "originating");
        let report = self.broadcast(&envelope);
        Some((envelope, report))
    }

    /// Send `envelope` to every configured peer concurrently.
    pub fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let peers: Vec<PeerId> = self.lock().directory.configured().iter().cloned().collect();

        let statuses: Vec<(PeerId, SendStatus)> = thread::scope(|scope| {
            let handles: Vec<_> = peers
                .into_iter()
                .map(|peer| {
                    scope.spawn(move || {
                        let status = self.send_tracked(&peer, envelope);
                        (peer, status)
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok())
                .collect()
        });

        let mut report = BroadcastReport::default();
        for (peer, status) in statuses {
            match status {
                SendStatus::Sent => report.sent.push(peer),
                SendStatus::Removed => report.removed.push(peer),
                SendStatus::Failed => report.failed.push(peer),
            }
        }
        report
    }

    /// One handshake round: broadcast `ready` if still bootstrapping.
    pub fn bootstrap_round(&self) -> Phase {
        if self.phase() != Phase::Bootstrapping {
            return self.phase();
        }
        self.broadcast(&Envelope::ready(self.identity.clone()));
        self.phase()
    }

    /// Repeat handshake rounds every `interval` until active.
    ///
    /// Returns false if shutdown arrived first.
    pub fn run_bootstrap(&self, interval: Duration) -> bool {
        loop {
            match self.bootstrap_round() {
                Phase::Active => return true,
                Phase::ShuttingDown => return false,
                Phase::Bootstrapping => {}
            }
            if self.shutdown.signal().sleep(interval) {
                return false;
            }
        }
    }

    /// Propagate shutdown to the group and enter the terminal phase, once.
    ///
    /// A remote-initiated shutdown is not echoed back to its origin.
    pub fn shutdown(&self, reason: ShutdownReason) -> bool {
        let skip = match &reason {
            ShutdownReason::Remote(origin) => Some(origin.clone()),
            ShutdownReason::Local => None,
        };

        self.shutdown.initiate(&reason, || {
            let (envelope, peers) = {
                let mut state = self.lock();
                state.phase = Phase::ShuttingDown;
                let envelope = Envelope::shutdown(self.identity.clone(), state.clock.value());
                let peers: Vec<PeerId> = state
                    .directory
                    .configured()
                    .iter()
                    .filter(|peer| Some(*peer) != skip.as_ref())
                    .cloned()
                    .collect();
                (envelope, peers)
            };

            thread::scope(|scope| {
                for peer in &peers {
                    let envelope = &envelope;
                    scope.spawn(move || match self.outbound.send_once(peer, envelope) {
                        Ok(()) => tracing::info!(peer = %peer, "sent shutdown signal"),
                        Err(err) => {
                            tracing::warn!(peer = %peer, "failed to send shutdown signal: {err}")
                        }
                    });
                }
            });
        })
    }

    fn send_tracked(&self, peer: &PeerId, envelope: &Envelope) -> SendStatus {
        let result = self.outbound.send(peer, envelope);

        let mut state = self.lock();
        match result {
            Ok(_) => {
                if state.directory.mark_connected(peer) {
                    tracing::info!(peer = %peer, "peer connected");
                }
                refresh_phase(&mut state);
                SendStatus::Sent
            }
            Err(err) if err.is_exhausted() => {
                if state.directory.remove_peer(peer) {
                    tracing::warn!(
                        peer = %peer,
                        remaining = state.directory.configured().len(),
                        "removing unreachable peer: {err}"
                    );
                    // Coverage no longer waits on the removed peer.
                    self.drain_locked(&mut state);
                    refresh_phase(&mut state);
                    SendStatus::Removed
                } else {
                    SendStatus::Failed
                }
            }
            Err(err) => {
                tracing::debug!(peer = %peer, "send not completed: {err}");
                SendStatus::Failed
            }
        }
    }

    fn drain_locked(&self, state: &mut EngineState) {
        let delivered = state.queue.drain_ready(state.directory.configured());
        for message in &delivered {
            tracing::info!(
                ts = message.timestamp,
                origin = %message.origin,
                word = %message.word,
                "delivered"
            );
            self.sink.deliver(message);
        }
        state.delivered += delivered.len() as u64;
    }
}

fn refresh_phase(state: &mut EngineState) {
    if state.phase == Phase::Bootstrapping && state.directory.is_fully_connected() {
        state.phase = Phase::Active;
        tracing::info!(
            peers = state.directory.configured().len(),
            "all peers connected; active"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::daemon::transport::{AttemptError, SendError, SendReport};

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<(PeerId, Envelope)>>,
        once: Mutex<Vec<(PeerId, Envelope)>>,
        unreachable: Mutex<BTreeSet<PeerId>>,
        attempts: AtomicUsize,
    }

    impl RecordingOutbound {
        fn with_unreachable(peers: &[PeerId]) -> Self {
            let outbound = Self::default();
            outbound
                .unreachable
                .lock()
                .unwrap()
                .extend(peers.iter().cloned());
            outbound
        }

        fn sent(&self) -> Vec<(PeerId, Envelope)> {
            self.sent.lock().unwrap().clone()
        }

        fn sent_once(&self) -> Vec<(PeerId, Envelope)> {
            self.once.lock().unwrap().clone()
        }

        fn refused(peer: &PeerId, attempts: u32) -> SendError {
            SendError::Exhausted {
                peer: peer.clone(),
                attempts,
                last: AttemptError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            }
        }
    }

    impl Outbound for RecordingOutbound {
        fn send(&self, peer: &PeerId, envelope: &Envelope) -> Result<SendReport, SendError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.lock().unwrap().contains(peer) {
                return Err(Self::refused(peer, 10));
            }
            self.sent
                .lock()
                .unwrap()
                .push((peer.clone(), envelope.clone()));
            Ok(SendReport { attempts: 1 })
        }

        fn send_once(&self, peer: &PeerId, envelope: &Envelope) -> Result<(), SendError> {
            self.once
                .lock()
                .unwrap()
                .push((peer.clone(), envelope.clone()));
            if self.unreachable.lock().unwrap().contains(peer) {
                return Err(Self::refused(peer, 1));
            }
            Ok(())
        }
    }

    fn peer(name: &str) -> PeerId {
        PeerId::parse(name).unwrap()
    }

    struct Rig {
        engine: PeerEngine,
        outbound: Arc<RecordingOutbound>,
        sink: Arc<CollectingSink>,
    }

    fn rig(identity: &str, peers: &[&str], outbound: RecordingOutbound) -> Rig {
        let outbound = Arc::new(outbound);
        let sink = Arc::new(CollectingSink::new());
        let engine = PeerEngine::new(
            EngineConfig {
                identity: peer(identity),
                peers: peers.iter().map(|name| peer(name)).collect(),
            },
            outbound.clone(),
            sink.clone(),
            ShutdownSignal::new(),
        );
        Rig {
            engine,
            outbound,
            sink,
        }
    }

    fn activate(rig: &Rig) {
        assert_eq!(rig.engine.bootstrap_round(), Phase::Active);
        rig.outbound.sent.lock().unwrap().clear();
    }

    #[test]
    fn three_peer_scenario_from_b() {
        let rig = rig("b", &["a", "c"], RecordingOutbound::default());

        let outcome = rig.engine.handle_envelope(Envelope::word(peer("a"), "X", 5));
        assert_eq!(
            outcome,
            InboundOutcome::Queued {
                clock: 6,
                ack: Some(6)
            }
        );
        assert_eq!(rig.outbound.sent(), vec![(peer("a"), Envelope::ack(peer("b"), 6))]);
        assert!(rig.sink.is_empty());

        rig.engine.handle_envelope(Envelope::word(peer("c"), "Y", 2));
        let delivered: Vec<(u64, String)> = rig
            .sink
            .snapshot()
            .into_iter()
            .map(|d| (d.timestamp, d.word))
            .collect();
        assert_eq!(delivered, vec![(2, "Y".to_string()), (5, "X".to_string())]);
        assert_eq!(rig.engine.stats().clock, 7);
        assert_eq!(rig.engine.stats().queued, 0);
    }

    #[test]
    fn every_word_gets_exactly_one_later_ack() {
        let rig = rig("b", &["a", "c"], RecordingOutbound::default());
        let inbound = [
            Envelope::word(peer("a"), "Porto", 3),
            Envelope::ack(peer("c"), 9),
            Envelope::word(peer("c"), "Viseu", 4),
            Envelope::ack(peer("a"), 1),
            Envelope::word(peer("a"), "Faro", 30),
        ];
        for envelope in inbound.iter().cloned() {
            rig.engine.handle_envelope(envelope);
        }

        let acks = rig.outbound.sent();
        let words: Vec<&Envelope> = inbound
            .iter()
            .filter(|e| !e.payload.is_ack())
            .collect();
        assert_eq!(acks.len(), words.len());
        for ((to, ack), word) in acks.iter().zip(words) {
            assert_eq!(to, &word.origin);
            assert_eq!(ack.payload, Payload::Ack);
            assert_eq!(ack.origin, peer("b"));
            assert!(ack.timestamp > word.timestamp);
        }
        assert_eq!(rig.engine.stats().acks_sent, 3);
    }

    #[test]
    fn nothing_delivered_without_coverage() {
        let rig = rig("a", &["b", "c", "d"], RecordingOutbound::default());
        for ts in 1..=5 {
            rig.engine
                .handle_envelope(Envelope::word(peer("b"), format!("w{ts}"), ts));
            rig.engine.handle_envelope(Envelope::ack(peer("c"), ts));
        }
        assert!(rig.sink.is_empty());
        assert_eq!(rig.engine.stats().queued, 10);

        rig.engine.handle_envelope(Envelope::ack(peer("d"), 1));
        let stamps: Vec<u64> = rig.sink.snapshot().iter().map(|d| d.timestamp).collect();
        assert!(!stamps.is_empty());
        assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(rig.sink.snapshot().iter().all(|d| d.word.starts_with('w')));
    }

    #[test]
    fn ready_marks_peer_without_touching_clock() {
        let rig = rig("a", &["b", "c"], RecordingOutbound::default());
        assert_eq!(rig.engine.phase(), Phase::Bootstrapping);

        assert_eq!(
            rig.engine.handle_envelope(Envelope::ready(peer("b"))),
            InboundOutcome::Ready {
                newly_connected: true
            }
        );
        assert_eq!(rig.engine.phase(), Phase::Bootstrapping);
        rig.engine.handle_envelope(Envelope::ready(peer("c")));

        let stats = rig.engine.stats();
        assert_eq!(stats.phase, Phase::Active);
        assert_eq!(stats.clock, 0);
        assert_eq!(stats.queued, 0);
        assert!(rig.outbound.sent().is_empty());
    }

    #[test]
    fn originate_requires_active_phase() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        assert!(rig.engine.originate("Lisboa").is_none());
        assert_eq!(rig.engine.stats().clock, 0);

        activate(&rig);
        let (envelope, report) = rig.engine.originate("Lisboa").unwrap();
        assert_eq!(envelope, Envelope::word(peer("a"), "Lisboa", 1));
        assert_eq!(report.sent, vec![peer("b")]);
        assert_eq!(rig.outbound.sent(), vec![(peer("b"), envelope)]);
    }

    #[test]
    fn originated_stamps_are_unique_and_increasing() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        activate(&rig);

        let mut stamps = Vec::new();
        for i in 0..20 {
            if i % 4 == 0 {
                rig.engine
                    .handle_envelope(Envelope::word(peer("b"), "x", (i * 3) as u64));
            }
            let (envelope, _) = rig.engine.originate("y").unwrap();
            stamps.push(envelope.timestamp);
        }
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn own_messages_are_delivered_locally() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        activate(&rig);

        rig.engine.originate("Sintra");
        assert!(rig.sink.is_empty());

        rig.engine.handle_envelope(Envelope::ack(peer("b"), 2));
        let delivered = rig.sink.snapshot();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].origin, peer("a"));
        assert_eq!(delivered[0].word, "Sintra");
    }

    #[test]
    fn unreachable_peer_is_removed_and_stops_blocking_delivery() {
        let rig = rig(
            "a",
            &["b", "d"],
            RecordingOutbound::with_unreachable(&[peer("d")]),
        );

        rig.engine.handle_envelope(Envelope::word(peer("b"), "Guarda", 4));
        assert!(rig.sink.is_empty());

        let phase = rig.engine.bootstrap_round();
        assert_eq!(phase, Phase::Active);

        let stats = rig.engine.stats();
        assert!(!stats.configured.contains(&peer("d")));
        assert!(!stats.connected.contains(&peer("d")));
        assert!(stats.removed.contains(&peer("d")));
        assert_eq!(rig.sink.snapshot()[0].word, "Guarda");
    }

    #[test]
    fn own_identity_is_not_a_peer() {
        let rig = rig("a", &["a", "b"], RecordingOutbound::default());
        let stats = rig.engine.stats();
        assert_eq!(stats.configured, BTreeSet::from([peer("b")]));
    }

    #[test]
    fn lone_peer_starts_active() {
        let rig = rig("a", &[], RecordingOutbound::default());
        assert_eq!(rig.engine.phase(), Phase::Active);
        assert!(rig.engine.run_bootstrap(Duration::from_millis(1)));
        rig.engine.originate("Peniche");
        assert_eq!(rig.sink.len(), 1);
    }

    #[test]
    fn shutdown_broadcasts_once() {
        let rig = rig("a", &["b", "c"], RecordingOutbound::default());
        rig.engine.handle_envelope(Envelope::word(peer("b"), "x", 4));

        assert!(rig.engine.shutdown(ShutdownReason::Local));
        assert!(!rig.engine.shutdown(ShutdownReason::Local));
        assert_eq!(
            rig.engine
                .handle_envelope(Envelope::shutdown(peer("c"), 9)),
            InboundOutcome::Dropped
        );

        let mut sent = rig.outbound.sent_once();
        sent.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            sent,
            vec![
                (peer("b"), Envelope::shutdown(peer("a"), 5)),
                (peer("c"), Envelope::shutdown(peer("a"), 5)),
            ]
        );
        assert_eq!(rig.engine.phase(), Phase::ShuttingDown);
        assert!(rig.engine.is_shutting_down());
        assert!(rig.engine.shutdown_signal().is_triggered());
    }

    #[test]
    fn not_shutting_down_until_initiated() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        assert!(!rig.engine.is_shutting_down());
        rig.engine.handle_envelope(Envelope::shutdown(peer("b"), 0));
        assert!(rig.engine.is_shutting_down());
    }

    #[test]
    fn exhausted_clock_stops_origination() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        activate(&rig);

        rig.engine
            .handle_envelope(Envelope::ack(peer("b"), u64::MAX - 1));
        assert_eq!(rig.engine.stats().clock, u64::MAX);

        assert!(rig.engine.originate("Vinhais").is_none());
        assert!(rig.outbound.sent().is_empty());
        assert_eq!(rig.engine.stats().queued, 0);
    }

    #[test]
    fn remote_shutdown_is_propagated_to_everyone_else() {
        let rig = rig("a", &["b", "c"], RecordingOutbound::default());

        let outcome = rig.engine.handle_envelope(Envelope::shutdown(peer("b"), 3));
        assert_eq!(outcome, InboundOutcome::Shutdown { initiated: true });

        let sent = rig.outbound.sent_once();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, peer("c"));
        assert!(sent[0].1.payload.is_shutdown());
    }

    #[test]
    fn work_after_shutdown_is_dropped() {
        let rig = rig("a", &["b"], RecordingOutbound::default());
        activate(&rig);
        rig.engine.shutdown(ShutdownReason::Local);

        assert_eq!(
            rig.engine.handle_envelope(Envelope::word(peer("b"), "late", 1)),
            InboundOutcome::Dropped
        );
        assert!(rig.engine.originate("late").is_none());
        assert!(!rig.engine.run_bootstrap(Duration::from_millis(1)));
        assert_eq!(rig.engine.stats().clock, 0);
    }

    #[test]
    fn concurrent_receives_never_lose_an_update() {
        let rig = rig("a", &["b", "c", "d"], RecordingOutbound::default());
        let engine = &rig.engine;

        thread::scope(|scope| {
            for origin in ["b", "c", "d", "b"] {
                scope.spawn(move || {
                    for _ in 0..100 {
                        engine.handle_envelope(Envelope::ack(peer(origin), 0));
                    }
                });
            }
        });

        // Every receive of stamp 0 is exactly one tick.
        assert_eq!(rig.engine.stats().clock, 400);
        assert_eq!(rig.outbound.attempts.load(Ordering::SeqCst), 0);
    }
}
