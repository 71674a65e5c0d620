//! Coordinated shutdown.
//!
//! [`ShutdownSignal`] is the terminal flag every long-running loop polls. It
//! also doubles as an interruptible sleep: waiters park on a channel whose
//! only sender is dropped when the signal fires.
//!
//! [`ShutdownCoordinator`] is the one-shot guard in front of it. Operator
//! interrupts and received `shutdown` envelopes both go through
//! [`ShutdownCoordinator::initiate`]; only the first caller runs the
//! broadcast.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::core::PeerId;

#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    triggered: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            inner: Arc::new(SignalInner {
                triggered: AtomicBool::new(false),
                wake_tx: Mutex::new(Some(wake_tx)),
                wake_rx,
            }),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Fire the signal and wake every sleeper. Returns true on the first call.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner
            .wake_tx
            .lock()
            .expect("shutdown signal lock poisoned")
            .take();
        true
    }

    /// Sleep for `duration` or until the signal fires. Returns true if it fired.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.inner.wake_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

/// Why shutdown was initiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT/SIGTERM or an explicit local call.
    Local,
    /// A `shutdown` envelope from this peer.
    Remote(PeerId),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Local => f.write_str("local request"),
            ShutdownReason::Remote(peer) => write!(f, "shutdown from {peer}"),
        }
    }
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    initiated: AtomicBool,
    signal: ShutdownSignal,
}

impl ShutdownCoordinator {
    pub fn new(signal: ShutdownSignal) -> Self {
        Self {
            initiated: AtomicBool::new(false),
            signal,
        }
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    /// Run `broadcast` and then fire the terminal signal, at most once.
    ///
    /// Returns true if this call performed the shutdown.
    pub fn initiate<F>(&self, reason: &ShutdownReason, broadcast: F) -> bool
    where
        F: FnOnce(),
    {
        if self.initiated.swap(true, Ordering::AcqRel) {
            tracing::debug!("shutdown already in progress; ignoring {reason}");
            return false;
        }
        tracing::info!("shutting down: {reason}");
        broadcast();
        self.signal.trigger();
        true
    }
}
