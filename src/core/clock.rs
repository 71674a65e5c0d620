//! Lamport logical clock.
//!
//! A single scalar counter. Callers serialize access (the engine keeps the
//! clock behind its state lock), so the clock itself takes `&mut self`.

/// Lamport clock.
///
/// Guarantees:
/// - The value never decreases
/// - Every value returned by an advance is strictly greater than the value
///   before the call, until the clock reaches `u64::MAX`
///
/// At `u64::MAX` the clock saturates and further advances repeat the same
/// value. Check [`LogicalClock::is_exhausted`] before stamping a message
/// that must be unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalClock {
    value: u64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known value.
    pub fn starting_at(value: u64) -> Self {
        Self { value }
    }

    /// Current value without advancing.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// No strictly greater stamp can be issued anymore.
    pub fn is_exhausted(&self) -> bool {
        self.value == u64::MAX
    }

    /// Advance for a locally originated message and return the stamp it carries.
    pub fn advance_on_send(&mut self) -> u64 {
        self.value = self.value.saturating_add(1);
        self.value
    }

    /// Merge a received timestamp: `max(local, remote) + 1`.
    pub fn advance_on_receive(&mut self, remote: u64) -> u64 {
        self.value = self.value.max(remote).saturating_add(1);
        self.value
    }
}
