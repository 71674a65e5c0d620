//! Protocol data types, free of I/O and locking.
//!
//! - clock: Lamport clock
//! - envelope: peer identity and wire envelope
//! - queue: timestamp-ordered delivery queue with coverage gate
//! - directory: configured/connected peer sets

pub mod clock;
pub mod directory;
pub mod envelope;
pub mod queue;

pub use clock::LogicalClock;
pub use directory::PeerDirectory;
pub use envelope::{DEFAULT_PORT, Envelope, Payload, PayloadKind, PeerId, PeerIdError};
pub use queue::{Delivered, DeliveryQueue, DeliveryQueueEntry};
