#![forbid(unsafe_code)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod daemon;
pub mod error;
mod paths;
pub mod telemetry;

pub use error::{Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::core::{
    DEFAULT_PORT, Delivered, DeliveryQueue, Envelope, LogicalClock, Payload, PayloadKind,
    PeerDirectory, PeerId,
};
pub use crate::daemon::{Node, NodeConfig, PeerEngine};
