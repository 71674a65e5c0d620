//! Daemon module - the peer service.
//!
//! Provides:
//! - Framed CBOR envelopes over one-shot TCP connections
//! - Bounded retry with exponential backoff for outbound sends
//! - The peer engine (clock, acks, delivery gate, handshake)
//! - Randomized origination and coordinated shutdown

pub mod backoff;
pub mod engine;
pub mod frame;
pub mod origin;
pub mod proto;
pub mod run;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use backoff::{Backoff, RetryPolicy};
pub use engine::{
    BroadcastReport, CollectingSink, DeliverySink, EngineConfig, EngineStats, InboundOutcome,
    PeerEngine, Phase, StdoutSink,
};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, FrameError};
pub use origin::{
    DEFAULT_RATE, OriginConfig, Originator, default_vocabulary, poisson_delay,
    run_origination_loop,
};
pub use proto::{
    PROTOCOL_VERSION, ProtoDecodeError, ProtoEncodeError, WireError, decode_envelope,
    encode_envelope,
};
pub use run::{Node, NodeConfig};
pub use server::{
    ConnectionError, DEFAULT_MAX_CONNECTIONS, PeerServer, PeerServerHandle, ServerConfig,
    ServerError,
};
pub use shutdown::{ShutdownCoordinator, ShutdownReason, ShutdownSignal};
pub use transport::{
    AttemptError, Outbound, SendError, SendReport, TcpTransport, TransportConfig,
};
