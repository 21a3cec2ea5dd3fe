//! Peer-to-peer layer: wire messages, the peer table, the gossip manager and
//! the transports that carry its RPCs.

pub mod client;
pub mod local;
pub mod node;
pub mod peers;
pub mod protocol;
pub mod transport;

pub use client::{Dialer, PeerClient};
pub use local::LocalNetwork;
pub use node::{BootstrapReport, DialOutcome, NetworkConfig, NetworkNode};
pub use peers::{DialDecision, PeerId, PeerState, PeerTable};
pub use protocol::{Ack, GossipMessage, Request, Response, Version, PROTOCOL_VERSION};
pub use transport::{serve, TcpDialer};
