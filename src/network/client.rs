//! The seams between the gossip manager and whatever carries its RPCs.

use crate::error::ChainError;
use crate::network::protocol::{Ack, Version};
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::sync::Arc;

/// An established connection to one remote node, able to issue the two node RPCs.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Address this client was dialed at.
    fn remote_addr(&self) -> &str;

    async fn handshake(&self, version: Version) -> Result<Version, ChainError>;

    async fn handle_transaction(&self, tx: Transaction) -> Result<Ack, ChainError>;
}

/// Opens connections to other nodes.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>, ChainError>;
}
