//! In-process transport: nodes registered on a `LocalNetwork` call each other
//! directly, without sockets. Used for simulations and tests.

use crate::error::ChainError;
use crate::network::client::{Dialer, PeerClient};
use crate::network::node::NetworkNode;
use crate::network::protocol::{Ack, Version};
use crate::transaction::Transaction;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Registry of reachable nodes keyed by listen address.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    nodes: Arc<RwLock<HashMap<String, Weak<NetworkNode>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node: &Arc<NetworkNode>) {
        self.nodes
            .write()
            .insert(node.listen_addr().to_string(), Arc::downgrade(node));
    }

    /// Makes `addr` unreachable. Existing clients start failing on their next call.
    pub fn unregister(&self, addr: &str) {
        self.nodes.write().remove(addr);
    }

    pub fn dialer(&self, local_addr: impl Into<String>) -> Arc<dyn Dialer> {
        Arc::new(LocalDialer {
            network: self.clone(),
            local_addr: local_addr.into(),
        })
    }

    fn lookup(&self, addr: &str) -> Result<Arc<NetworkNode>, ChainError> {
        self.nodes
            .read()
            .get(addr)
            .and_then(Weak::upgrade)
            .ok_or_else(|| ChainError::NetworkError(format!("Connection refused: {}", addr)))
    }
}

struct LocalDialer {
    network: LocalNetwork,
    local_addr: String,
}

#[async_trait]
impl Dialer for LocalDialer {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>, ChainError> {
        self.network.lookup(addr)?;
        Ok(Arc::new(LocalClient {
            network: self.network.clone(),
            remote_addr: addr.to_string(),
            from: self.local_addr.clone(),
        }))
    }
}

struct LocalClient {
    network: LocalNetwork,
    remote_addr: String,
    from: String,
}

#[async_trait]
impl PeerClient for LocalClient {
    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    async fn handshake(&self, version: Version) -> Result<Version, ChainError> {
        let target = self.network.lookup(&self.remote_addr)?;
        target.handshake(version).await
    }

    async fn handle_transaction(&self, tx: Transaction) -> Result<Ack, ChainError> {
        let target = self.network.lookup(&self.remote_addr)?;
        target.handle_transaction(tx, Some(&self.from))
    }
}
