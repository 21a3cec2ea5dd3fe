//! Peer table: connected peers and the dials currently in flight.

use crate::network::client::PeerClient;
use crate::network::protocol::Version;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Opaque handle for one registered connection.
pub type PeerId = u64;

/// How many dropped addresses are remembered as `Disconnected`.
pub const MAX_DISCONNECTED: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unconnected,
    Connecting,
    Handshaking,
    Connected,
    Disconnected,
}

/// Why a bootstrap candidate was or was not dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialDecision {
    Proceed,
    OwnAddress,
    AlreadyConnected,
    InProgress,
}

#[derive(Clone)]
pub struct Peer {
    pub id: PeerId,
    pub client: Arc<dyn PeerClient>,
    pub version: Version,
}

impl Peer {
    pub fn listen_addr(&self) -> &str {
        &self.version.listen_addr
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("remote", &self.client.remote_addr())
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    peers: HashMap<PeerId, Peer>,
    dialing: HashMap<String, PeerState>,
    /// Oldest first, capped at `MAX_DISCONNECTED`.
    disconnected: VecDeque<String>,
    next_id: PeerId,
}

impl Inner {
    fn find_by_addr(&self, addr: &str) -> Option<&Peer> {
        self.peers.values().find(|p| p.version.listen_addr == addr)
    }

    fn forget_disconnected(&mut self, addr: &str) {
        self.disconnected.retain(|a| a != addr);
    }

    fn note_disconnected(&mut self, addr: String) {
        self.forget_disconnected(&addr);
        if self.disconnected.len() == MAX_DISCONNECTED {
            self.disconnected.pop_front();
        }
        self.disconnected.push_back(addr);
    }
}

/// Every read and write goes through one `RwLock`; no guard escapes a method,
/// so callers never hold it across network I/O.
pub struct PeerTable {
    local_addr: String,
    inner: RwLock<Inner>,
}

impl PeerTable {
    pub fn new(local_addr: impl Into<String>) -> Self {
        PeerTable {
            local_addr: local_addr.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Claims `addr` for an outbound dial unless it is ours, connected, or already being dialed.
    pub fn begin_dial(&self, addr: &str) -> DialDecision {
        if addr == self.local_addr {
            return DialDecision::OwnAddress;
        }

        let mut inner = self.inner.write();
        if inner.find_by_addr(addr).is_some() {
            return DialDecision::AlreadyConnected;
        }
        if inner.dialing.contains_key(addr) {
            return DialDecision::InProgress;
        }
        inner.forget_disconnected(addr);
        inner.dialing.insert(addr.to_string(), PeerState::Connecting);
        DialDecision::Proceed
    }

    pub fn mark_handshaking(&self, addr: &str) {
        if let Some(state) = self.inner.write().dialing.get_mut(addr) {
            *state = PeerState::Handshaking;
        }
    }

    /// Releases a dial claim after a failed attempt.
    pub fn abort_dial(&self, addr: &str) {
        self.inner.write().dialing.remove(addr);
    }

    /// Records a completed handshake. A second registration for the same
    /// listen address keeps the peer id but replaces both the connection and
    /// the stored version. Returns the peer id and whether the entry is new.
    pub fn register(&self, client: Arc<dyn PeerClient>, version: Version) -> (PeerId, bool) {
        let mut inner = self.inner.write();
        inner.dialing.remove(client.remote_addr());
        inner.dialing.remove(&version.listen_addr);
        inner.forget_disconnected(&version.listen_addr);

        if let Some(existing) = inner
            .peers
            .values_mut()
            .find(|p| p.version.listen_addr == version.listen_addr)
        {
            existing.client = client;
            existing.version = version;
            return (existing.id, false);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.peers.insert(
            id,
            Peer {
                id,
                client,
                version,
            },
        );
        (id, true)
    }

    pub fn remove(&self, id: PeerId) -> Option<Peer> {
        let mut inner = self.inner.write();
        let peer = inner.peers.remove(&id)?;
        inner.note_disconnected(peer.version.listen_addr.clone());
        Some(peer)
    }

    pub fn find_by_addr(&self, addr: &str) -> Option<Peer> {
        self.inner.read().find_by_addr(addr).cloned()
    }

    /// Listen addresses of connected peers, in registration order.
    pub fn addresses(&self) -> Vec<String> {
        self.peers()
            .into_iter()
            .map(|p| p.version.listen_addr)
            .collect()
    }

    pub fn peers(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.inner.read().peers.values().cloned().collect();
        peers.sort_by_key(|p| p.id);
        peers
    }

    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, addr: &str) -> PeerState {
        let inner = self.inner.read();
        if inner.find_by_addr(addr).is_some() {
            PeerState::Connected
        } else if let Some(state) = inner.dialing.get(addr) {
            *state
        } else if inner.disconnected.iter().any(|a| a == addr) {
            PeerState::Disconnected
        } else {
            PeerState::Unconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;
    use crate::network::protocol::{Ack, PROTOCOL_VERSION};
    use crate::transaction::Transaction;
    use async_trait::async_trait;

    struct NullClient(String);

    #[async_trait]
    impl PeerClient for NullClient {
        fn remote_addr(&self) -> &str {
            &self.0
        }

        async fn handshake(&self, _version: Version) -> Result<Version, ChainError> {
            Err(ChainError::NetworkError("unreachable".to_string()))
        }

        async fn handle_transaction(&self, _tx: Transaction) -> Result<Ack, ChainError> {
            Err(ChainError::NetworkError("unreachable".to_string()))
        }
    }

    fn version(addr: &str) -> Version {
        Version {
            version: PROTOCOL_VERSION.to_string(),
            height: 0,
            listen_addr: addr.to_string(),
            peer_list: vec![],
        }
    }

    fn client(addr: &str) -> Arc<dyn PeerClient> {
        Arc::new(NullClient(addr.to_string()))
    }

    #[test]
    fn test_dial_lifecycle() {
        let table = PeerTable::new("a:1");
        assert_eq!(table.state("b:1"), PeerState::Unconnected);

        assert_eq!(table.begin_dial("a:1"), DialDecision::OwnAddress);
        assert_eq!(table.begin_dial("b:1"), DialDecision::Proceed);
        assert_eq!(table.state("b:1"), PeerState::Connecting);
        assert_eq!(table.begin_dial("b:1"), DialDecision::InProgress);

        table.mark_handshaking("b:1");
        assert_eq!(table.state("b:1"), PeerState::Handshaking);

        let (id, new) = table.register(client("b:1"), version("b:1"));
        assert!(new);
        assert_eq!(table.state("b:1"), PeerState::Connected);
        assert_eq!(table.begin_dial("b:1"), DialDecision::AlreadyConnected);

        assert!(table.remove(id).is_some());
        assert_eq!(table.state("b:1"), PeerState::Disconnected);
        assert!(table.is_empty());
    }

    #[test]
    fn test_abort_dial_releases_claim() {
        let table = PeerTable::new("a:1");
        assert_eq!(table.begin_dial("b:1"), DialDecision::Proceed);
        table.abort_dial("b:1");
        assert_eq!(table.state("b:1"), PeerState::Unconnected);
        assert_eq!(table.begin_dial("b:1"), DialDecision::Proceed);
    }

    #[test]
    fn test_register_same_address_once() {
        let table = PeerTable::new("a:1");
        let (first, new) = table.register(client("b:1"), version("b:1"));
        assert!(new);

        let mut updated = version("b:1");
        updated.height = 9;
        let (second, new) = table.register(client("b:1"), updated);
        assert!(!new);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find_by_addr("b:1").unwrap().version.height, 9);
    }

    #[test]
    fn test_register_replaces_connection() {
        let table = PeerTable::new("a:1");
        table.register(client("b:1#old"), version("b:1"));
        table.register(client("b:1#new"), version("b:1"));

        let peer = table.find_by_addr("b:1").unwrap();
        assert_eq!(peer.client.remote_addr(), "b:1#new");
        assert_eq!(table.peers()[0].client.remote_addr(), "b:1#new");
    }

    #[test]
    fn test_disconnected_addresses_are_bounded() {
        let table = PeerTable::new("a:1");
        for n in 0..MAX_DISCONNECTED + 10 {
            let addr = format!("p{}:1", n);
            let (id, _) = table.register(client(&addr), version(&addr));
            table.remove(id);
        }

        assert_eq!(table.inner.read().disconnected.len(), MAX_DISCONNECTED);
        assert_eq!(table.state("p0:1"), PeerState::Unconnected);
        assert_eq!(table.state("p9:1"), PeerState::Unconnected);
        assert_eq!(table.state("p10:1"), PeerState::Disconnected);
        let last = format!("p{}:1", MAX_DISCONNECTED + 9);
        assert_eq!(table.state(&last), PeerState::Disconnected);

        // Re-dialing a remembered address forgets it.
        assert_eq!(table.begin_dial(&last), DialDecision::Proceed);
        assert_eq!(table.inner.read().disconnected.len(), MAX_DISCONNECTED - 1);
    }

    #[test]
    fn test_addresses_in_registration_order() {
        let table = PeerTable::new("a:1");
        table.register(client("c:1"), version("c:1"));
        table.register(client("b:1"), version("b:1"));
        assert_eq!(table.addresses(), vec!["c:1".to_string(), "b:1".to_string()]);
    }
}
