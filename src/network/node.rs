//! Peer and gossip manager.
//!
//! A `NetworkNode` owns the peer table, answers inbound handshakes, dials
//! bootstrap addresses and fans accepted transactions out to every peer.
//! All outbound calls go through a [`Dialer`] and are bounded by the RPC
//! timeout.

use crate::blockchain::Chain;
use crate::crypto::CanonicalHash;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::network::client::{Dialer, PeerClient};
use crate::network::peers::{DialDecision, PeerState, PeerTable};
use crate::network::protocol::{Ack, GossipMessage, Version, PROTOCOL_VERSION};
use crate::transaction::Transaction;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default bound on a single outbound RPC.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub version: String,
    pub listen_addr: String,
    pub rpc_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            version: PROTOCOL_VERSION.to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

/// Result of one bootstrap candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    Connected,
    Skipped(DialDecision),
    Failed(String),
}

/// Per-address outcomes of a bootstrap run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub outcomes: Vec<(String, DialOutcome)>,
}

impl BootstrapReport {
    pub fn outcome(&self, addr: &str) -> Option<&DialOutcome> {
        self.outcomes
            .iter()
            .find(|(a, _)| a == addr)
            .map(|(_, outcome)| outcome)
    }

    pub fn connected(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == DialOutcome::Connected)
            .map(|(a, _)| a.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DialOutcome::Failed(_)))
            .map(|(a, _)| a.as_str())
            .collect()
    }
}

pub struct NetworkNode {
    config: NetworkConfig,
    dialer: Arc<dyn Dialer>,
    peers: PeerTable,
    mempool: Arc<Mempool>,
    chain: Arc<Chain>,
}

impl NetworkNode {
    pub fn new(
        config: NetworkConfig,
        dialer: Arc<dyn Dialer>,
        mempool: Arc<Mempool>,
        chain: Arc<Chain>,
    ) -> Arc<Self> {
        Arc::new(NetworkNode {
            peers: PeerTable::new(config.listen_addr.clone()),
            config,
            dialer,
            mempool,
            chain,
        })
    }

    pub fn listen_addr(&self) -> &str {
        &self.config.listen_addr
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    /// Our own handshake record.
    pub fn version(&self) -> Version {
        Version {
            version: self.config.version.clone(),
            height: self.chain.height(),
            listen_addr: self.config.listen_addr.clone(),
            peer_list: self.peer_address_list(),
        }
    }

    pub fn peer_address_list(&self) -> Vec<String> {
        self.peers.addresses()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_state(&self, addr: &str) -> PeerState {
        self.peers.state(addr)
    }

    /// Answers an inbound handshake: dials the caller back, registers it and
    /// replies with our version. A caller that is already known gets the new
    /// connection in place of the old one, which may belong to a previous run
    /// of that node.
    pub async fn handshake(self: &Arc<Self>, incoming: Version) -> Result<Version, ChainError> {
        if incoming.listen_addr.is_empty() {
            return Err(ChainError::NetworkError(
                "Handshake without a listen address".to_string(),
            ));
        }
        if incoming.listen_addr == self.config.listen_addr {
            return Err(ChainError::NetworkError(format!(
                "Refusing handshake from our own address {}",
                incoming.listen_addr
            )));
        }
        if incoming.version != self.config.version {
            debug!(
                we = %self.config.listen_addr,
                remote = %incoming.listen_addr,
                "peer speaks {} (we speak {})",
                incoming.version,
                self.config.version
            );
        }

        let client = self
            .call("dial", self.dialer.dial(&incoming.listen_addr))
            .await?;
        self.add_peer(client, incoming);

        Ok(self.version())
    }

    /// Dials every address concurrently and waits for all of them.
    pub async fn bootstrap(self: &Arc<Self>, addrs: Vec<String>) -> BootstrapReport {
        let mut outcomes: Vec<Option<DialOutcome>> = vec![None; addrs.len()];
        let mut tasks = JoinSet::new();

        for (idx, addr) in addrs.iter().enumerate() {
            match self.peers.begin_dial(addr) {
                DialDecision::Proceed => {
                    let node = Arc::clone(self);
                    let addr = addr.clone();
                    tasks.spawn(async move {
                        let outcome = node.connect(&addr).await;
                        (idx, outcome)
                    });
                }
                skip => {
                    debug!(we = %self.config.listen_addr, remote = %addr, "skipping dial: {:?}", skip);
                    outcomes[idx] = Some(DialOutcome::Skipped(skip));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => warn!(we = %self.config.listen_addr, "dial task aborted: {}", e),
            }
        }

        // A task that panicked never released its claim.
        for (addr, outcome) in addrs.iter().zip(&outcomes) {
            if outcome.is_none() {
                self.peers.abort_dial(addr);
            }
        }

        BootstrapReport {
            outcomes: addrs
                .into_iter()
                .zip(outcomes)
                .map(|(addr, outcome)| {
                    let outcome = outcome
                        .unwrap_or_else(|| DialOutcome::Failed("dial task aborted".to_string()));
                    (addr, outcome)
                })
                .collect(),
        }
    }

    async fn connect(self: &Arc<Self>, addr: &str) -> DialOutcome {
        match self.dial_remote_node(addr).await {
            Ok((client, version)) => {
                self.add_peer(client, version);
                DialOutcome::Connected
            }
            Err(e) => {
                self.peers.abort_dial(addr);
                warn!(we = %self.config.listen_addr, remote = %addr, "dial failed: {}", e);
                DialOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dial_remote_node(
        &self,
        addr: &str,
    ) -> Result<(Arc<dyn PeerClient>, Version), ChainError> {
        let client = self.call("dial", self.dialer.dial(addr)).await?;
        self.peers.mark_handshaking(addr);
        let version = self
            .call("handshake", client.handshake(self.version()))
            .await?;
        Ok((client, version))
    }

    fn add_peer(self: &Arc<Self>, client: Arc<dyn PeerClient>, version: Version) {
        let remote = version.listen_addr.clone();
        let height = version.height;
        let peer_list = version.peer_list.clone();

        let (id, is_new) = self.peers.register(client, version);
        if is_new {
            info!(we = %self.config.listen_addr, remote = %remote, height, peer = id, "new peer connected");
        } else {
            debug!(we = %self.config.listen_addr, remote = %remote, height, peer = id, "peer reconnected");
        }

        if !peer_list.is_empty() {
            let node = Arc::clone(self);
            tokio::spawn(async move {
                let report = node.bootstrap(peer_list).await;
                debug!(
                    we = %node.config.listen_addr,
                    connected = report.connected().len(),
                    failed = report.failed().len(),
                    "peer list bootstrap finished"
                );
            });
        }
    }

    /// Validates and pools a transaction, gossiping it on first sight.
    pub fn handle_transaction(
        self: &Arc<Self>,
        tx: Transaction,
        from: Option<&str>,
    ) -> Result<Ack, ChainError> {
        tx.validate()?;

        let hash = tx.hash_hex();
        if self.mempool.add(tx.clone()) {
            debug!(
                we = %self.config.listen_addr,
                from = from.unwrap_or("local"),
                hash = %hash,
                "received tx"
            );
            self.broadcast(GossipMessage::Transaction(tx));
        }
        Ok(Ack)
    }

    /// Sends `msg` to every peer on its own task. A peer that fails or times
    /// out is dropped from the table. Returns the number of targets.
    pub fn broadcast(self: &Arc<Self>, msg: GossipMessage) -> usize {
        let peers = self.peers.peers();
        for peer in &peers {
            let node = Arc::clone(self);
            let peer = peer.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                let kind = msg.kind();
                let result = match msg {
                    GossipMessage::Transaction(tx) => node
                        .call("handle_transaction", peer.client.handle_transaction(tx))
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = result {
                    warn!(
                        we = %node.config.listen_addr,
                        remote = %peer.listen_addr(),
                        "{} broadcast failed, dropping peer: {}",
                        kind,
                        e
                    );
                    node.peers.remove(peer.id);
                }
            });
        }
        peers.len()
    }

    async fn call<T, F>(&self, what: &str, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        match tokio::time::timeout(self.config.rpc_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(format!(
                "{} timed out after {:?}",
                what, self.config.rpc_timeout
            ))),
        }
    }
}
