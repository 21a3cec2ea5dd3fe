use crate::blockchain::Chain;
use crate::config::{Config, StorageBackend};
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::network::{serve, NetworkNode, TcpDialer};
use crate::persistence::{BlockStore, MemoryBlockStore, SqliteBlockStore};
use crate::validator::Validator;
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Bootstrapping,
    Ready,
    Degraded,
}

/// Wires the block store, chain, pool, gossip manager and (optionally) the
/// validator into one running node.
pub struct Node {
    pub config: Config,
    pub chain: Arc<Chain>,
    pub mempool: Arc<Mempool>,
    pub network: Arc<NetworkNode>,
    validator_key: Option<KeyPair>,
    state: RwLock<NodeState>,
}

impl Node {
    pub fn init(config: Config) -> Result<Self, ChainError> {
        info!(
            "Starting Blockverse node on {} ({})",
            config.network.listen_addr, config.network.version
        );

        let store: Arc<dyn BlockStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryBlockStore::new()),
            StorageBackend::Sqlite => {
                let db_path = Path::new(&config.storage.path);
                if let Some(parent) = db_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Arc::new(SqliteBlockStore::open(db_path)?)
            }
        };

        let chain = Arc::new(Chain::new(store)?);
        let mempool = Arc::new(Mempool::new());
        let network = NetworkNode::new(
            config.network.to_peer_config(),
            Arc::new(TcpDialer::new(config.network.rpc_timeout())),
            mempool.clone(),
            chain.clone(),
        );

        let validator_key = if config.validator.enabled {
            match &config.validator.secret_key {
                Some(secret) => Some(KeyPair::from_secret_hex(secret)?),
                None => {
                    warn!("No validator secret key configured, generating an ephemeral one");
                    Some(KeyPair::generate())
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            chain,
            mempool,
            network,
            validator_key,
            state: RwLock::new(NodeState::Booting),
        })
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    fn set_state(&self, state: NodeState) {
        *self.state.write() = state;
    }

    /// Binds the listener and runs the node until the server stops.
    pub async fn start(self: Arc<Self>) -> Result<(), ChainError> {
        let listener = TcpListener::bind(&self.config.network.listen_addr)
            .await
            .map_err(|e| {
                ChainError::NetworkError(format!(
                    "Failed to bind {}: {}",
                    self.config.network.listen_addr, e
                ))
            })?;
        let server = tokio::spawn(serve(listener, self.network.clone()));

        let bootstrap_peers = self.config.network.bootstrap_peers.clone();
        if !bootstrap_peers.is_empty() {
            self.set_state(NodeState::Bootstrapping);
            let report = self.network.bootstrap(bootstrap_peers).await;
            let failed = report.failed();
            if !failed.is_empty() && report.connected().is_empty() {
                warn!("Could not reach any bootstrap peer: {:?}", failed);
                self.set_state(NodeState::Degraded);
            } else {
                self.set_state(NodeState::Ready);
            }
        } else {
            self.set_state(NodeState::Ready);
        }

        if let Some(keypair) = &self.validator_key {
            let validator = Validator::new(keypair.clone(), self.chain.clone(), self.mempool.clone())
                .with_block_time(self.config.validator.block_time());
            tokio::spawn(validator.run());
        }

        let health = {
            let node = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
                loop {
                    ticker.tick().await;
                    info!(
                        "Node running: state = {:?}, chain height = {}, peers = {}, pending txs = {}",
                        node.state(),
                        node.chain.height(),
                        node.network.peer_count(),
                        node.mempool.len()
                    );
                }
            })
        };

        let result = match server.await {
            Ok(result) => result,
            Err(e) => Err(ChainError::NetworkError(format!("Server task failed: {}", e))),
        };
        health.abort();
        if let Err(e) = &result {
            error!("P2P server failed: {}", e);
        }
        result
    }
}

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt().with_max_level(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_init_memory_node() {
        let node = Node::init(Config::default()).unwrap();
        assert_eq!(node.state(), NodeState::Booting);
        assert_eq!(node.chain.height(), 0);
        assert!(node.validator_key.is_none());
        assert_eq!(node.network.listen_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_init_sqlite_validator_node() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("nested").join("blocks.db");
        let keypair = KeyPair::generate();
        let config = parse_config(&format!(
            "[storage]\nbackend = \"sqlite\"\npath = {:?}\n\n[validator]\nenabled = true\nsecret_key = \"{}\"\n",
            db.to_string_lossy(),
            keypair.secret_hex()
        ))
        .unwrap();

        let node = Node::init(config).unwrap();
        assert!(db.exists());
        assert_eq!(
            node.validator_key.as_ref().unwrap().public_key_bytes(),
            keypair.public_key_bytes()
        );
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug");
        init_logging("not-a-level");
    }
}
