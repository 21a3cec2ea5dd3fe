//! Timer-driven block proposer.

use crate::blockchain::{Block, Chain};
use crate::crypto::{CanonicalHash, KeyPair};
use crate::error::ChainError;
use crate::mempool::Mempool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);

pub struct Validator {
    keypair: KeyPair,
    chain: Arc<Chain>,
    mempool: Arc<Mempool>,
    block_time: Duration,
}

impl Validator {
    pub fn new(keypair: KeyPair, chain: Arc<Chain>, mempool: Arc<Mempool>) -> Self {
        Validator {
            keypair,
            chain,
            mempool,
            block_time: DEFAULT_BLOCK_TIME,
        }
    }

    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public_key_bytes())
    }

    /// One tick: drains the pool and commits its contents as a signed block on
    /// the current head. Returns `None` when the pool was empty.
    ///
    /// Drained transactions that fail validation are discarded. If the chain
    /// still rejects the block, the remaining transactions go back into the
    /// pool before the error is returned.
    pub fn produce_block(&self) -> Result<Option<Block>, ChainError> {
        let drained = self.mempool.clear();
        if drained.is_empty() {
            return Ok(None);
        }

        let mut txs = Vec::with_capacity(drained.len());
        for tx in drained {
            match tx.validate() {
                Ok(()) => txs.push(tx),
                Err(e) => warn!(hash = %tx.hash_hex(), "discarding invalid pooled transaction: {}", e),
            }
        }
        if txs.is_empty() {
            return Ok(None);
        }

        let mut block = Block::new(self.chain.height() + 1, self.chain.head_hash(), txs);
        block.sign(&self.keypair);

        match self.chain.add_block(block.clone()) {
            Ok(()) => {
                info!(
                    height = block.header.height,
                    hash = %block.hash_hex(),
                    txs = block.transactions.len(),
                    "committed block"
                );
                Ok(Some(block))
            }
            Err(e) => {
                let returned = self.mempool.extend(block.transactions);
                warn!(returned, "block rejected, transactions returned to pool: {}", e);
                Err(e)
            }
        }
    }

    /// Produces a block every `block_time` until the task is dropped.
    pub async fn run(self) {
        info!(
            pubkey = %self.public_key_hex(),
            "starting validator loop (block time {:?})",
            self.block_time
        );
        let mut ticker = tokio::time::interval(self.block_time);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.produce_block() {
                Ok(Some(_)) => {}
                Ok(None) => debug!("no pending transactions"),
                Err(e) => warn!("block production failed: {}", e),
            }
        }
    }
}
