//! Transaction pool: pending transactions waiting for the next block.

use crate::crypto::CanonicalHash;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Pending transactions keyed by their hex-encoded hash.
///
/// Readers share the lock; `add` and `clear` take it exclusively, so a
/// transaction is either drained by a given `clear` or left for the next one.
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, tx: &Transaction) -> bool {
        self.contains_hash(&tx.hash_hex())
    }

    pub fn contains_hash(&self, hash_hex: &str) -> bool {
        self.transactions.read().contains_key(hash_hex)
    }

    /// Returns `true` if the transaction was not already pending.
    pub fn add(&self, tx: Transaction) -> bool {
        let hash = tx.hash_hex();
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&hash) {
            return false;
        }
        transactions.insert(hash, tx);
        true
    }

    /// Re-queues transactions, skipping any that are already pending.
    /// Returns how many were added.
    pub fn extend(&self, txs: Vec<Transaction>) -> usize {
        let mut transactions = self.transactions.write();
        let mut added = 0;
        for tx in txs {
            let hash = tx.hash_hex();
            if let std::collections::hash_map::Entry::Vacant(e) = transactions.entry(hash) {
                e.insert(tx);
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// Atomically removes and returns every pending transaction.
    pub fn clear(&self) -> Vec<Transaction> {
        let drained = std::mem::take(&mut *self.transactions.write());
        drained.into_values().collect()
    }

    /// Snapshot of pending transactions without draining them.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.read().values().cloned().collect()
    }
}
