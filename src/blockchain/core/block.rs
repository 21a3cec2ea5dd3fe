use crate::crypto::{check_signature, CanonicalHash, KeyPair, Sha256Hash};
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const BLOCK_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub height: u64,
    pub previous_hash: Sha256Hash,
    pub timestamp: u64,
    /// Commitment to the ordered transaction list.
    pub root_hash: Sha256Hash,
}

impl CanonicalHash for BlockHeader {
    fn write_canonical(&self, hasher: &mut Sha256) {
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.root_hash);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Builds an unsigned block stamped with the current time.
    pub fn new(height: u64, previous_hash: Sha256Hash, transactions: Vec<Transaction>) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let root_hash = Block::calculate_root_hash(&transactions);

        Block {
            header: BlockHeader {
                version: BLOCK_VERSION,
                height,
                previous_hash,
                timestamp,
                root_hash,
            },
            transactions,
            public_key: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// The fixed, unsigned anchor at height 0.
    pub fn genesis() -> Self {
        Block {
            header: BlockHeader {
                version: BLOCK_VERSION,
                height: 0,
                previous_hash: [0u8; 32],
                timestamp: 0,
                root_hash: Block::calculate_root_hash(&[]),
            },
            transactions: Vec::new(),
            public_key: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Block identity: the header hash. Transactions commit through `root_hash`.
    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn calculate_root_hash(transactions: &[Transaction]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }

    /// Signs the header and embeds the producer's public key.
    pub fn sign(&mut self, keypair: &KeyPair) {
        let signature = keypair.sign(&self.hash());
        self.public_key = keypair.public_key_bytes().to_vec();
        self.signature = signature.to_vec();
    }

    pub fn check_signature(&self) -> Result<(), ChainError> {
        if self.public_key.is_empty() || self.signature.is_empty() {
            return Err(ChainError::InvalidBlock("Block is not signed".to_string()));
        }
        check_signature(&self.public_key, &self.hash(), &self.signature)
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))
    }

    pub fn verify(&self) -> bool {
        self.check_signature().is_ok()
    }
}
