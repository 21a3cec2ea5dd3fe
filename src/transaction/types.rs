/// Transaction types for Blockverse
use crate::crypto::{write_bytes, Address, CanonicalHash, KeyPair, Sha256Hash};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Reference to a previous output, spent by `public_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_hash: Sha256Hash,
    pub prev_out_index: u32,
    pub public_key: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

impl TxInput {
    pub fn new(prev_tx_hash: Sha256Hash, prev_out_index: u32, public_key: Vec<u8>) -> Self {
        TxInput {
            prev_tx_hash,
            prev_out_index,
            public_key,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

// Input signatures are never part of the encoding: a signature cannot commit
// to itself, and the identity hash must not change once inputs are signed.
impl CanonicalHash for Transaction {
    fn write_canonical(&self, hasher: &mut Sha256) {
        hasher.update(self.version.to_le_bytes());
        hasher.update((self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.prev_tx_hash);
            hasher.update(input.prev_out_index.to_le_bytes());
            write_bytes(hasher, &input.public_key);
        }
        hasher.update((self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.amount.to_le_bytes());
            hasher.update(output.address);
        }
    }
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Transaction {
            version,
            inputs,
            outputs,
        }
    }

    /// Signs every input spent by `keypair`. Returns how many inputs were signed.
    pub fn sign(&mut self, keypair: &KeyPair) -> usize {
        let hash = self.hash();
        let public_key = keypair.public_key_bytes();
        let mut signed = 0;
        for input in self.inputs.iter_mut() {
            if input.public_key == public_key {
                input.signature = Some(keypair.sign(&hash).to_vec());
                signed += 1;
            }
        }
        signed
    }

    /// Signs a single input regardless of the public key it declares.
    pub fn sign_input(&mut self, index: usize, keypair: &KeyPair) -> Result<(), ChainError> {
        let hash = self.hash();
        let input = self.inputs.get_mut(index).ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Input {} does not exist", index))
        })?;
        input.signature = Some(keypair.sign(&hash).to_vec());
        Ok(())
    }

    pub fn total_output(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, output| acc.saturating_add(output.amount))
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
