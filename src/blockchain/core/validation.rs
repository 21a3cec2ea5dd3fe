use crate::blockchain::core::block::{Block, BlockHeader};
use crate::crypto::CanonicalHash;
use crate::error::ChainError;

/// Checks a candidate block against the header it must extend.
pub fn validate_block(block: &Block, head: &BlockHeader) -> Result<(), ChainError> {
    block.check_signature()?;

    let head_hash = head.hash();
    if block.header.previous_hash != head_hash {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid previous block hash. Expected {}, but got {}.",
            hex::encode(head_hash),
            hex::encode(block.header.previous_hash)
        )));
    }

    if block.header.height != head.height + 1 {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid block height. Expected {}, but got {}.",
            head.height + 1,
            block.header.height
        )));
    }

    let expected_root = Block::calculate_root_hash(&block.transactions);
    if expected_root != block.header.root_hash {
        return Err(ChainError::InvalidBlock(format!(
            "Root hash mismatch. Expected {}, but got {}.",
            hex::encode(expected_root),
            hex::encode(block.header.root_hash)
        )));
    }

    for tx in &block.transactions {
        tx.validate().map_err(|e| {
            ChainError::InvalidBlock(format!("Transaction {}: {}", tx.hash_hex(), e))
        })?;
    }

    Ok(())
}
