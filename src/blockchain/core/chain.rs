use crate::blockchain::core::block::{Block, BlockHeader};
use crate::blockchain::core::validation::validate_block;
use crate::crypto::{CanonicalHash, Sha256Hash};
use crate::error::ChainError;
use crate::persistence::{BlockStore, MemoryBlockStore};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Append-only, height-indexed ledger over a [`BlockStore`].
///
/// The header list is the height index: `headers[h]` is the header of the
/// block at height `h`, and the store resolves its hash to the full block.
/// Appends are serialized by the write guard on that list.
pub struct Chain {
    store: Arc<dyn BlockStore>,
    headers: RwLock<Vec<BlockHeader>>,
}

impl Chain {
    /// Opens a chain on `store`, writing the genesis block if the store is empty
    /// and otherwise rebuilding the height index from the stored blocks.
    pub fn new(store: Arc<dyn BlockStore>) -> Result<Self, ChainError> {
        let headers = if store.is_empty()? {
            let genesis = Block::genesis();
            store.put(&genesis)?;
            vec![genesis.header]
        } else {
            Self::rebuild_index(store.as_ref())?
        };

        info!(height = headers.len() - 1, "chain opened");
        Ok(Chain {
            store,
            headers: RwLock::new(headers),
        })
    }

    pub fn in_memory() -> Result<Self, ChainError> {
        Self::new(Arc::new(MemoryBlockStore::new()))
    }

    fn rebuild_index(store: &dyn BlockStore) -> Result<Vec<BlockHeader>, ChainError> {
        let blocks = store.load_all()?;
        let genesis_hash = Block::genesis().hash();

        let mut headers: Vec<BlockHeader> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match headers.last() {
                None if block.hash() == genesis_hash => {}
                None => {
                    return Err(ChainError::DatabaseError(
                        "Stored chain does not start at the genesis block".to_string(),
                    ))
                }
                Some(prev) => {
                    if block.header.height != prev.height + 1
                        || block.header.previous_hash != prev.hash()
                    {
                        return Err(ChainError::DatabaseError(format!(
                            "Stored block at height {} does not link to its parent",
                            block.header.height
                        )));
                    }
                }
            }
            headers.push(block.header);
        }
        Ok(headers)
    }

    /// Number of blocks appended after genesis.
    pub fn height(&self) -> u64 {
        (self.headers.read().len() - 1) as u64
    }

    pub fn head_hash(&self) -> Sha256Hash {
        // The index always holds at least the genesis header.
        self.headers
            .read()
            .last()
            .map(|h| h.hash())
            .unwrap_or_else(|| Block::genesis().hash())
    }

    pub fn head(&self) -> Result<Block, ChainError> {
        self.get_block_by_height(self.height())
    }

    /// Validates `block` against the current head and commits it.
    ///
    /// A rejected block leaves the chain unchanged.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        let mut headers = self.headers.write();
        let head = headers
            .last()
            .ok_or_else(|| ChainError::InvalidBlock("Chain has no genesis block".to_string()))?;

        validate_block(&block, head)?;

        self.store.put(&block)?;
        debug!(
            height = block.header.height,
            hash = %block.hash_hex(),
            txs = block.transactions.len(),
            "block committed"
        );
        headers.push(block.header);
        Ok(())
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Block, ChainError> {
        let hash = {
            let headers = self.headers.read();
            let header = headers.get(height as usize).ok_or_else(|| {
                ChainError::BlockNotFound(format!(
                    "height {} is beyond chain height {}",
                    height,
                    headers.len() - 1
                ))
            })?;
            header.hash()
        };
        self.get_block_by_hash(&hash)
    }

    pub fn get_block_by_hash(&self, hash: &Sha256Hash) -> Result<Block, ChainError> {
        self.store
            .get(hash)?
            .ok_or_else(|| ChainError::BlockNotFound(format!("hash {}", hex::encode(hash))))
    }

    pub fn get_header(&self, height: u64) -> Option<BlockHeader> {
        self.headers.read().get(height as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::persistence::SqliteBlockStore;

    fn next_block(chain: &Chain, keypair: &KeyPair) -> Block {
        let mut block = Block::new(chain.height() + 1, chain.head_hash(), vec![]);
        block.sign(keypair);
        block
    }

    #[test]
    fn test_new_chain() {
        let chain = Chain::in_memory().unwrap();
        assert_eq!(chain.height(), 0);
        let genesis = chain.get_block_by_height(0).unwrap();
        assert_eq!(genesis, Block::genesis());
        assert_eq!(chain.head_hash(), genesis.hash());
    }

    #[test]
    fn test_add_block() {
        let chain = Chain::in_memory().unwrap();
        let keypair = KeyPair::generate();

        for i in 0..100u64 {
            let block = next_block(&chain, &keypair);
            let hash = block.hash();
            chain.add_block(block.clone()).unwrap();

            assert_eq!(chain.height(), i + 1);
            assert_eq!(chain.get_block_by_hash(&hash).unwrap(), block);
            assert_eq!(chain.get_block_by_height(i + 1).unwrap(), block);
        }
        assert_eq!(chain.head().unwrap().header.height, 100);
    }

    #[test]
    fn test_rejected_block_leaves_chain_unchanged() {
        let chain = Chain::in_memory().unwrap();
        let keypair = KeyPair::generate();
        chain.add_block(next_block(&chain, &keypair)).unwrap();

        let mut orphan = Block::new(2, [1u8; 32], vec![]);
        orphan.sign(&keypair);
        let err = chain.add_block(orphan.clone()).unwrap_err();

        assert!(err.is_validation());
        assert_eq!(chain.height(), 1);
        assert!(chain.get_block_by_hash(&orphan.hash()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let chain = Chain::in_memory().unwrap();
        let block = next_block(&chain, &KeyPair::generate());
        chain.add_block(block.clone()).unwrap();
        assert!(chain.add_block(block).is_err());
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_lookup_beyond_height_is_not_found() {
        let chain = Chain::in_memory().unwrap();
        let err = chain.get_block_by_height(1).unwrap_err();
        assert!(err.is_not_found());
        assert!(chain.get_block_by_height(u64::MAX).unwrap_err().is_not_found());
        assert!(chain.get_block_by_hash(&[5u8; 32]).unwrap_err().is_not_found());
        assert!(chain.get_header(3).is_none());
    }

    #[test]
    fn test_reopen_rebuilds_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        let keypair = KeyPair::generate();

        let mut appended = Vec::new();
        {
            let chain = Chain::new(Arc::new(SqliteBlockStore::open(&path).unwrap())).unwrap();
            for _ in 0..5 {
                let block = next_block(&chain, &keypair);
                appended.push(block.clone());
                chain.add_block(block).unwrap();
            }
        }

        let chain = Chain::new(Arc::new(SqliteBlockStore::open(&path).unwrap())).unwrap();
        assert_eq!(chain.height(), 5);
        for (i, block) in appended.iter().enumerate() {
            assert_eq!(&chain.get_block_by_height(i as u64 + 1).unwrap(), block);
        }
        chain.add_block(next_block(&chain, &keypair)).unwrap();
        assert_eq!(chain.height(), 6);
    }

    #[test]
    fn test_reopen_rejects_foreign_store() {
        let store = Arc::new(MemoryBlockStore::new());
        let mut stray = Block::new(1, [4u8; 32], vec![]);
        stray.sign(&KeyPair::generate());
        store.put(&stray).unwrap();

        let err = Chain::new(store).err().unwrap();
        assert!(matches!(err, ChainError::DatabaseError(_)));
    }
}
