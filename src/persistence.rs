//! Block storage backends for Blockverse
//!
//! A [`BlockStore`] is a dumb hash-keyed surface. It enforces no chain rules;
//! the [`Chain`](crate::blockchain::Chain) owns every write and the height index.

use crate::blockchain::Block;
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

pub trait BlockStore: Send + Sync {
    /// Stores `block` under its header hash, replacing any previous value.
    fn put(&self, block: &Block) -> Result<(), ChainError>;
    fn get(&self, hash: &Sha256Hash) -> Result<Option<Block>, ChainError>;
    fn len(&self) -> Result<usize, ChainError>;
    /// All stored blocks ordered by header height, used to rebuild the index on open.
    fn load_all(&self) -> Result<Vec<Block>, ChainError>;

    fn is_empty(&self) -> Result<bool, ChainError> {
        Ok(self.len()? == 0)
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Sha256Hash, Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: &Block) -> Result<(), ChainError> {
        self.blocks.write().insert(block.hash(), block.clone());
        Ok(())
    }

    fn get(&self, hash: &Sha256Hash) -> Result<Option<Block>, ChainError> {
        Ok(self.blocks.read().get(hash).cloned())
    }

    fn len(&self) -> Result<usize, ChainError> {
        Ok(self.blocks.read().len())
    }

    fn load_all(&self) -> Result<Vec<Block>, ChainError> {
        let mut blocks: Vec<Block> = self.blocks.read().values().cloned().collect();
        blocks.sort_by_key(|b| b.header.height);
        Ok(blocks)
    }
}

/// Durable store backed by SQLite. Blocks are kept as bincode blobs.
pub struct SqliteBlockStore {
    conn: Mutex<Connection>,
}

impl SqliteBlockStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ChainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ChainError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                hash BLOB PRIMARY KEY,
                height INTEGER NOT NULL,
                data BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS blocks_height ON blocks (height)",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create height index: {}", e)))?;

        Ok(SqliteBlockStore {
            conn: Mutex::new(conn),
        })
    }
}

impl BlockStore for SqliteBlockStore {
    fn put(&self, block: &Block) -> Result<(), ChainError> {
        let data = bincode::serialize(block)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO blocks (hash, height, data) VALUES (?1, ?2, ?3)",
            params![block.hash().to_vec(), block.header.height as i64, data],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;
        Ok(())
    }

    fn get(&self, hash: &Sha256Hash) -> Result<Option<Block>, ChainError> {
        let conn = self.conn.lock();
        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM blocks WHERE hash = ?1",
                params![hash.to_vec()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?;

        match data {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn len(&self) -> Result<usize, ChainError> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
            .map_err(|e| ChainError::DatabaseError(format!("Failed to count blocks: {}", e)))?;
        Ok(count as usize)
    }

    fn load_all(&self) -> Result<Vec<Block>, ChainError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT data FROM blocks ORDER BY height ASC")
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for row in rows {
            let bytes = row
                .map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))?;
            blocks.push(bincode::deserialize(&bytes)?);
        }
        Ok(blocks)
    }
}
