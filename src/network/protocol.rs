//! Messages exchanged between nodes and the framed wire codec that carries them.
//!
//! Wire format: MAGIC (4) + LENGTH (4 BE) + bincode payload

use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PROTOCOL_VERSION: &str = "blockverse-0.1";

pub const FRAME_MAGIC: [u8; 4] = *b"BLKV";

/// Upper bound on a single frame payload (4 MiB).
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Handshake record a node advertises about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
    pub height: u64,
    pub listen_addr: String,
    pub peer_list: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack;

/// Payloads fanned out to every known peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipMessage {
    Transaction(Transaction),
}

impl GossipMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::Transaction(_) => "transaction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Handshake(Version),
    HandleTransaction(Transaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Version(Version),
    Ack(Ack),
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connection closed")]
    Closed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic bytes: expected {expected:02x?}, got {got:02x?}")]
    BadMagic { expected: [u8; 4], got: [u8; 4] },
    #[error("frame too large: {0} bytes (max 4 MiB)")]
    FrameTooLarge(usize),
    #[error("empty frame")]
    EmptyFrame,
    #[error("codec: {0}")]
    Codec(#[from] Box<bincode::ErrorKind>),
}

impl From<WireError> for ChainError {
    fn from(err: WireError) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(payload.len()));
    }

    writer.write_all(&FRAME_MAGIC).await?;
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. A clean EOF before the magic bytes is reported as [`WireError::Closed`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut magic = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut magic).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(WireError::Closed);
        }
        return Err(e.into());
    }
    if magic != FRAME_MAGIC {
        return Err(WireError::BadMagic {
            expected: FRAME_MAGIC,
            got: magic,
        });
    }

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let payload_len = u32::from_be_bytes(len_buf) as usize;
    if payload_len == 0 {
        return Err(WireError::EmptyFrame);
    }
    if payload_len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(payload_len));
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> Version {
        Version {
            version: PROTOCOL_VERSION.to_string(),
            height: 7,
            listen_addr: "127.0.0.1:3000".to_string(),
            peer_list: vec!["127.0.0.1:4000".to_string()],
        }
    }

    #[tokio::test]
    async fn test_frame_over_duplex() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut a, mut b) = tokio::io::duplex(1024);
            let req = Request::Handshake(version());
            write_frame(&mut a, &req).await.unwrap();
            let got: Request = read_frame(&mut b).await.unwrap();
            assert_eq!(got, req);

            drop(a);
            let closed = read_frame::<_, Request>(&mut b).await;
            assert!(matches!(closed, Err(WireError::Closed)));
        })
        .await
        .expect("test_frame_over_duplex timed out");
    }

    #[tokio::test]
    async fn test_bad_magic_rejected() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut a, mut b) = tokio::io::duplex(1024);
            a.write_all(b"NOPE\x00\x00\x00\x01\x00").await.unwrap();
            let result = read_frame::<_, Request>(&mut b).await;
            assert!(matches!(result, Err(WireError::BadMagic { .. })));
        })
        .await
        .expect("test_bad_magic_rejected timed out");
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut a, mut b) = tokio::io::duplex(1024);
            a.write_all(&FRAME_MAGIC).await.unwrap();
            a.write_all(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes())
                .await
                .unwrap();
            let result = read_frame::<_, Request>(&mut b).await;
            assert!(matches!(result, Err(WireError::FrameTooLarge(_))));
        })
        .await
        .expect("test_oversized_frame_rejected timed out");
    }

    #[test]
    fn test_wire_error_is_network_error() {
        let err: ChainError = WireError::EmptyFrame.into();
        assert!(err.is_network());
    }

    #[test]
    fn test_gossip_kind() {
        let tx = Transaction::new(1, vec![], vec![]);
        assert_eq!(GossipMessage::Transaction(tx).kind(), "transaction");
    }
}
