//! TCP carrier for the node RPCs.
//!
//! Each connection is a sequence of request/response frame pairs (see
//! [`protocol`](crate::network::protocol)). The dialing side keeps the stream
//! open and reuses it for every call to that peer.

use crate::error::ChainError;
use crate::network::client::{Dialer, PeerClient};
use crate::network::node::NetworkNode;
use crate::network::protocol::{read_frame, write_frame, Ack, Request, Response, Version, WireError};
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        TcpDialer { connect_timeout }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>, ChainError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ChainError::Timeout(format!("Connecting to {} timed out", addr)))?
            .map_err(|e| ChainError::NetworkError(format!("Failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Arc::new(TcpPeerClient {
            addr: addr.to_string(),
            stream: Mutex::new(stream),
        }))
    }
}

pub struct TcpPeerClient {
    addr: String,
    stream: Mutex<TcpStream>,
}

impl TcpPeerClient {
    async fn request(&self, req: &Request) -> Result<Response, ChainError> {
        let mut stream = self.stream.lock().await;
        write_frame(&mut *stream, req).await?;
        let response: Response = read_frame(&mut *stream).await?;
        match response {
            Response::Error(msg) => Err(ChainError::NetworkError(format!(
                "{} rejected request: {}",
                self.addr, msg
            ))),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl PeerClient for TcpPeerClient {
    fn remote_addr(&self) -> &str {
        &self.addr
    }

    async fn handshake(&self, version: Version) -> Result<Version, ChainError> {
        match self.request(&Request::Handshake(version)).await? {
            Response::Version(v) => Ok(v),
            other => Err(unexpected(&other)),
        }
    }

    async fn handle_transaction(&self, tx: Transaction) -> Result<Ack, ChainError> {
        match self.request(&Request::HandleTransaction(tx)).await? {
            Response::Ack(ack) => Ok(ack),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> ChainError {
    ChainError::NetworkError(format!("Unexpected response: {:?}", response))
}

/// Accepts connections forever, serving each on its own task.
pub async fn serve(listener: TcpListener, node: Arc<NetworkNode>) -> Result<(), ChainError> {
    info!(we = %node.listen_addr(), "accepting peer connections on {}", listener.local_addr()?);
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let node = Arc::clone(&node);
                tokio::spawn(async move {
                    handle_connection(stream, remote, node).await;
                });
            }
            Err(e) => warn!(we = %node.listen_addr(), "accept failed: {}", e),
        }
    }
}

async fn handle_connection(mut stream: TcpStream, remote: SocketAddr, node: Arc<NetworkNode>) {
    let from = remote.to_string();
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(req) => req,
            Err(WireError::Closed) => break,
            Err(e) => {
                debug!(we = %node.listen_addr(), remote = %from, "dropping connection: {}", e);
                break;
            }
        };

        let response = match request {
            Request::Handshake(version) => match node.handshake(version).await {
                Ok(v) => Response::Version(v),
                Err(e) => Response::Error(e.to_string()),
            },
            Request::HandleTransaction(tx) => match node.handle_transaction(tx, Some(&from)) {
                Ok(ack) => Response::Ack(ack),
                Err(e) => Response::Error(e.to_string()),
            },
        };

        if let Err(e) = write_frame(&mut stream, &response).await {
            debug!(we = %node.listen_addr(), remote = %from, "reply failed: {}", e);
            break;
        }
    }
}
