//! Fixed-packet TCP echo server.
//!
//! Each connection carries exactly one packet: the server buffers
//! [`PAYLOAD_SIZE`] bytes, writes them back and closes. Peers that hang up
//! before a full packet arrives get no reply.

use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace};

use crate::payload::PAYLOAD_SIZE;

/// Maximum number of concurrent connections
const MAX_CONNECTIONS: usize = 65536;

/// Server instance
pub struct EchoServer {
    listener: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl EchoServer {
    /// Bind the listening socket.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(EchoServer {
            listener,
            connection_limit: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the permit pool is closed.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(address = %self.local_addr()?, "Echo server listening");

        loop {
            // Wait for a connection slot
            let permit = self.connection_limit.clone().acquire_owned().await?;

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    trace!(peer = %addr, "New connection");

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream).await {
                            debug!(peer = %addr, error = %e, "Connection error");
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Echo one packet back to the peer.
///
/// Returns the number of bytes echoed, zero if the peer closed early.
async fn handle_connection(mut stream: TcpStream) -> io::Result<usize> {
    let mut buffer = BytesMut::with_capacity(PAYLOAD_SIZE);

    while buffer.len() < PAYLOAD_SIZE {
        let n = (&mut stream)
            .take((PAYLOAD_SIZE - buffer.len()) as u64)
            .read_buf(&mut buffer)
            .await?;
        if n == 0 {
            trace!(received = buffer.len(), "Connection closed before full packet");
            return Ok(0);
        }
    }

    stream.write_all(&buffer).await?;
    stream.shutdown().await?;
    Ok(buffer.len())
}
