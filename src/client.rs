//! Echo client worker.
//!
//! One worker is one simulated client: connect, write a single packet, read
//! the same number of bytes back, release the connection. Failures are
//! reported as a printed diagnostic line and never propagate further.

use rand::rngs::SmallRng;
use std::fmt::Display;
use std::io::{self, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::payload::{random_payload, PAYLOAD_SIZE};

/// Why a worker stopped early.
#[derive(Debug)]
pub enum ClientError {
    /// Connecting to the target failed.
    Dial { target: String, source: io::Error },
    /// The write call returned an error.
    Write(io::Error),
    /// The write accepted fewer bytes than a full packet.
    ShortWrite(usize),
    /// A read call returned an error.
    Read(io::Error),
    /// The peer closed after `received` bytes.
    Closed { received: usize },
}

impl ClientError {
    /// Bytes moved before the exchange broke off, when known.
    pub fn partial(&self) -> Option<usize> {
        match self {
            ClientError::ShortWrite(n) => Some(*n),
            ClientError::Closed { received } => Some(*received),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Dial { target, .. } => write!(f, "Dial {target} failed"),
            ClientError::Write(_) | ClientError::ShortWrite(_) => write!(f, "Conn write failed"),
            ClientError::Read(_) | ClientError::Closed { .. } => write!(f, "Conn read failed"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Dial { source, .. } => Some(source),
            ClientError::Write(e) | ClientError::Read(e) => Some(e),
            ClientError::ShortWrite(_) | ClientError::Closed { .. } => None,
        }
    }
}

/// Run the echo exchange once against `target`.
///
/// Returns the bytes received. The connection is dropped, and so closed, on
/// every return path.
pub async fn echo_once(
    target: &str,
    rng: &mut SmallRng,
) -> Result<[u8; PAYLOAD_SIZE], ClientError> {
    let payload = random_payload(rng);

    let mut stream = TcpStream::connect(target)
        .await
        .map_err(|source| ClientError::Dial {
            target: target.to_string(),
            source,
        })?;

    let n = stream.write(&payload).await.map_err(ClientError::Write)?;
    if n != PAYLOAD_SIZE {
        return Err(ClientError::ShortWrite(n));
    }

    let mut recv_buf = [0u8; PAYLOAD_SIZE];
    let mut pos = 0;
    while pos < PAYLOAD_SIZE {
        let n = stream
            .read(&mut recv_buf[pos..])
            .await
            .map_err(ClientError::Read)?;
        if n == 0 {
            return Err(ClientError::Closed { received: pos });
        }
        pos += n;
    }

    Ok(recv_buf)
}

/// Worker entry point: run the exchange and print a diagnostic on failure.
pub async fn run_worker(id: usize, target: &str, mut rng: SmallRng) {
    match echo_once(target, &mut rng).await {
        Ok(_) => trace!(worker = id, "Echo round trip complete"),
        Err(e) => {
            debug!(worker = id, partial = ?e.partial(), error = ?e, "Echo client failed");
            print_line(&e);
        }
    }
}

/// Print one line to stdout. A closed or broken stdout is ignored.
pub fn print_line(line: impl Display) {
    write_line(&mut io::stdout().lock(), line);
}

fn write_line<W: Write>(out: &mut W, line: impl Display) {
    let _ = writeln!(out, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SeedSource;
    use crate::server::EchoServer;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    fn rng() -> SmallRng {
        SeedSource::with_base(99).worker_rng(0)
    }

    /// An address nothing is listening on.
    async fn dead_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run());

        let received = assert_ok!(echo_once(&addr, &mut rng()).await);
        assert!(received.iter().all(|b| b.is_ascii_alphabetic()));
    }

    #[tokio::test]
    async fn test_echo_matches_payload() {
        let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run());

        let expected = random_payload(&mut rng());
        let received = echo_once(&addr, &mut rng()).await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let addr = dead_addr().await;

        let err = assert_err!(echo_once(&addr, &mut rng()).await);
        assert!(matches!(err, ClientError::Dial { .. }));
        assert_eq!(err.to_string(), format!("Dial {addr} failed"));
    }

    #[tokio::test]
    async fn test_malformed_port_is_dial_failure() {
        let err = assert_err!(echo_once("127.0.0.1:notaport", &mut rng()).await);
        assert_eq!(err.to_string(), "Dial 127.0.0.1:notaport failed");
    }

    #[tokio::test]
    async fn test_peer_closes_early() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Reply with half a packet, then hang up.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; PAYLOAD_SIZE];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf[..PAYLOAD_SIZE / 2]).await.unwrap();
        });

        let err = assert_err!(echo_once(&addr, &mut rng()).await);
        match &err {
            ClientError::Closed { received } => assert_eq!(*received, PAYLOAD_SIZE / 2),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(err.partial(), Some(PAYLOAD_SIZE / 2));
        assert_eq!(err.to_string(), "Conn read failed");
    }

    #[tokio::test]
    async fn test_fragmented_reply_is_reassembled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; PAYLOAD_SIZE];
            stream.read_exact(&mut buf).await.unwrap();
            for chunk in buf.chunks(10) {
                stream.write_all(chunk).await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            }
        });

        let received = assert_ok!(echo_once(&addr, &mut rng()).await);
        assert_eq!(received, random_payload(&mut rng()));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_write_line_appends_newline() {
        let mut out = Vec::new();
        write_line(&mut out, ClientError::ShortWrite(3));
        write_line(&mut out, "All done!");
        assert_eq!(out, b"Conn write failed\nAll done!\n");
    }

    #[test]
    fn test_write_line_ignores_broken_stdout() {
        write_line(&mut BrokenPipe, "Conn read failed");
    }

    #[test]
    fn test_diagnostic_lines() {
        let refused = || io::Error::from(io::ErrorKind::ConnectionRefused);

        let dial = ClientError::Dial {
            target: "127.0.0.1:9999".to_string(),
            source: refused(),
        };
        assert_eq!(dial.to_string(), "Dial 127.0.0.1:9999 failed");
        assert_eq!(ClientError::Write(refused()).to_string(), "Conn write failed");
        assert_eq!(ClientError::ShortWrite(12).to_string(), "Conn write failed");
        assert_eq!(ClientError::Read(refused()).to_string(), "Conn read failed");
        assert_eq!(
            ClientError::Closed { received: 0 }.to_string(),
            "Conn read failed"
        );
    }
}
