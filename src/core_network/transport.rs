use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::error::TransportError;

/// A connected, ordered byte stream with a fixed inactivity read
/// timeout. The control channel holds one for the whole session; each
/// passive-mode transfer opens and closes a second, short-lived one.
pub struct Transport {
    stream: TcpStream,
    read_timeout: Duration,
}

impl Transport {
    pub async fn connect(
        host: &str,
        port: u16,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(TransportError::Connect)?;
        debug!("Connected to {}:{}", host, port);
        Ok(Self {
            stream,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.stream.local_addr().map_err(TransportError::Addr)
    }

    pub async fn send_all(&mut self, buffer: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(buffer)
            .await
            .map_err(TransportError::Send)
    }

    /// Reads into `buffer` and returns the byte count; 0 means the peer
    /// closed the connection. Blocks at most the configured timeout.
    pub async fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        match timeout(self.read_timeout, self.stream.read(buffer)).await {
            Ok(result) => result.map_err(TransportError::Recv),
            Err(_) => Err(TransportError::Timeout(self.read_timeout.as_secs())),
        }
    }

    /// Reads exactly one byte; a peer close mid-read is an error here,
    /// unlike in `recv`.
    pub async fn recv_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        match self.recv(&mut byte).await? {
            0 => Err(TransportError::Closed),
            _ => Ok(byte[0]),
        }
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await.map_err(TransportError::Send)
    }
}
