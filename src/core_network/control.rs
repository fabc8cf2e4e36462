use std::time::Duration;

use log::{info, trace};

use crate::core_error::ClientError;

use super::error::{ProtocolError, TransportError};
use super::transport::Transport;

/// Sink invoked once per response line read off the control channel,
/// before framing proceeds. Display only; never a framing input.
pub type LineObserver = Box<dyn Fn(&str) + Send + Sync>;

/// The long-lived FTP control channel: a transport plus the response
/// framing layered on top of it. Constructing one connects and
/// consumes the server greeting.
pub struct ControlConnection {
    host: String,
    port: u16,
    read_timeout: Duration,
    transport: Option<Transport>,
    last_line: String,
    observer: LineObserver,
}

impl ControlConnection {
    pub async fn connect(
        host: &str,
        port: u16,
        read_timeout: Duration,
        observer: LineObserver,
    ) -> Result<Self, ClientError> {
        let transport = Transport::connect(host, port, read_timeout).await?;
        if let Ok(addr) = transport.local_addr() {
            info!("Client: {}", addr);
        }

        let mut connection = Self {
            host: host.to_string(),
            port,
            read_timeout,
            transport: Some(transport),
            last_line: String::new(),
            observer,
        };

        // Server greeting
        connection.read_response().await?;
        Ok(connection)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The most recent response line received. Carries the PASV address
    /// text from the framer to the address parser.
    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    /// Re-establishes the transport and consumes the fresh greeting.
    /// Only meaningful after a `close`.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        info!("Reconnecting...");
        if self.transport.is_some() {
            self.close().await?;
        }
        let transport = Transport::connect(&self.host, self.port, self.read_timeout).await?;
        self.transport = Some(transport);
        self.read_response().await?;
        Ok(())
    }

    /// Closes the transport and marks the session disconnected. Closing
    /// an already-closed session is a no-op.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// Sends one command line (CRLF appended) and reads exactly one
    /// response, returning its status code. Strict request/response:
    /// no pipelining.
    pub async fn send_command(&mut self, command: &str) -> Result<u16, ClientError> {
        let line = format!("{}\r\n", command);
        self.transport_mut()?.send_all(line.as_bytes()).await?;
        trace!(">>> {}", command);
        self.read_response().await
    }

    /// Reads a complete response and returns its status code. A head
    /// line whose 4th character is not a space opens a multi-line block
    /// that ends at a line starting with the same 3-digit code followed
    /// by a space. Every line, head and continuation, is surfaced to
    /// the observer before framing proceeds.
    pub async fn read_response(&mut self) -> Result<u16, ClientError> {
        let first = self.read_line().await?;
        self.observe_line(first.clone());

        let code = parse_status_code(&first)?;
        if !is_final_line(&first) {
            let terminator = format!("{} ", &first[..3]);
            loop {
                let line = self.read_line().await?;
                let done = line.starts_with(&terminator);
                self.observe_line(line);
                if done {
                    break;
                }
            }
        }

        trace!("<<< {}", code);
        Ok(code)
    }

    /// Reads one text line byte by byte up to the line feed. The line
    /// feed and a trailing carriage return are excluded.
    async fn read_line(&mut self) -> Result<String, ClientError> {
        let transport = self.transport_mut()?;
        let mut line: Vec<u8> = Vec::new();
        loop {
            let byte = transport.recv_byte().await?;
            if byte == 0x0A {
                break;
            }
            line.push(byte);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn observe_line(&mut self, line: String) {
        (self.observer)(&line);
        self.last_line = line;
    }

    fn transport_mut(&mut self) -> Result<&mut Transport, TransportError> {
        self.transport.as_mut().ok_or(TransportError::NotConnected)
    }
}

/// Extracts the 3-digit status code from the start of a response line.
fn parse_status_code(line: &str) -> Result<u16, ProtocolError> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::MalformedResponse(line.to_string()));
    }
    let digit = |i: usize| u16::from(bytes[i] - b'0');
    Ok(digit(0) * 100 + digit(1) * 10 + digit(2))
}

/// A response is complete in one line when the 4th character is a
/// space (FTP continuation convention).
fn is_final_line(line: &str) -> bool {
    line.as_bytes().get(3) == Some(&b' ')
}
