use std::time::Duration;

use colored::Colorize;
use log::info;

use crate::constants::DATA_CHUNK_SIZE;
use crate::core_error::ClientError;
use crate::core_network::control::{ControlConnection, LineObserver};
use crate::core_network::error::{ProtocolError, TransportError};
use crate::core_network::pasv;
use crate::core_network::transport::Transport;
use crate::core_storage::storage::LocalStorage;

/// Drives the logical FTP operations over the control connection and a
/// per-transfer data channel. The data transport is opened by `pasv`
/// and closed at the end of each transfer regardless of outcome.
pub struct FtpClient {
    control: ControlConnection,
    storage: LocalStorage,
    data: Option<Transport>,
    read_timeout: Duration,
}

impl FtpClient {
    /// Connects the control channel (consuming the server greeting).
    pub async fn connect(
        host: &str,
        port: u16,
        read_timeout: Duration,
        storage: LocalStorage,
        observer: LineObserver,
    ) -> Result<Self, ClientError> {
        let control = ControlConnection::connect(host, port, read_timeout, observer).await?;
        Ok(Self {
            control,
            storage,
            data: None,
            read_timeout,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    /// Echoes the command to the operator, sends it, and returns the
    /// final status code.
    async fn command(&mut self, command: &str) -> Result<u16, ClientError> {
        println!("{}", command.blue());
        self.control.send_command(command).await
    }

    async fn expect(&mut self, command: &str, expected: u16) -> Result<(), ClientError> {
        let actual = self.command(command).await?;
        if actual != expected {
            return Err(unexpected(command, expected, actual));
        }
        Ok(())
    }

    /// Logs in, reconnecting the control channel first if a previous
    /// logout closed it. USER must yield 331 and PASS 230; after a
    /// failed USER no PASS is sent.
    pub async fn login(&mut self, user: &str, pass: &str) -> Result<(), ClientError> {
        if !self.control.is_connected() {
            self.control.reconnect().await?;
        }

        if self.command(&format!("USER {}", user)).await? != 331 {
            return Err(ProtocolError::LoginFailed.into());
        }
        if self.command(&format!("PASS {}", pass)).await? != 230 {
            return Err(ProtocolError::LoginFailed.into());
        }

        info!("Logged in as {}", user);
        Ok(())
    }

    /// Sends QUIT and closes the control transport on success.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.expect("QUIT", 221).await?;
        self.control.close().await
    }

    pub async fn mode_binary(&mut self) -> Result<(), ClientError> {
        self.expect("TYPE I", 200).await
    }

    pub async fn mode_ascii(&mut self) -> Result<(), ClientError> {
        self.expect("TYPE A", 200).await
    }

    /// Negotiates a passive-mode data channel: sends PASV, parses the
    /// advertised address out of the 227 line, and connects a fresh
    /// data transport to it.
    pub async fn pasv(&mut self) -> Result<(), ClientError> {
        let actual = self.command("PASV").await?;
        if actual != 227 {
            return Err(unexpected("PASV", 227, actual));
        }

        let (host, port) = pasv::parse_pasv_line(self.control.last_line())?;

        // A data channel left over from an aborted transfer is replaced.
        self.close_data().await;
        let transport = Transport::connect(&host.to_string(), port, self.read_timeout).await?;
        self.data = Some(transport);
        info!("Opened data port on {}:{}", host, port);
        Ok(())
    }

    /// Lists `path` (or the current directory) over the data channel
    /// negotiated by the preceding PASV exchange, printing the listing
    /// to the operator.
    pub async fn list(&mut self, path: Option<&str>) -> Result<(), ClientError> {
        let command = match path {
            Some(path) => format!("LIST {}", path),
            None => String::from("LIST"),
        };

        let actual = self.command(&command).await?;
        if actual != 150 {
            self.close_data().await;
            return Err(unexpected(&command, 150, actual));
        }

        let listing = self.drain_data().await?;
        print!("{}", String::from_utf8_lossy(&listing));

        let done = self.control.read_response().await?;
        if done != 226 {
            return Err(unexpected(&command, 226, done));
        }
        Ok(())
    }

    /// Uploads a local file. The payload is read before STOR is issued;
    /// a read failure releases the data channel opened by the preceding
    /// PASV exchange before propagating.
    pub async fn stor(&mut self, path: &str) -> Result<(), ClientError> {
        let buffer = match self.storage.read(path).await {
            Ok(buffer) => buffer,
            Err(e) => {
                self.close_data().await;
                return Err(e.into());
            }
        };

        let command = format!("STOR {}", path);
        let actual = self.command(&command).await?;
        if actual != 150 {
            self.close_data().await;
            return Err(unexpected(&command, 150, actual));
        }

        let mut transport = self.take_data()?;
        let sent = transport.send_all(&buffer).await;
        let _ = transport.close().await;
        sent?;

        let done = self.control.read_response().await?;
        if done != 226 {
            return Err(unexpected(&command, 226, done));
        }
        info!("Stored {} ({} bytes)", path, buffer.len());
        Ok(())
    }

    /// Downloads a remote file: drain the data channel fully, close it,
    /// write the payload to local storage, then validate the final 226.
    pub async fn retr(&mut self, path: &str) -> Result<(), ClientError> {
        let command = format!("RETR {}", path);
        let actual = self.command(&command).await?;
        if actual != 150 {
            self.close_data().await;
            return Err(unexpected(&command, 150, actual));
        }

        let buffer = self.drain_data().await?;
        self.storage.write(path, &buffer).await?;

        let done = self.control.read_response().await?;
        if done != 226 {
            return Err(unexpected(&command, 226, done));
        }
        info!("Retrieved {} ({} bytes)", path, buffer.len());
        Ok(())
    }

    fn take_data(&mut self) -> Result<Transport, ClientError> {
        self.data
            .take()
            .ok_or_else(|| TransportError::NotConnected.into())
    }

    /// Reads the data channel to exhaustion and closes it. The channel
    /// is closed even when a read fails mid-drain.
    async fn drain_data(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut transport = self.take_data()?;
        let mut buffer = Vec::new();
        let mut chunk = [0u8; DATA_CHUNK_SIZE];

        let result = loop {
            match transport.recv(&mut chunk).await {
                Ok(0) => break Ok(()),
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) => break Err(e),
            }
        };
        let _ = transport.close().await;
        result?;

        Ok(buffer)
    }

    async fn close_data(&mut self) {
        if let Some(mut transport) = self.data.take() {
            let _ = transport.close().await;
        }
    }
}

fn unexpected(command: &str, expected: u16, actual: u16) -> ClientError {
    ProtocolError::UnexpectedReply {
        command: command.to_string(),
        expected,
        actual,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rouilleftp-client-{}-{}", tag, std::process::id()))
    }

    async fn connect_client(port: u16, root: PathBuf) -> FtpClient {
        FtpClient::connect(
            "127.0.0.1",
            port,
            Duration::from_secs(5),
            LocalStorage::new(root),
            Box::new(|_line| {}),
        )
        .await
        .unwrap()
    }

    async fn expect_line(reader: &mut BufReader<TcpStream>, expected: &str) {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, expected);
    }

    async fn send(reader: &mut BufReader<TcpStream>, reply: &str) {
        reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
    }

    fn pasv_reply(port: u16) -> String {
        format!(
            "227 Entering Passive Mode (127,0,0,1,{},{}).\r\n",
            port / 256,
            port % 256
        )
    }

    #[tokio::test]
    async fn test_login_sequence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "USER anon\r\n").await;
            send(&mut reader, "331 need password\r\n").await;
            expect_line(&mut reader, "PASS pw\r\n").await;
            send(&mut reader, "230 logged in\r\n").await;
        });

        let mut client = connect_client(port, temp_root("login")).await;
        client.login("anon", "pw").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected_user_sends_no_pass() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "USER anon\r\n").await;
            send(&mut reader, "530 not welcome\r\n").await;
            // Nothing further may arrive before the client goes away.
            let mut rest = String::new();
            reader.read_to_string(&mut rest).await.unwrap();
            rest
        });

        let mut client = connect_client(port, temp_root("badlogin")).await;
        let err = client.login("anon", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::LoginFailed)
        ));
        drop(client);
        assert_eq!(server.await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_logout_then_login_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "QUIT\r\n").await;
            send(&mut reader, "221 bye\r\n").await;

            // The login that follows must open a fresh connection.
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 welcome back\r\n").await;
            expect_line(&mut reader, "USER anon\r\n").await;
            send(&mut reader, "331 ok\r\n").await;
            expect_line(&mut reader, "PASS pw\r\n").await;
            send(&mut reader, "230 in\r\n").await;
        });

        let mut client = connect_client(port, temp_root("relogin")).await;
        client.logout().await.unwrap();
        assert!(!client.is_connected());
        client.login("anon", "pw").await.unwrap();
        assert!(client.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_mode_switches() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "TYPE I\r\n").await;
            send(&mut reader, "200 binary\r\n").await;
            expect_line(&mut reader, "TYPE A\r\n").await;
            send(&mut reader, "200 ascii\r\n").await;
        });

        let mut client = connect_client(port, temp_root("mode")).await;
        client.mode_binary().await.unwrap();
        client.mode_ascii().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_over_data_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, &pasv_reply(data_port)).await;
            expect_line(&mut reader, "LIST\r\n").await;
            send(&mut reader, "150 here it comes\r\n").await;

            let (mut data_socket, _) = data_listener.accept().await.unwrap();
            data_socket
                .write_all(b"file1.txt\r\nfile2.txt\r\n")
                .await
                .unwrap();
            drop(data_socket);

            send(&mut reader, "226 done\r\n").await;
        });

        let mut client = connect_client(port, temp_root("list")).await;
        client.pasv().await.unwrap();
        client.list(None).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_fails_on_bad_final_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, &pasv_reply(data_port)).await;
            expect_line(&mut reader, "LIST docs\r\n").await;
            send(&mut reader, "150 ok\r\n").await;

            let (mut data_socket, _) = data_listener.accept().await.unwrap();
            data_socket.write_all(b"docs listing\r\n").await.unwrap();
            drop(data_socket);

            send(&mut reader, "426 transfer aborted\r\n").await;
        });

        let mut client = connect_client(port, temp_root("badlist")).await;
        client.pasv().await.unwrap();
        let err = client.list(Some("docs")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnexpectedReply {
                expected: 226,
                actual: 426,
                ..
            })
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_retr_writes_local_file() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, &pasv_reply(data_port)).await;
            expect_line(&mut reader, "RETR hello.txt\r\n").await;
            send(&mut reader, "150 sending\r\n").await;

            let (mut data_socket, _) = data_listener.accept().await.unwrap();
            data_socket.write_all(b"payload bytes").await.unwrap();
            drop(data_socket);

            send(&mut reader, "226 done\r\n").await;
        });

        let root = temp_root("retr");
        let mut client = connect_client(port, root.clone()).await;
        client.pasv().await.unwrap();
        client.retr("hello.txt").await.unwrap();
        server.await.unwrap();

        let written = tokio::fs::read(root.join("hello.txt")).await.unwrap();
        assert_eq!(written, b"payload bytes");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_stor_uploads_local_file() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let root = temp_root("stor");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("up.txt"), b"upload me").unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, &pasv_reply(data_port)).await;
            expect_line(&mut reader, "STOR up.txt\r\n").await;
            send(&mut reader, "150 ok\r\n").await;

            let (mut data_socket, _) = data_listener.accept().await.unwrap();
            let mut received = Vec::new();
            data_socket.read_to_end(&mut received).await.unwrap();
            assert_eq!(received, b"upload me");

            send(&mut reader, "226 done\r\n").await;
        });

        let mut client = connect_client(port, root.clone()).await;
        client.pasv().await.unwrap();
        client.stor("up.txt").await.unwrap();
        server.await.unwrap();
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_stor_missing_file_releases_data_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, &pasv_reply(data_port)).await;

            // The failed read must close the data connection without a
            // STOR ever being issued.
            let (mut data_socket, _) = data_listener.accept().await.unwrap();
            let mut sink = Vec::new();
            data_socket.read_to_end(&mut sink).await.unwrap();
            assert!(sink.is_empty());
        });

        let mut client = connect_client(port, temp_root("stor-missing")).await;
        client.pasv().await.unwrap();
        let err = client.stor("does-not-exist.txt").await.unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_pasv_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            send(&mut reader, "220 ready\r\n").await;
            expect_line(&mut reader, "PASV\r\n").await;
            send(&mut reader, "500 no passive for you\r\n").await;
        });

        let mut client = connect_client(port, temp_root("pasv-rejected")).await;
        let err = client.pasv().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnexpectedReply {
                expected: 227,
                actual: 500,
                ..
            })
        ));
        server.await.unwrap();
    }
}
