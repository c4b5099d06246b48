//! Fake IRC server.
//!
//! Accepts the daemon's links and lets a test script both sides of the
//! conversation line by line.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

pub struct FakeUpstream {
    listener: TcpListener,
}

impl FakeUpstream {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// `host:port` to put in the daemon's config.
    pub fn address(&self) -> String {
        self.listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    /// Wait for the daemon to connect.
    pub async fn accept(&self) -> anyhow::Result<UpstreamConn> {
        let (stream, _) = timeout(Duration::from_secs(10), self.listener.accept()).await??;
        Ok(UpstreamConn::new(stream))
    }
}

/// One link from the daemon, seen from the server side.
pub struct UpstreamConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl UpstreamConn {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    /// Send one line to the daemon.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the daemon, without the line ending.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("daemon closed the link");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Skip lines until `expected` arrives.
    pub async fn expect(&mut self, expected: &str) -> anyhow::Result<()> {
        loop {
            let line = self.recv().await?;
            if line == expected {
                return Ok(());
            }
        }
    }

    /// Read the `NICK`/`USER` registration and return the nick.
    pub async fn expect_registration(&mut self) -> anyhow::Result<String> {
        let nick_line = self.recv().await?;
        let Some(nick) = nick_line.strip_prefix("NICK ") else {
            anyhow::bail!("expected NICK, got {nick_line:?}");
        };
        let user_line = self.recv().await?;
        anyhow::ensure!(user_line.starts_with("USER "), "expected USER, got {user_line:?}");
        Ok(nick.to_string())
    }

    /// Whether the daemon has closed the link.
    pub async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(
            timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}
