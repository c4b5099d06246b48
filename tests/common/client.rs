//! Test client for the internal protocol.
//!
//! Writes plain text lines and reads one JSON record per line.

use hatcog_proto::Line;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    /// Nick from the greeting the daemon sends on attach.
    pub nick: String,
}

impl TestClient {
    /// Connect and read the `NICK` greeting.
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            nick: String::new(),
        };

        let greeting = client.recv().await?;
        anyhow::ensure!(greeting.command == "NICK", "expected NICK, got {greeting:?}");
        client.nick = greeting.content;
        Ok(client)
    }

    /// Type one line.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<Line> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Line> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("daemon closed the connection");
        }
        Ok(Line::from_json(line.as_bytes())?)
    }

    /// Receive lines until `predicate` matches one; returns them all.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Line>>
    where
        F: FnMut(&Line) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}
