//! Test daemon management.
//!
//! Spawns `hatcogd` with a throwaway config and kills it on drop.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

use super::client::TestClient;

pub const NICK: &str = "graham";

pub struct TestDaemon {
    child: Child,
    port: u16,
    _dir: TempDir,
}

/// Grab a port the OS considers free right now.
fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

impl TestDaemon {
    /// Spawn a daemon with one autoconnect network at `upstream`.
    pub async fn spawn(upstream: &str) -> anyhow::Result<Self> {
        let port = free_port()?;
        let config = format!(
            r#"
[identity]
nick = "{NICK}"
user = "gking"
realname = "Graham King"

[listen]
address = "127.0.0.1:{port}"

[upstream]
tls = "never"
connect_attempts = 20
retry_backoff_secs = 0
read_timeout_ms = 100

[[network]]
address = "{upstream}"
"#
        );
        Self::spawn_with_config(port, &config).await
    }

    pub async fn spawn_with_config(port: u16, config: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("hatcogd.toml");
        std::fs::write(&config_path, config)?;

        let child = Command::new(env!("CARGO_BIN_EXE_hatcogd"))
            .arg(&config_path)
            .env("RUST_LOG", "hatcogd=debug")
            .stdin(Stdio::null())
            .spawn()?;

        let mut daemon = Self {
            child,
            port,
            _dir: dir,
        };
        daemon.wait_until_ready().await?;
        Ok(daemon)
    }

    /// Wait until the client listener accepts connections.
    async fn wait_until_ready(&mut self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if let Some(status) = self.child.try_wait()? {
                anyhow::bail!("hatcogd exited early: {status}");
            }
            // A probe that gets its greeting has been attached, so the
            // router is up too.
            if let Ok(probe) = TestClient::connect(&self.address()).await {
                drop(probe);
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("hatcogd failed to start within 5 seconds")
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Connect a client and bind it with `first_line`.
    pub async fn connect(&self, first_line: &str) -> anyhow::Result<TestClient> {
        let mut client = TestClient::connect(&self.address()).await?;
        client.send(first_line).await?;
        Ok(client)
    }

    /// Wait for the process to exit by itself.
    pub async fn wait_for_exit(&mut self, within: Duration) -> anyhow::Result<ExitStatus> {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("hatcogd still running after {within:?}")
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
