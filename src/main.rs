//! hatcogd - IRC bouncer daemon.
//!
//! Holds one connection per IRC network and fans every line out to the
//! local clients bound to its channel.

mod config;
mod error;
mod external;
mod internal;
mod notify;
mod server;
mod telemetry;

use std::io::{BufRead, IsTerminal};

use crate::config::Config;
use crate::external::VERSION;
use crate::server::Server;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hatcogd.toml".to_string());

    // Log setup needs the config, so a bad config is logged with defaults.
    let config = Config::load(&config_path);
    let log = config.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    telemetry::init(&log)?;

    let config = config.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        version = VERSION,
        nick = %config.identity.nick,
        networks = config.networks.len(),
        "Starting hatcogd"
    );

    // A password piped on stdin is the NickServ password for every network
    // configured without one.
    let password = tokio::task::spawn_blocking(read_password).await?;
    if password.is_some() {
        info!("NickServ password read from stdin");
    }

    let server = Server::bind(&config, password).await?;
    if let Some(addr) = server.local_addr() {
        info!(%addr, "Accepting clients");
    }

    server.run(shutdown_signal()).await?;

    info!("hatcogd stopped");
    Ok(())
}

fn read_password() -> Option<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => {
            let password = hatcog_proto::sane(&line);
            (!password.is_empty()).then(|| password.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Failed to read password from stdin");
            None
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for ctrl-c");
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
        info!("Received ctrl-c");
    }
}
