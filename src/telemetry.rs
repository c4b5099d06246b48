//! Log setup and standard spans.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Raw IRC traffic is
/// logged at `debug` under the `hatcogd::raw` target, so
/// `RUST_LOG=info,hatcogd::raw=debug` shows it on its own.
pub fn init(config: &LogConfig) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match &config.file {
        None => match config.format {
            LogFormat::Text => builder.init(),
            LogFormat::Json => builder.json().init(),
        },
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match config.format {
                LogFormat::Text => builder.init(),
                LogFormat::Json => builder.json().init(),
            }
        }
    }
    Ok(())
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for an upstream link task.
    pub fn link(network: &str) -> Span {
        info_span!("link", network = %network)
    }

    /// Span for a local client connection.
    pub fn client(id: u64, addr: &std::net::SocketAddr) -> Span {
        info_span!("client", id = id, addr = %addr)
    }
}
