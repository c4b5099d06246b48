//! Dialing upstream networks, with or without TLS.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, info, warn};

use super::stream::IrcStream;
use crate::config::TlsMode;
use crate::error::ConnectError;

/// Build a TLS connector trusting the system root certificates.
pub fn connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("Error loading native certs: {}", e);
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Host part of a `host:port` address, without IPv6 brackets.
pub fn hostname(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Upgrades a TCP stream to TLS.
pub async fn upgrade_to_tls(
    connector: &TlsConnector,
    tcp_stream: TcpStream,
    hostname: &str,
    handshake_timeout: Duration,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ConnectError> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| ConnectError::ServerName(hostname.to_string()))?;

    let tls_stream = timeout(handshake_timeout, connector.connect(server_name, tcp_stream))
        .await
        .map_err(|_| ConnectError::HandshakeTimeout)??;

    info!(hostname = %hostname, "TLS handshake completed");
    Ok(tls_stream)
}

/// Open one connection to `address` according to `mode`.
///
/// In [`TlsMode::Auto`] a failed handshake is followed by a fresh plaintext
/// connection; only errors from that second dial are reported.
pub async fn dial(
    connector: &TlsConnector,
    address: &str,
    mode: TlsMode,
    handshake_timeout: Duration,
) -> Result<IrcStream, ConnectError> {
    let host = hostname(address);
    match mode {
        TlsMode::Never => Ok(IrcStream::Plain(TcpStream::connect(address).await?)),
        TlsMode::Always => {
            let tcp = TcpStream::connect(address).await?;
            let tls = upgrade_to_tls(connector, tcp, host, handshake_timeout).await?;
            Ok(IrcStream::Tls(Box::new(tls)))
        }
        TlsMode::Auto => {
            let tcp = TcpStream::connect(address).await?;
            match upgrade_to_tls(connector, tcp, host, handshake_timeout).await {
                Ok(tls) => Ok(IrcStream::Tls(Box::new(tls))),
                Err(e) => {
                    debug!(%address, error = %e, "TLS failed, falling back to plaintext");
                    Ok(IrcStream::Plain(TcpStream::connect(address).await?))
                }
            }
        }
    }
}
