//! ExternalManager - the set of upstream links, keyed by network address.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{Instrument, error, info, warn};

use hatcog_proto::Line;

use super::{External, LinkSettings, tls};
use crate::config::{Config, NetworkConfig, TlsMode};
use crate::error::{LinkError, RouteError};
use crate::telemetry::spans;

/// Per-network connection options.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Server password, sent as `PASS`.
    pub password: Option<String>,
    /// NickServ password, sent after each welcome.
    pub nickserv_password: Option<String>,
    pub tls: TlsMode,
}

/// Owns every [`External`] and the tasks behind them.
///
/// Links are kept in the order they were connected.
pub struct ExternalManager {
    links: Vec<External>,
    tasks: JoinSet<Result<(), LinkError>>,
    settings: LinkSettings,
    nick: watch::Sender<String>,
    default_tls: TlsMode,
    default_nickserv_password: Option<String>,
}

impl ExternalManager {
    /// `default_nickserv_password` applies to networks configured without one.
    pub fn new(
        config: &Config,
        from_server: mpsc::Sender<Line>,
        default_nickserv_password: Option<String>,
    ) -> Self {
        let (nick, nick_rx) = watch::channel(config.identity.nick.clone());
        let settings = LinkSettings {
            nick: nick_rx,
            user: config.identity.user().to_string(),
            realname: config.identity.realname.clone(),
            retry: config.upstream.retry_policy(),
            read_timeout: config.upstream.read_timeout(),
            handshake_timeout: config.upstream.tls_handshake_timeout(),
            connector: tls::connector(),
            from_server,
        };
        Self {
            links: Vec::new(),
            tasks: JoinSet::new(),
            settings,
            nick,
            default_tls: config.upstream.tls,
            default_nickserv_password,
        }
    }

    /// Options for a configured network, with daemon defaults filled in.
    pub fn options_for(&self, network: &NetworkConfig) -> LinkOptions {
        LinkOptions {
            password: network.password.clone(),
            nickserv_password: network
                .nickserv_password
                .clone()
                .or_else(|| self.default_nickserv_password.clone()),
            tls: network.tls.unwrap_or(self.default_tls),
        }
    }

    /// Options for a network that is not in the config.
    pub fn default_options(&self, nickserv_password: Option<String>) -> LinkOptions {
        LinkOptions {
            password: None,
            nickserv_password: nickserv_password.or_else(|| self.default_nickserv_password.clone()),
            tls: self.default_tls,
        }
    }

    /// Start a link to `network` unless one already exists.
    ///
    /// Returns whether a new link was started.
    pub fn connect(&mut self, network: &str, options: LinkOptions) -> bool {
        if self.get(network).is_some() {
            return false;
        }
        info!(
            %network,
            tls = ?options.tls,
            attempts = self.settings.retry.max_attempts(),
            backoff = ?self.settings.retry.backoff(),
            "Connecting to IRC server"
        );

        let (external, link) = External::new(network, options, self.settings.clone());
        self.tasks.spawn(link.run().instrument(spans::link(network)));
        self.links.push(external);
        true
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, external: External) {
        self.links.push(external);
    }

    pub fn is_connected(&self, network: &str) -> bool {
        self.get(network).is_some()
    }

    /// Connected networks, oldest first.
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(External::network)
    }

    fn get(&self, network: &str) -> Option<&External> {
        self.links.iter().find(|l| l.network() == network)
    }

    fn lookup(&self, network: &str) -> Result<&External, RouteError> {
        self.get(network)
            .ok_or_else(|| RouteError::UnknownNetwork(network.to_string()))
    }

    fn lookup_mut(&mut self, network: &str) -> Result<&mut External, RouteError> {
        self.links
            .iter_mut()
            .find(|l| l.network() == network)
            .ok_or_else(|| RouteError::UnknownNetwork(network.to_string()))
    }

    pub fn identify(&mut self, network: &str, password: &str) -> Result<(), RouteError> {
        self.lookup_mut(network)?.identify(password);
        Ok(())
    }

    pub fn on_welcome(&mut self, network: &str) -> Result<(), RouteError> {
        self.lookup_mut(network)?.on_welcome();
        Ok(())
    }

    pub fn send_message(&self, network: &str, channel: &str, text: &str) -> Result<(), RouteError> {
        self.lookup(network)?.send_message(channel, text);
        Ok(())
    }

    pub fn send_action(&self, network: &str, channel: &str, text: &str) -> Result<(), RouteError> {
        self.lookup(network)?.send_action(channel, text);
        Ok(())
    }

    pub fn send_raw(&self, network: &str, text: &str) -> Result<(), RouteError> {
        self.lookup(network)?.send_raw(text);
        Ok(())
    }

    pub fn do_command(&self, network: &str, content: &str) -> Result<(), RouteError> {
        self.lookup(network)?.do_command(content);
        Ok(())
    }

    /// Register with this nick on every future (re)connect.
    pub fn set_nick(&self, nick: &str) {
        self.nick.send_replace(nick.to_string());
    }

    /// Close every link. Queued lines are still written.
    pub fn close(&mut self) {
        for link in self.links.drain(..) {
            link.close();
        }
    }

    /// Wait for a link task to fail.
    ///
    /// Never resolves while no link has failed, so it can sit in a
    /// `select!` next to the other event sources. Cancel safe.
    pub async fn failed(&mut self) -> LinkError {
        loop {
            match self.tasks.join_next().await {
                None => std::future::pending::<()>().await,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => return e,
                Some(Err(e)) => error!(error = %e, "Link task panicked or was cancelled"),
            }
        }
    }

    /// Close every link and give the tasks `grace` to finish.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.close();
        let drained = timeout(grace, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Ok(Err(e)) = result {
                    warn!(error = %e, "Link ended with an error during shutdown");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Links did not close in time, aborting");
            self.tasks.abort_all();
        }
    }
}
