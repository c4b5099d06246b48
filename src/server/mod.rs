//! Server - the routing core.
//!
//! One task owns both managers and reads both channels: parsed lines from
//! every upstream link, and events from every local client. All routing
//! state (current nick, client set, pending private message) is touched
//! only here, one event at a time.

mod commands;

pub use commands::UserCommand;

use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use hatcog_proto::{Command, Line, RPL_WELCOME};

use crate::config::{Config, NetworkConfig, has_port};
use crate::error::{LinkError, RouteError};
use crate::external::{ExternalManager, LinkOptions, split_net_pass};
use crate::internal::{ClientEvent, InternalManager, Listener, Message};
use crate::notify::Notifier;

/// Lifecycle of the routing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Closed,
}

/// Side effect a line should trigger on top of routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    None,
    Notify,
    NotifyAndBeep,
}

/// Owns both managers and routes every event between them.
pub struct Server {
    state: State,
    nick: String,
    external: ExternalManager,
    internal: InternalManager,
    notifier: Notifier,
    networks: Vec<NetworkConfig>,
    from_server: mpsc::Receiver<Line>,
    from_user: mpsc::Receiver<ClientEvent>,
    listener: Option<Listener>,
    shutdown_grace: Duration,
}

impl Server {
    /// Bind the client listener and start the autoconnect networks.
    ///
    /// `password` is the NickServ password for networks configured
    /// without one.
    pub async fn bind(config: &Config, password: Option<String>) -> anyhow::Result<Self> {
        // Capacity 1: a busy router slows every producer down equally.
        let (server_tx, from_server) = mpsc::channel(1);
        let (user_tx, from_user) = mpsc::channel(1);

        let default_network = config.default_network().unwrap_or_default().to_string();
        let listener = Listener::bind(config.listen.address, user_tx, default_network).await?;

        let mut external = ExternalManager::new(config, server_tx, password);
        for network in config.networks.iter().filter(|n| n.autoconnect) {
            let options = external.options_for(network);
            external.connect(&network.address, options);
        }

        Ok(Self::new(config, external, from_server, from_user, Some(listener)))
    }

    pub(crate) fn new(
        config: &Config,
        external: ExternalManager,
        from_server: mpsc::Receiver<Line>,
        from_user: mpsc::Receiver<ClientEvent>,
        listener: Option<Listener>,
    ) -> Self {
        Self {
            state: State::Running,
            nick: config.identity.nick.clone(),
            external,
            internal: InternalManager::new(&config.identity.nick),
            notifier: Notifier::new(&config.commands),
            networks: config.networks.clone(),
            from_server,
            from_user,
            listener,
            shutdown_grace: config.upstream.read_timeout() + Duration::from_secs(2),
        }
    }

    /// Address the client listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }

    /// `Closed` once `/quit` was seen.
    pub fn state(&self) -> State {
        self.state
    }

    /// Nick we are known by on every network.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Route events until `/quit`, `shutdown` resolving, or a fatal link
    /// error. Links and clients are closed before returning.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), LinkError> {
        let listener = self.listener.take().map(|l| tokio::spawn(l.run()));
        tokio::pin!(shutdown);
        info!(nick = %self.nick(), "Server running");

        let result = loop {
            if self.state() == State::Closed {
                break Ok(());
            }
            tokio::select! {
                Some(line) = self.from_server.recv() => self.on_server(line),
                Some(event) = self.from_user.recv() => self.on_user(event),
                err = self.external.failed() => {
                    error!(error = %err, "Upstream link failed");
                    break Err(err);
                }
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
            }
        };

        if let Some(listener) = listener {
            listener.abort();
        }
        self.close().await;
        result
    }

    async fn close(&mut self) {
        self.state = State::Closed;
        let networks: Vec<&str> = self.external.networks().collect();
        info!(?networks, "Closing upstream links");
        // Links must see the closing flag before a blocked delivery fails.
        self.external.close();
        // Unblock producers waiting on a full channel.
        self.from_server.close();
        self.from_user.close();
        if !self.internal.is_empty() {
            info!(clients = self.internal.len(), "Dropping clients");
        }
        self.internal.close();
        self.external.shutdown(self.shutdown_grace).await;
        info!("Server closed");
    }

    fn set_nick(&mut self, nick: &str) {
        info!(old = %self.nick, new = %nick, "Nick changed");
        self.nick = nick.to_string();
        self.internal.set_nick(nick);
        self.external.set_nick(nick);
    }

    /// Act on a line from an upstream network.
    pub(crate) fn on_server(&mut self, line: Line) {
        let kind = line.kind();
        if kind.is_info() {
            info!(network = %line.network, "{}", line.content);
        }

        match kind {
            Command::Numeric(RPL_WELCOME) => {
                if let Err(e) = self.external.on_welcome(&line.network) {
                    warn!(error = %e, "Welcome from unmanaged network");
                }
                self.rejoin(&line.network);
            }
            Command::Nick if !line.user.is_empty() && line.user == self.nick => {
                let new_nick = match line.args.first() {
                    Some(arg) if line.content.is_empty() => arg.clone(),
                    _ => line.content.clone(),
                };
                self.set_nick(&new_nick);
            }
            _ => {}
        }

        let payload = match line.to_json() {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                error!(error = %e, raw = %line.raw, "Failed to serialize line");
                return;
            }
        };

        let is_private = line.is_private();
        if is_private && !self.internal.has_channel(&line.network, &line.channel) {
            self.internal.set_last_private(payload.clone());
            self.open_private(&line, &payload);
        } else if line.channel.is_empty() && !kind.is_channel_required() {
            self.internal.write_all(&line.network, &payload);
        } else {
            self.internal.write_channel(&line.network, &line.channel, &payload);
        }

        match self.alert_for(&line) {
            Alert::NotifyAndBeep => {
                self.notifier.notify(&line);
                self.notifier.beep();
            }
            Alert::Notify => self.notifier.notify(&line),
            Alert::None => {}
        }
    }

    /// Join every channel a client is bound to on `network`. Runs on each
    /// welcome, so a reconnected link picks its channels back up.
    fn rejoin(&self, network: &str) {
        for channel in self.internal.channels(network) {
            info!(%network, %channel, "Rejoining channel");
            if let Err(e) = self.external.send_raw(network, &format!("JOIN {channel}")) {
                warn!(error = %e, "Rejoin failed");
            }
        }
    }

    /// Show a private message that has no window yet.
    fn open_private(&self, line: &Line, payload: &Bytes) {
        if self.notifier.open_private(&line.user) {
            info!(nick = %line.user, "Opening private chat window");
        } else if !self.internal.write_first(&line.network, payload) {
            debug!(nick = %line.user, "No client to show private message");
        }
    }

    pub(crate) fn alert_for(&self, line: &Line) -> Alert {
        if !line.kind().is_message() {
            return Alert::None;
        }
        let mentioned = !self.nick.is_empty() && line.content.contains(&self.nick);
        if line.is_private() || mentioned {
            Alert::NotifyAndBeep
        } else if self.internal.is_notify(&line.network, &line.channel) {
            Alert::Notify
        } else {
            Alert::None
        }
    }

    /// Act on an event from a local client.
    pub(crate) fn on_user(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Attached {
                id,
                network,
                writer,
            } => self.internal.attach(id, &network, writer),
            ClientEvent::Bound {
                id,
                network,
                channel,
                private,
            } => self.internal.bind(id, &network, &channel, private),
            ClientEvent::ToggleNotify { id } => {
                self.internal.toggle_notify(id);
            }
            ClientEvent::Detached { id } => self.internal.detach(id),
            ClientEvent::Message(message) => {
                if let Err(e) = self.on_message(&message) {
                    warn!(
                        error = %e,
                        network = %message.network,
                        channel = %message.channel,
                        "Dropping client message"
                    );
                }
            }
        }
    }

    fn on_message(&mut self, message: &Message) -> Result<(), RouteError> {
        let Message {
            network,
            channel,
            content,
        } = message;

        match UserCommand::parse(content) {
            UserCommand::Pw(password) => self.external.identify(network, password),
            UserCommand::Me(text) => {
                require_channel(channel)?;
                self.external.send_action(network, channel, text)
            }
            UserCommand::Nick(nick) => {
                self.set_nick(nick);
                self.external.do_command(network, content)
            }
            UserCommand::Connect(arg) => {
                self.connect(arg);
                Ok(())
            }
            UserCommand::Quit => {
                info!("Quit requested by client");
                let sent = self.external.do_command(network, content);
                self.state = State::Closed;
                sent
            }
            UserCommand::Raw(command) => self.external.do_command(network, command),
            UserCommand::Chat(text) => {
                require_channel(channel)?;
                self.external.send_message(network, channel, text)
            }
        }
    }

    /// `/connect host:port[:password]`
    fn connect(&mut self, arg: &str) {
        let (network, password) = split_net_pass(arg);
        if !has_port(&network) {
            warn!(%network, "Ignoring /connect without a port");
            return;
        }

        let mut options: LinkOptions = match self.networks.iter().find(|n| n.address == network) {
            Some(configured) => self.external.options_for(configured),
            None => self.external.default_options(None),
        };
        if password.is_some() {
            options.nickserv_password = password;
        }
        if !self.external.connect(&network, options) {
            debug!(%network, "Already connected");
        }
    }
}

fn require_channel(channel: &str) -> Result<(), RouteError> {
    if channel.is_empty() {
        Err(RouteError::NotBound)
    } else {
        Ok(())
    }
}
