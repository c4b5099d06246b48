//! InternalManager - fan-out to local clients.

use bytes::Bytes;
use tracing::{debug, error, info};

use hatcog_proto::Line;

use super::{ClientId, ClientWriter};

struct Client {
    id: ClientId,
    network: String,
    channel: String,
    is_private: bool,
    is_notify: bool,
    writer: ClientWriter,
}

impl Client {
    fn write(&self, payload: &Bytes) {
        // A closed queue means the client is on its way out; Detached follows.
        if self.writer.send(payload.clone()).is_err() {
            debug!(id = self.id, "Client writer has stopped");
        }
    }

    fn is_bound_to(&self, network: &str, channel: &str) -> bool {
        self.network == network && self.channel == channel
    }
}

/// The set of attached clients, in the order they connected.
pub struct InternalManager {
    clients: Vec<Client>,
    /// Most recent private message nobody had a window for.
    last_private: Option<Bytes>,
    nick: String,
}

impl InternalManager {
    pub fn new(nick: &str) -> Self {
        Self {
            clients: Vec::new(),
            last_private: None,
            nick: nick.to_string(),
        }
    }

    /// Register a new client and tell it which nick it speaks as.
    pub fn attach(&mut self, id: ClientId, network: &str, writer: ClientWriter) {
        let client = Client {
            id,
            network: network.to_string(),
            channel: String::new(),
            is_private: false,
            is_notify: false,
            writer,
        };
        self.send_nick(&client);
        self.clients.push(client);
    }

    fn send_nick(&self, client: &Client) {
        let mut line = Line::nick(&self.nick);
        line.network = client.network.clone();
        match line.to_json() {
            Ok(json) => client.write(&Bytes::from(json)),
            Err(e) => error!(error = %e, "Failed to serialize NICK line"),
        }
    }

    /// Record a client's target. A private window receives the pending
    /// private message, if any.
    pub fn bind(&mut self, id: ClientId, network: &str, channel: &str, private: bool) {
        let Some(client) = self.clients.iter_mut().find(|c| c.id == id) else {
            debug!(id, "Bind for unknown client");
            return;
        };
        client.network = network.to_string();
        client.channel = channel.to_string();
        client.is_private = private;
        info!(id, %network, %channel, private, "Client bound");

        if private && let Some(payload) = self.last_private.take() {
            client.write(&payload);
        }
    }

    /// Flip a client's notify flag; returns the new value.
    pub fn toggle_notify(&mut self, id: ClientId) -> Option<bool> {
        let client = self.clients.iter_mut().find(|c| c.id == id)?;
        client.is_notify = !client.is_notify;
        info!(id, channel = %client.channel, notify = client.is_notify, "Notify toggled");
        Some(client.is_notify)
    }

    pub fn detach(&mut self, id: ClientId) {
        self.clients.retain(|c| c.id != id);
    }

    /// Deliver to every client bound to exactly `(network, channel)`.
    /// Returns how many clients it went to.
    pub fn write_channel(&self, network: &str, channel: &str, payload: &Bytes) -> usize {
        let mut count = 0;
        for client in self.clients.iter().filter(|c| c.is_bound_to(network, channel)) {
            client.write(payload);
            count += 1;
        }
        count
    }

    /// Deliver to every client on `network`.
    pub fn write_all(&self, network: &str, payload: &Bytes) -> usize {
        let mut count = 0;
        for client in self.clients.iter().filter(|c| c.network == network) {
            client.write(payload);
            count += 1;
        }
        count
    }

    /// Deliver to the earliest attached client on `network`.
    pub fn write_first(&self, network: &str, payload: &Bytes) -> bool {
        match self.clients.iter().find(|c| c.network == network) {
            Some(client) => {
                client.write(payload);
                true
            }
            None => false,
        }
    }

    /// Hold a private message for the next private window.
    pub fn set_last_private(&mut self, payload: Bytes) {
        self.last_private = Some(payload);
    }

    /// Distinct channels bound on `network`, private windows excluded,
    /// in attach order.
    pub fn channels(&self, network: &str) -> Vec<String> {
        let mut channels: Vec<String> = Vec::new();
        for client in &self.clients {
            if client.network == network
                && !client.is_private
                && !client.channel.is_empty()
                && !channels.contains(&client.channel)
            {
                channels.push(client.channel.clone());
            }
        }
        channels
    }

    pub fn has_channel(&self, network: &str, channel: &str) -> bool {
        self.clients.iter().any(|c| c.is_bound_to(network, channel))
    }

    /// Whether any client bound to the channel asked for notifications.
    pub fn is_notify(&self, network: &str, channel: &str) -> bool {
        self.clients
            .iter()
            .any(|c| c.is_bound_to(network, channel) && c.is_notify)
    }

    /// Nick pushed to clients that attach from now on.
    pub fn set_nick(&mut self, nick: &str) {
        self.nick = nick.to_string();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop every client. Their writer tasks shut the sockets down.
    pub fn close(&mut self) {
        self.clients.clear();
        self.last_private = None;
    }
}
