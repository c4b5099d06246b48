//! Read loop for one local client.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use hatcog_proto::MAX_LINE_LEN;

use super::{ClientEvent, ClientId, Message};
use crate::external::split_net_pass;

/// What a client's read loop knows about it.
pub(crate) struct Connection {
    id: ClientId,
    network: String,
    /// Channel or nick; empty until the client binds.
    channel: String,
    is_private: bool,
    from_user: mpsc::Sender<ClientEvent>,
}

/// `/verb <arg> ...` → first argument, if `content` is that command.
fn command_arg<'a>(content: &'a str, verb: &str) -> Option<&'a str> {
    let mut words = content.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case(verb) {
        return None;
    }
    words.next()
}

fn is_command(content: &str, verb: &str) -> bool {
    content
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case(verb))
}

impl Connection {
    pub(crate) fn new(id: ClientId, network: String, from_user: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            id,
            network,
            channel: String::new(),
            is_private: false,
            from_user,
        }
    }

    /// Read lines until the client goes away, then part and detach.
    pub(crate) async fn run<R: AsyncRead + Unpin>(mut self, reader: R) {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LEN));

        while let Some(read) = lines.next().await {
            match read {
                Ok(content) => {
                    if !self.on_line(content).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Client read failed");
                    break;
                }
            }
        }
        self.on_eof().await;
    }

    /// Returns false once the server is gone.
    async fn on_line(&mut self, content: String) -> bool {
        let content = content.trim_end_matches('\r');
        if content.trim().is_empty() {
            return true;
        }
        debug!(%content, "Client line");

        if self.channel.is_empty() {
            if is_command(content, "/private") {
                // Opening a query window is not an IRC command.
                if let Some(nick) = command_arg(content, "/private") {
                    self.channel = nick.to_string();
                    self.is_private = true;
                    return self.send_bound().await;
                }
                return true;
            }
            if let Some(channel) = command_arg(content, "/join") {
                self.channel = channel.to_string();
                if !self.send_bound().await {
                    return false;
                }
            } else if let Some(arg) = command_arg(content, "/connect") {
                self.network = split_net_pass(arg).0;
                if !self.send_bound().await {
                    return false;
                }
            }
        }

        if is_command(content, "/notify") {
            return self.send(ClientEvent::ToggleNotify { id: self.id }).await;
        }

        let message = Message {
            network: self.network.clone(),
            channel: self.channel.clone(),
            content: content.to_string(),
        };
        self.send(ClientEvent::Message(message)).await
    }

    async fn on_eof(&mut self) {
        info!(channel = %self.channel, "Client disconnected");

        if !self.channel.is_empty() && !self.is_private {
            let part = Message {
                network: self.network.clone(),
                channel: self.channel.clone(),
                content: format!("/part {}", self.channel),
            };
            if !self.send(ClientEvent::Message(part)).await {
                return;
            }
        }
        self.send(ClientEvent::Detached { id: self.id }).await;
    }

    async fn send_bound(&self) -> bool {
        self.send(ClientEvent::Bound {
            id: self.id,
            network: self.network.clone(),
            channel: self.channel.clone(),
            private: self.is_private,
        })
        .await
    }

    async fn send(&self, event: ClientEvent) -> bool {
        if self.from_user.send(event).await.is_err() {
            debug!("Server loop has stopped");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    /// Feed `input` through a connection and collect what it reports.
    async fn events_for(network: &str, input: &str) -> Vec<ClientEvent> {
        let (tx, mut rx) = mpsc::channel(1);
        let (mut client, server) = tokio::io::duplex(1024);
        let connection = Connection::new(7, network.to_string(), tx);
        let task = tokio::spawn(connection.run(server));

        client.write_all(input.as_bytes()).await.unwrap();
        drop(client);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        task.await.unwrap();
        events
    }

    fn message(event: &ClientEvent) -> &Message {
        match event {
            ClientEvent::Message(m) => m,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_binds_and_forwards() {
        let events = events_for("irc.libera.chat:6697", "/join #rust\nhello\n").await;

        assert!(matches!(
            &events[0],
            ClientEvent::Bound { id: 7, channel, private: false, .. } if channel == "#rust"
        ));
        assert_eq!(message(&events[1]).content, "/join #rust");
        assert_eq!(message(&events[2]).content, "hello");
        assert_eq!(message(&events[2]).channel, "#rust");
        assert_eq!(message(&events[2]).network, "irc.libera.chat:6697");

        // EOF parts the channel, then detaches.
        assert_eq!(message(&events[3]).content, "/part #rust");
        assert!(matches!(events[4], ClientEvent::Detached { id: 7 }));
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn test_private_is_not_forwarded_and_not_parted() {
        let events = events_for("net:6667", "/private bob\r\nhi bob\r\n").await;

        assert!(matches!(
            &events[0],
            ClientEvent::Bound { channel, private: true, .. } if channel == "bob"
        ));
        assert_eq!(message(&events[1]).content, "hi bob");
        assert_eq!(message(&events[1]).channel, "bob");
        assert!(matches!(events[2], ClientEvent::Detached { .. }));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_connect_rescopes_network() {
        let events = events_for("", "/connect irc.oftc.net:6697:pw\n/join #debian\n").await;

        assert!(matches!(
            &events[0],
            ClientEvent::Bound { network, channel, .. }
                if network == "irc.oftc.net:6697" && channel.is_empty()
        ));
        assert_eq!(message(&events[1]).content, "/connect irc.oftc.net:6697:pw");
        assert!(matches!(
            &events[2],
            ClientEvent::Bound { network, channel, .. }
                if network == "irc.oftc.net:6697" && channel == "#debian"
        ));
        assert_eq!(message(&events[3]).network, "irc.oftc.net:6697");
    }

    #[tokio::test]
    async fn test_notify_toggles_without_forwarding() {
        let events = events_for("net:6667", "/join #rust\n/notify\n").await;

        assert!(matches!(events[2], ClientEvent::ToggleNotify { id: 7 }));
        assert_eq!(message(&events[3]).content, "/part #rust");
    }

    #[tokio::test]
    async fn test_only_first_binding_counts() {
        let events = events_for("net:6667", "/join #rust\n/join #go\n").await;

        let bound = events
            .iter()
            .filter(|e| matches!(e, ClientEvent::Bound { .. }))
            .count();
        assert_eq!(bound, 1);
        assert_eq!(message(&events[2]).content, "/join #go");
        assert_eq!(message(&events[2]).channel, "#rust");
    }

    #[tokio::test]
    async fn test_unbound_chat_is_forwarded_with_empty_channel() {
        let events = events_for("net:6667", "hello\n").await;

        assert_eq!(message(&events[0]).channel, "");
        assert!(matches!(events[1], ClientEvent::Detached { .. }));
    }

    #[test]
    fn test_command_arg() {
        assert_eq!(command_arg("/join #rust", "/join"), Some("#rust"));
        assert_eq!(command_arg("/JOIN  #rust key", "/join"), Some("#rust"));
        assert_eq!(command_arg("/join", "/join"), None);
        assert_eq!(command_arg("/joined #rust", "/join"), None);
        assert_eq!(command_arg("join #rust", "/join"), None);
    }
}
