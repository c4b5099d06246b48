//! Upstream IRC links.
//!
//! Each network gets an [`External`] handle, owned by the
//! [`ExternalManager`], and a link task that owns the socket. The handle
//! queues outbound text; the task registers, answers `PING`/`VERSION`,
//! forwards every parsed line to the server, and reconnects when the
//! network drops us.

mod link;
mod manager;
mod retry;
pub mod stream;
pub mod tls;

pub use manager::{ExternalManager, LinkOptions};
pub use retry::RetryPolicy;

pub(crate) use link::{Link, LinkSettings};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

use hatcog_proto::ctcp;

/// Reply to CTCP VERSION queries.
pub const VERSION: &str = concat!("hatcog v", env!("CARGO_PKG_VERSION"));

/// Handle to one upstream link.
///
/// Cheap to call from the router: every send is a push onto an unbounded
/// queue drained by the link task.
#[derive(Debug)]
pub struct External {
    network: String,
    outbound: mpsc::UnboundedSender<String>,
    closing: Arc<AtomicBool>,
    is_identified: bool,
    nickserv_password: Option<String>,
}

impl External {
    /// Create a handle and the link task that serves it.
    pub(crate) fn new(
        network: &str,
        options: LinkOptions,
        settings: LinkSettings,
    ) -> (Self, Link) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closing = Arc::new(AtomicBool::new(false));

        let external = Self {
            network: network.to_string(),
            outbound: tx,
            closing: Arc::clone(&closing),
            is_identified: false,
            nickserv_password: options.nickserv_password,
        };
        let link = Link::new(network, options.password, options.tls, settings, rx, closing);
        (external, link)
    }

    /// A handle with no link task; the receiver sees everything sent.
    #[cfg(test)]
    pub(crate) fn detached(
        network: &str,
        nickserv_password: Option<&str>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let external = Self {
            network: network.to_string(),
            outbound: tx,
            closing: Arc::new(AtomicBool::new(false)),
            is_identified: false,
            nickserv_password: nickserv_password.map(str::to_string),
        };
        (external, rx)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    #[cfg(test)]
    pub fn is_identified(&self) -> bool {
        self.is_identified
    }

    /// Identify with NickServ, at most once per connection lifetime.
    ///
    /// Returns whether anything was sent.
    pub fn identify(&mut self, password: &str) -> bool {
        if self.is_identified {
            return false;
        }
        info!(network = %self.network, "Identifying with NickServ");
        self.send_message("NickServ", &format!("identify {password}"));
        self.is_identified = true;
        true
    }

    /// The server welcomed us: a new connection lifetime starts, so identify
    /// again if we have a password for this network.
    pub fn on_welcome(&mut self) {
        self.is_identified = false;
        if let Some(password) = self.nickserv_password.clone() {
            self.identify(&password);
        }
    }

    /// Send a regular chat message.
    pub fn send_message(&self, channel: &str, text: &str) {
        self.send_raw(format!("PRIVMSG {channel} :{text}"));
    }

    /// Send a `/me` action.
    pub fn send_action(&self, channel: &str, text: &str) {
        self.send_raw(format!("PRIVMSG {channel} :{}", ctcp::action(text)));
    }

    /// Queue a raw line; the link adds the terminator.
    pub fn send_raw(&self, text: impl Into<String>) {
        if self.outbound.send(text.into()).is_err() {
            warn!(network = %self.network, "Link task has stopped, dropping outbound line");
        }
    }

    /// Send a slash command as raw IRC: the `/` is dropped, the verb is
    /// uppercased, and `/msg <target> <text>` becomes
    /// `PRIVMSG <target> :<text>`.
    pub fn do_command(&self, content: &str) {
        self.send_raw(expand_command(content));
    }

    /// Ask the link to finish. Queued lines are still written.
    pub fn close(&self) {
        self.closing.store(true, Ordering::Release);
    }
}

/// Turn a client slash command into an IRC line.
pub fn expand_command(content: &str) -> String {
    let command = content.strip_prefix('/').unwrap_or(content);
    let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));

    if verb.eq_ignore_ascii_case("msg") {
        let rest = rest.trim_start();
        return match rest.split_once(' ') {
            Some((target, text)) => format!("PRIVMSG {target} :{text}"),
            None => format!("PRIVMSG {rest}"),
        };
    }
    if rest.is_empty() {
        verb.to_ascii_uppercase()
    } else {
        format!("{} {rest}", verb.to_ascii_uppercase())
    }
}

/// Split a `/connect` argument, `host:port[:password]`.
pub fn split_net_pass(arg: &str) -> (String, Option<String>) {
    let mut parts = arg.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), Some(password)) if !password.is_empty() => {
            (format!("{host}:{port}"), Some(password.to_string()))
        }
        (Some(host), Some(port), Some(_)) => (format!("{host}:{port}"), None),
        _ => (arg.to_string(), None),
    }
}
