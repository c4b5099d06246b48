//! Local clients.
//!
//! Clients speak plain newline-terminated text to the daemon and receive
//! [`hatcog_proto::Line`]s as JSON records. Each accepted socket gets a
//! reader task and a writer task; everything the reader learns is sent to
//! the server as a [`ClientEvent`], and only the server mutates the
//! [`InternalManager`].

mod connection;
mod listener;
mod manager;

pub use listener::Listener;
pub use manager::InternalManager;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Identifies one accepted client connection.
pub type ClientId = u64;

/// Queue feeding a client's writer task.
pub type ClientWriter = mpsc::UnboundedSender<Bytes>;

/// One line typed by a client, with the routing target it was typed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub network: String,
    pub channel: String,
    pub content: String,
}

/// Everything a client connection tells the server.
#[derive(Debug)]
pub enum ClientEvent {
    /// A client connected.
    Attached {
        id: ClientId,
        network: String,
        writer: ClientWriter,
    },
    /// The client's first line set its target.
    Bound {
        id: ClientId,
        network: String,
        channel: String,
        private: bool,
    },
    /// `/notify`
    ToggleNotify { id: ClientId },
    Message(Message),
    /// The client went away.
    Detached { id: ClientId },
}
