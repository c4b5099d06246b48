//! Listener - accepts local client connections.

use bytes::Bytes;
use futures_util::SinkExt;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedWrite};
use tracing::{Instrument, debug, error, info, instrument};

use super::connection::Connection;
use super::{ClientEvent, ClientId};
use crate::telemetry::spans;

/// Accepts clients and spawns their reader and writer tasks.
pub struct Listener {
    listener: TcpListener,
    from_user: mpsc::Sender<ClientEvent>,
    default_network: String,
    next_id: ClientId,
}

impl Listener {
    /// Bind the client listener.
    ///
    /// Clients start out scoped to `default_network` until they send
    /// `/connect`.
    pub async fn bind(
        addr: SocketAddr,
        from_user: mpsc::Sender<ClientEvent>,
        default_network: String,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Client listener bound");
        Ok(Self {
            listener,
            from_user,
            default_network,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until the server stops listening for events.
    #[instrument(skip(self), name = "listener")]
    pub async fn run(mut self) {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept client connection");
                    continue;
                }
            };

            let id = self.next_id;
            self.next_id += 1;
            info!(id, %addr, "Client connected");

            let (reader, writer) = stream.into_split();
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(write_loop(rx, writer).instrument(spans::client(id, &addr)));

            let attached = ClientEvent::Attached {
                id,
                network: self.default_network.clone(),
                writer: tx,
            };
            if self.from_user.send(attached).await.is_err() {
                debug!("Server loop has stopped, listener exiting");
                return;
            }

            let connection = Connection::new(id, self.default_network.clone(), self.from_user.clone());
            tokio::spawn(connection.run(reader).instrument(spans::client(id, &addr)));
        }
    }
}

/// Drain a client's queue onto its socket.
async fn write_loop(mut rx: mpsc::UnboundedReceiver<Bytes>, writer: OwnedWriteHalf) {
    let mut sink = FramedWrite::new(writer, BytesCodec::new());
    while let Some(payload) = rx.recv().await {
        if let Err(e) = sink.send(payload).await {
            debug!(error = %e, "Client write failed");
            return;
        }
    }
    // Queue closed by the manager: shut the socket down.
    if let Err(e) = SinkExt::<Bytes>::close(&mut sink).await {
        debug!(error = %e, "Client close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_write_loop_delivers_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        let (_reader, writer) = server_side.into_split();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(rx, writer));
        tx.send(Bytes::from_static(b"{\"command\":\"NICK\"}\n")).unwrap();
        drop(tx);
        task.await.unwrap();

        // Everything queued arrives, then the socket is shut down.
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"{\"command\":\"NICK\"}\n");
    }
}
