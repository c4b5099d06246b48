//! The task that owns an upstream socket.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use hatcog_proto::{Command, Line, LineCodec, ProtocolError, ctcp};

use super::retry::{ConnectOutcome, RetryPolicy};
use super::stream::IrcStream;
use super::{VERSION, tls};
use crate::config::TlsMode;
use crate::error::{LinkError, is_disconnect};

type LineReader = FramedRead<ReadHalf<IrcStream>, LineCodec>;
type LineWriter = FramedWrite<WriteHalf<IrcStream>, LineCodec>;

/// Everything a link needs that is the same for every network.
#[derive(Clone)]
pub(crate) struct LinkSettings {
    pub nick: watch::Receiver<String>,
    pub user: String,
    pub realname: String,
    pub retry: RetryPolicy,
    pub read_timeout: Duration,
    pub handshake_timeout: Duration,
    pub connector: TlsConnector,
    pub from_server: mpsc::Sender<Line>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Socket is gone; dial again.
    Disconnected,
    /// Asked to stop, or nobody is listening any more.
    Closed,
}

/// One upstream connection, across reconnects.
pub(crate) struct Link {
    network: String,
    password: Option<String>,
    tls: TlsMode,
    settings: LinkSettings,
    outbound: mpsc::UnboundedReceiver<String>,
    closing: Arc<AtomicBool>,
}

impl Link {
    pub(crate) fn new(
        network: &str,
        password: Option<String>,
        tls: TlsMode,
        settings: LinkSettings,
        outbound: mpsc::UnboundedReceiver<String>,
        closing: Arc<AtomicBool>,
    ) -> Self {
        Self {
            network: network.to_string(),
            password,
            tls,
            settings,
            outbound,
            closing,
        }
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Connect, consume, and reconnect until closed.
    ///
    /// Returns an error only when the network is unreachable after every
    /// attempt, or a write fails for a reason other than a lost connection.
    pub(crate) async fn run(mut self) -> Result<(), LinkError> {
        loop {
            let stream = match self.connect().await {
                ConnectOutcome::Connected(stream) => stream,
                ConnectOutcome::Exhausted { attempts, last } => {
                    error!(attempts, error = %last, "Network unreachable");
                    return Err(LinkError::Exhausted {
                        network: self.network.clone(),
                        attempts,
                        last,
                    });
                }
            };
            if self.is_closing() {
                return Ok(());
            }
            info!(tls = stream.is_tls(), "Connected to IRC server");

            match self.session(stream).await? {
                Flow::Closed => {
                    info!("Link closed");
                    return Ok(());
                }
                Flow::Disconnected | Flow::Continue => {
                    info!("Reconnecting");
                }
            }
        }
    }

    async fn connect(&self) -> ConnectOutcome<IrcStream> {
        let policy = self.settings.retry;
        policy
            .run(move |attempt| {
                debug!(attempt, "Dialing");
                tls::dial(
                    &self.settings.connector,
                    &self.network,
                    self.tls,
                    self.settings.handshake_timeout,
                )
            })
            .await
    }

    /// Registration lines, in the order they must be sent.
    fn registration(&self) -> Vec<String> {
        let nick = self.settings.nick.borrow().clone();
        let mut lines = Vec::with_capacity(3);
        if let Some(password) = &self.password {
            lines.push(format!("PASS {password}"));
        }
        lines.push(format!("NICK {nick}"));
        lines.push(format!(
            "USER {} localhost localhost :{}",
            self.settings.user, self.settings.realname
        ));
        lines
    }

    async fn session(&mut self, stream: IrcStream) -> Result<Flow, LinkError> {
        let (reader, writer) = tokio::io::split(stream);
        let mut lines: LineReader = FramedRead::new(reader, LineCodec::new());
        let mut sink: LineWriter = FramedWrite::new(writer, LineCodec::new());
        let read_timeout = self.settings.read_timeout;

        for text in self.registration() {
            if !self.write(&mut sink, &text).await? {
                return Ok(Flow::Disconnected);
            }
        }

        loop {
            if self.is_closing() {
                self.flush_outbound(&mut sink).await?;
                return Ok(Flow::Closed);
            }

            let flow = tokio::select! {
                outbound = self.outbound.recv() => match outbound {
                    Some(text) => {
                        if self.write(&mut sink, &text).await? {
                            Flow::Continue
                        } else {
                            Flow::Disconnected
                        }
                    }
                    None => Flow::Closed,
                },
                read = timeout(read_timeout, lines.next()) => match read {
                    // Quiet socket; loop round to look at the closing flag.
                    Err(_) => Flow::Continue,
                    Ok(None) => {
                        info!("IRC server closed the connection");
                        Flow::Disconnected
                    }
                    Ok(Some(Err(ProtocolError::Io(e)))) => {
                        warn!(error = %e, "Read from IRC server failed");
                        Flow::Disconnected
                    }
                    Ok(Some(Ok(raw))) => self.on_raw(&mut sink, raw).await?,
                },
            };

            if flow != Flow::Continue {
                return Ok(flow);
            }
        }
    }

    /// Handle one line from the network.
    async fn on_raw(&mut self, sink: &mut LineWriter, raw: String) -> Result<Flow, LinkError> {
        debug!(target: "hatcogd::raw", network = %self.network, "<-- {}", raw);

        let mut line = match Line::parse(&raw) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, raw = %raw, "Dropping invalid line");
                return Ok(Flow::Continue);
            }
        };
        line.network = self.network.clone();

        let reply = match line.kind() {
            Command::Ping => {
                let token = match line.args.first() {
                    Some(arg) if line.content.is_empty() => arg.as_str(),
                    _ => line.content.as_str(),
                };
                Some(format!("PONG :{token}"))
            }
            Command::Version => Some(format!(
                "NOTICE {} :{}",
                line.user,
                ctcp::version_reply(VERSION)
            )),
            _ => None,
        };
        if let Some(reply) = reply
            && !self.write(sink, &reply).await?
        {
            return Ok(Flow::Disconnected);
        }

        if self.settings.from_server.send(line).await.is_err() {
            debug!("Server loop has stopped");
            self.flush_outbound(sink).await?;
            return Ok(Flow::Closed);
        }
        Ok(Flow::Continue)
    }

    /// Write what the router queued before letting go, e.g. QUIT.
    async fn flush_outbound(&mut self, sink: &mut LineWriter) -> Result<(), LinkError> {
        while let Ok(text) = self.outbound.try_recv() {
            if !self.write(sink, &text).await? {
                break;
            }
        }
        Ok(())
    }

    /// Write one line. `Ok(false)` means the connection is gone.
    async fn write(&self, sink: &mut LineWriter, text: &str) -> Result<bool, LinkError> {
        debug!(target: "hatcogd::raw", network = %self.network, "--> {}", text);

        match sink.send(text).await {
            Ok(()) => Ok(true),
            Err(ProtocolError::Io(e)) if is_disconnect(&e) => {
                warn!(error = %e, "Connection lost while writing");
                Ok(false)
            }
            Err(ProtocolError::Io(source)) => Err(LinkError::Write {
                network: self.network.clone(),
                source,
            }),
        }
    }
}
