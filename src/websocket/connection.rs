//! WebSocket connection lifecycle management.
//!
//! [`ConnectionSupervisor`] connects, performs the engine.io probe, keeps a
//! heartbeat running, subscribes once the namespace handshake completes,
//! feeds decoded events to the [`TradingSession`] and reconnects with
//! exponential backoff when the connection drops. The session survives
//! reconnects, so the bar window keeps growing across them.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};
use tungstenite::Message;

use super::frame::{self, Frame, PING, PROBE};
use super::{SharedWriter, Subscription, WsReader, connect, send_subscriptions, send_text};
use crate::config::{SessionBootstrap, StreamConfig};
use crate::session::TradingSession;
use crate::sink::{SinkEvent, SinkSender};

/// Observable lifecycle of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket is open; waiting for the namespace ack before subscribing.
    Handshaking,
    Subscribed,
    /// At least one event has arrived since subscribing.
    Streaming,
    Closing,
}

/// Why the reader loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectReason {
    /// The connection was lost or errored.
    ConnectionError,
    /// The server closed the socket or dropped the namespace.
    ServerClosed,
    /// Nothing arrived within the configured read timeout.
    ReadTimeout,
    /// The sink receiver was dropped (app shutting down).
    Shutdown,
}

/// Background heartbeat bound to one connection. Aborted on drop.
struct Heartbeat(JoinHandle<()>);

impl Heartbeat {
    fn spawn(writer: SharedWriter, interval: Duration) -> Self {
        Self(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = send_text(&writer, PING).await {
                    warn!("Heartbeat failed: {e}");
                    break;
                }
            }
        }))
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Owns the feed connection and the session it feeds.
pub struct ConnectionSupervisor {
    bootstrap: SessionBootstrap,
    config: StreamConfig,
    session: TradingSession,
    sink: SinkSender,
    state: ConnectionState,
    /// Whether the current connection got as far as subscribing.
    subscribed: bool,
}

impl ConnectionSupervisor {
    #[must_use]
    pub fn new(bootstrap: SessionBootstrap, config: StreamConfig, sink: SinkSender) -> Self {
        let session = TradingSession::new(bootstrap.symbol.clone(), &config);
        Self {
            bootstrap,
            config,
            session,
            sink,
            state: ConnectionState::Disconnected,
            subscribed: false,
        }
    }

    /// Replaces the session, e.g. to resume from previously collected bars.
    #[must_use]
    pub fn with_session(mut self, session: TradingSession) -> Self {
        self.session = session;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the supervisor until the sink is dropped or the reconnect
    /// budget is exhausted, then returns the session.
    ///
    /// Backoff starts at the configured reconnect delay, doubles after each
    /// failed attempt up to the ceiling and resets once a connection
    /// reaches [`ConnectionState::Subscribed`].
    pub async fn run(mut self) -> TradingSession {
        let initial = self.config.reconnect_delay();
        let ceiling = self.config.max_reconnect_delay();
        let mut backoff = initial;
        let mut failures: u32 = 0;

        loop {
            if self.sink.is_closed() {
                break;
            }

            self.transition(ConnectionState::Connecting);
            info!(url = %self.bootstrap.endpoint, symbol = %self.bootstrap.symbol, "Connecting to WebSocket");

            self.subscribed = false;
            let reason = match connect(&self.bootstrap).await {
                Ok((writer, reader)) => self.run_connection(writer, reader).await,
                Err(e) => {
                    error!("Connection failed: {e}");
                    DisconnectReason::ConnectionError
                }
            };
            self.transition(ConnectionState::Disconnected);

            if reason == DisconnectReason::Shutdown {
                break;
            }

            if self.subscribed {
                backoff = initial;
                failures = 0;
            } else {
                failures += 1;
            }
            if let Some(limit) = self.config.max_reconnect_attempts {
                if failures >= limit {
                    error!(failures, "Reconnect attempts exhausted, giving up");
                    break;
                }
            }

            info!(
                reason = ?reason,
                backoff_ms = backoff.as_millis() as u64,
                "Connection lost, backing off"
            );
            let sink = self.sink.clone();
            tokio::select! {
                () = tokio::time::sleep(backoff) => {}
                () = sink.closed() => break,
            }
            backoff = next_backoff(backoff, ceiling);
        }

        info!(
            bars = self.session.bars().len(),
            signals = self.session.signals().len(),
            "Connection supervisor shutting down"
        );
        self.session
    }

    /// Drives one live connection from probe to close.
    async fn run_connection(
        &mut self,
        writer: super::WsWriter,
        reader: WsReader,
    ) -> DisconnectReason {
        let writer: SharedWriter = std::sync::Arc::new(tokio::sync::Mutex::new(writer));
        self.transition(ConnectionState::Handshaking);

        if let Err(e) = send_text(&writer, PROBE).await {
            warn!("Probe failed: {e}");
            return DisconnectReason::ConnectionError;
        }
        tokio::time::sleep(self.config.probe_delay()).await;

        let heartbeat = Heartbeat::spawn(writer.clone(), self.config.heartbeat_interval());
        let reason = self.read_loop(reader, &writer).await;
        drop(heartbeat);

        self.transition(ConnectionState::Closing);
        if let Err(e) = writer.lock().await.close().await {
            debug!("Close after disconnect failed: {e}");
        }

        reason
    }

    /// Reads messages until disconnection, timeout or shutdown.
    ///
    /// Subscriptions go out on the namespace ack or when the subscribe
    /// delay expires, whichever comes first.
    async fn read_loop(&mut self, mut read: WsReader, writer: &SharedWriter) -> DisconnectReason {
        let sink = self.sink.clone();
        let read_timeout = self.config.read_timeout();
        let subscribe_deadline = tokio::time::sleep(self.config.subscribe_delay());
        tokio::pin!(subscribe_deadline);

        loop {
            let handshaking = self.state == ConnectionState::Handshaking;
            tokio::select! {
                () = &mut subscribe_deadline, if handshaking => {
                    info!("No handshake ack yet, subscribing anyway");
                    if let Err(reason) = self.subscribe(writer).await {
                        return reason;
                    }
                }

                () = sink.closed() => {
                    return DisconnectReason::Shutdown;
                }

                msg = next_message(&mut read, read_timeout) => {
                    match msg {
                        Ok(Some(Ok(message))) => {
                            if let Some(reason) = self.handle_message(&message, writer).await {
                                return reason;
                            }
                        }
                        Ok(Some(Err(e))) => {
                            warn!("WebSocket error: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                        Ok(None) => {
                            warn!("WebSocket stream ended");
                            return DisconnectReason::ConnectionError;
                        }
                        Err(_) => {
                            warn!(timeout_ms = ?read_timeout.map(|t| t.as_millis()), "No frame within read timeout");
                            return DisconnectReason::ReadTimeout;
                        }
                    }
                }
            }
        }
    }

    /// Handles one inbound message; returns a reason if the connection
    /// should end.
    async fn handle_message(
        &mut self,
        message: &Message,
        writer: &SharedWriter,
    ) -> Option<DisconnectReason> {
        let frame = frame::decode(message, &self.bootstrap.symbol);

        if let Some(reply) = frame.reply() {
            if let Err(e) = send_text(writer, reply).await {
                warn!("Failed to answer ping: {e}");
                return Some(DisconnectReason::ConnectionError);
            }
        }

        match frame {
            Frame::HandshakeAck => {
                info!("Namespace handshake acknowledged");
                if self.state == ConnectionState::Handshaking {
                    if let Err(reason) = self.subscribe(writer).await {
                        return Some(reason);
                    }
                }
            }
            Frame::Disconnect => {
                warn!("Server dropped the namespace");
                return Some(DisconnectReason::ServerClosed);
            }
            Frame::Close => {
                info!("Server closed the connection");
                return Some(DisconnectReason::ServerClosed);
            }
            Frame::Events(events) => {
                if self.state == ConnectionState::Subscribed {
                    self.transition(ConnectionState::Streaming);
                }
                for event in events {
                    for out in self.session.apply(event) {
                        if self.sink.send(out).is_err() {
                            return Some(DisconnectReason::Shutdown);
                        }
                    }
                }
            }
            Frame::Open => debug!("Engine.io open packet received"),
            Frame::Ping | Frame::Pong | Frame::Ignored => {}
        }

        None
    }

    async fn subscribe(&mut self, writer: &SharedWriter) -> Result<(), DisconnectReason> {
        let subscriptions = Subscription::sequence(&self.bootstrap, self.config.timeframe_secs);
        match send_subscriptions(writer, &subscriptions, self.config.subscribe_gap()).await {
            Ok(()) => {
                self.subscribed = true;
                self.transition(ConnectionState::Subscribed);
                Ok(())
            }
            Err(e) => {
                warn!("Subscription failed: {e}");
                Err(DisconnectReason::ConnectionError)
            }
        }
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        info!(from = ?self.state, to = ?state, "Connection state changed");
        self.state = state;
        // A closed sink is picked up by the read loop and the run loop.
        let _ = self.sink.send(SinkEvent::Connection(state));
    }
}

/// Waits for the next message, bounded by `timeout` when one is set.
async fn next_message(
    read: &mut WsReader,
    timeout: Option<Duration>,
) -> Result<Option<tungstenite::Result<Message>>, Elapsed> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, read.next()).await,
        None => Ok(read.next().await),
    }
}

/// Doubles the backoff, capped at `ceiling`.
fn next_backoff(current: Duration, ceiling: Duration) -> Duration {
    (current * 2).min(ceiling)
}
