// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2021-2025 Rentora Pty Ltd. All rights reserved.
//  https://rentora.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Connection handler task owning the WebSocket stream.
//!
//! The handler runs as a dedicated tokio task spawned by the client facade.
//! It owns the socket, the heartbeat timer, and the reconnect loop, and talks
//! to the facade through an unbounded command channel. Session-scoped wire
//! state (identity, pending/confirmed subscriptions) is cleared on every
//! session end; subscriber interests survive and seed the next session.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use super::{
    config::RentoraWsConfig,
    enums::{ConnectionState, RentoraModule},
    error::{RentoraWsError, RentoraWsResult},
    messages::{ClientWsMessage, RealtimeEvent, ServerWsMessage, parse_raw_message},
    subscription::{SubscriberRegistry, SubscriptionState},
};
use crate::common::consts::{CLEAN_CLOSE_CODES, MANUAL_RECONNECT_DELAY_MS};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Commands sent from the client facade to the handler task.
#[derive(Debug)]
pub(crate) enum HandlerCommand {
    /// Sends raw text over the socket.
    SendText(String),
    /// Sends a module subscribe message.
    Subscribe { module: RentoraModule },
    /// Sends a module unsubscribe message.
    Unsubscribe { module: RentoraModule },
    /// Closes the socket cleanly and stops the handler.
    Disconnect,
    /// Closes the socket and redials after a short fixed delay.
    Reconnect,
}

/// Why a session's select loop returned.
#[derive(Debug)]
enum SessionEnd {
    /// Explicit disconnect; the handler stops.
    Stopped,
    /// The command channel closed; a newer handler owns the shared state.
    Abandoned,
    /// Explicit reconnect; redial after the fixed manual delay.
    ManualReconnect,
    /// The transport closed; `clean` decides whether to reconnect.
    Closed { clean: bool },
}

/// Outcome of waiting out a backoff delay.
#[derive(Debug)]
enum BackoffOutcome {
    Elapsed,
    ReconnectNow,
    Stop,
    Abandoned,
}

/// Computes the linear backoff delay for the given attempt number.
pub(crate) const fn reconnect_delay_ms(base_delay_ms: u64, attempts: u32) -> u64 {
    base_delay_ms.saturating_mul(attempts as u64)
}

/// Dedicated task owning the WebSocket connection lifecycle.
pub(crate) struct RentoraFeedHandler {
    config: RentoraWsConfig,
    cmd_rx: tokio::sync::mpsc::UnboundedReceiver<HandlerCommand>,
    connection_state: Arc<AtomicU8>,
    client_id: Arc<ArcSwapOption<String>>,
    subscribers: SubscriberRegistry,
    subscriptions: SubscriptionState,
}

impl RentoraFeedHandler {
    pub fn new(
        config: RentoraWsConfig,
        cmd_rx: tokio::sync::mpsc::UnboundedReceiver<HandlerCommand>,
        connection_state: Arc<AtomicU8>,
        client_id: Arc<ArcSwapOption<String>>,
        subscribers: SubscriberRegistry,
        subscriptions: SubscriptionState,
    ) -> Self {
        Self {
            config,
            cmd_rx,
            connection_state,
            client_id,
            subscribers,
            subscriptions,
        }
    }

    /// Runs the connect/session/reconnect loop until stopped or exhausted.
    pub async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(url = %self.config.url, "Connecting");

            match connect_async(self.config.url.as_str()).await {
                Ok((stream, _)) => {
                    attempts = 0;
                    self.client_id.store(None);
                    // Interested modules ride the fresh session as pending
                    // subscriptions, flushed once the server hands us an id.
                    // Modules queued while disconnected keep their request
                    // order; the rest are appended here.
                    for module in self.subscribers.interested_modules() {
                        self.subscriptions.mark_subscribe(module);
                    }
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(url = %self.config.url, "Connected");
                    self.emit_all(RealtimeEvent::Connected);

                    let end = self.session(stream).await;
                    self.subscriptions.reset();
                    self.client_id.store(None);

                    match end {
                        SessionEnd::Stopped => {
                            self.set_state(ConnectionState::Disconnected);
                            self.emit_all(RealtimeEvent::Disconnected);
                            tracing::info!("Disconnected");
                            return;
                        }
                        SessionEnd::Abandoned => return,
                        SessionEnd::ManualReconnect => {
                            self.set_state(ConnectionState::Disconnected);
                            self.emit_all(RealtimeEvent::Disconnected);
                            tokio::time::sleep(Duration::from_millis(MANUAL_RECONNECT_DELAY_MS))
                                .await;
                            continue;
                        }
                        SessionEnd::Closed { clean } => {
                            self.set_state(ConnectionState::Disconnected);
                            self.emit_all(RealtimeEvent::Disconnected);
                            if clean {
                                tracing::info!("Connection closed cleanly");
                                return;
                            }
                            tracing::warn!("Connection lost");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(url = %self.config.url, "Connection failed: {e}");
                    self.set_state(ConnectionState::Error);
                    self.emit_all(RealtimeEvent::Error(e.to_string()));
                }
            }

            attempts += 1;
            if attempts > self.config.reconnect_max_attempts {
                tracing::warn!(
                    attempts = attempts - 1,
                    "Reconnect attempts exhausted, giving up"
                );
                self.set_state(ConnectionState::Disconnected);
                return;
            }

            let delay_ms = reconnect_delay_ms(self.config.reconnect_base_delay_ms, attempts);
            tracing::info!(attempt = attempts, delay_ms, "Reconnecting after delay");

            match self.wait_for_reconnect(delay_ms).await {
                BackoffOutcome::Elapsed => {}
                BackoffOutcome::ReconnectNow => attempts = 0,
                BackoffOutcome::Stop => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                BackoffOutcome::Abandoned => return,
            }
        }
    }

    /// Waits out a backoff delay while still honoring lifecycle commands.
    async fn wait_for_reconnect(&mut self, delay_ms: u64) -> BackoffOutcome {
        let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return BackoffOutcome::Elapsed,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(HandlerCommand::Disconnect) => return BackoffOutcome::Stop,
                    Some(HandlerCommand::Reconnect) => return BackoffOutcome::ReconnectNow,
                    Some(cmd) => {
                        tracing::debug!("Dropping command while disconnected: {cmd:?}");
                    }
                    None => return BackoffOutcome::Abandoned,
                },
            }
        }
    }

    /// Drives one live socket until it closes or a lifecycle command arrives.
    async fn session(&mut self, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> SessionEnd {
        let (mut sink, mut source) = stream.split();

        let mut heartbeat = self.config.heartbeat_secs.map(|secs| {
            let period = Duration::from_secs(secs);
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(HandlerCommand::SendText(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::error!("Send failed: {e}");
                            self.emit_all(RealtimeEvent::Error(e.to_string()));
                            return SessionEnd::Closed { clean: false };
                        }
                    }
                    Some(HandlerCommand::Subscribe { module }) => {
                        if let Err(e) =
                            Self::send_msg(&mut sink, &ClientWsMessage::Subscribe { module }).await
                        {
                            tracing::error!("Subscribe send failed: {e}");
                            self.emit_all(RealtimeEvent::Error(e.to_string()));
                            return SessionEnd::Closed { clean: false };
                        }
                        tracing::debug!(%module, "Sent subscribe");
                    }
                    Some(HandlerCommand::Unsubscribe { module }) => {
                        if let Err(e) =
                            Self::send_msg(&mut sink, &ClientWsMessage::Unsubscribe { module })
                                .await
                        {
                            tracing::error!("Unsubscribe send failed: {e}");
                            self.emit_all(RealtimeEvent::Error(e.to_string()));
                            return SessionEnd::Closed { clean: false };
                        }
                        tracing::debug!(%module, "Sent unsubscribe");
                    }
                    Some(HandlerCommand::Disconnect) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client disconnect".into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!("Close frame send failed: {e}");
                        }
                        return SessionEnd::Stopped;
                    }
                    Some(HandlerCommand::Reconnect) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "manual reconnect".into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!("Close frame send failed: {e}");
                        }
                        return SessionEnd::ManualReconnect;
                    }
                    None => return SessionEnd::Abandoned,
                },
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = self.handle_text(&mut sink, text.as_str()).await {
                            match e {
                                RentoraWsError::Transport(_) | RentoraWsError::Send(_) => {
                                    tracing::error!("Send failed: {e}");
                                    self.emit_all(RealtimeEvent::Error(e.to_string()));
                                    return SessionEnd::Closed { clean: false };
                                }
                                other => tracing::warn!("Dropping message: {other}"),
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::debug!("Pong send failed: {e}");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let clean = frame
                            .as_ref()
                            .is_some_and(|f| CLEAN_CLOSE_CODES.contains(&u16::from(f.code)));
                        tracing::debug!(?frame, clean, "Received close frame");
                        return SessionEnd::Closed { clean };
                    }
                    Some(Ok(_)) => {} // Binary and pong frames carry nothing for us
                    Some(Err(e)) => {
                        tracing::error!("Transport error: {e}");
                        self.emit_all(RealtimeEvent::Error(e.to_string()));
                        return SessionEnd::Closed { clean: false };
                    }
                    None => {
                        tracing::warn!("Stream ended without close frame");
                        return SessionEnd::Closed { clean: false };
                    }
                },
                () = Self::heartbeat_tick(&mut heartbeat) => {
                    if let Err(e) = Self::send_msg(&mut sink, &ClientWsMessage::Ping).await {
                        tracing::error!("Heartbeat send failed: {e}");
                        self.emit_all(RealtimeEvent::Error(e.to_string()));
                        return SessionEnd::Closed { clean: false };
                    }
                    tracing::trace!("Sent heartbeat ping");
                }
            }
        }
    }

    /// Resolves on the next heartbeat tick, or never if disabled.
    async fn heartbeat_tick(heartbeat: &mut Option<tokio::time::Interval>) {
        match heartbeat {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Dispatches one incoming text frame.
    ///
    /// Parse failures bubble up and are dropped by the caller; transport
    /// errors from replies end the session.
    async fn handle_text(&self, sink: &mut WsSink, text: &str) -> RentoraWsResult<()> {
        match parse_raw_message(text)? {
            ServerWsMessage::ConnectionEstablished { client_id } => {
                tracing::info!(%client_id, "Connection established");
                self.client_id.store(Some(Arc::new(client_id.to_string())));

                Self::send_msg(
                    sink,
                    &ClientWsMessage::Identify {
                        client_type: self.config.client_type.clone(),
                    },
                )
                .await?;

                // Flush queued subscriptions in request order, once per session
                for module in self.subscriptions.pending_snapshot() {
                    Self::send_msg(sink, &ClientWsMessage::Subscribe { module }).await?;
                    tracing::debug!(%module, "Sent queued subscribe");
                }
            }
            ServerWsMessage::IdentificationConfirmed => {
                tracing::debug!("Identification confirmed");
            }
            ServerWsMessage::SubscriptionConfirmed { module } => {
                if self.subscriptions.confirm_subscribe(module) {
                    tracing::debug!(%module, "Subscription confirmed");
                } else {
                    tracing::warn!(%module, "Unsolicited subscription confirmation");
                }
            }
            ServerWsMessage::Pong => {
                tracing::trace!("Received pong");
            }
            ServerWsMessage::ServerShutdown => {
                tracing::info!("Server announced shutdown");
            }
            ServerWsMessage::Error { message } => {
                tracing::warn!("Server error: {message}");
                self.emit_all(RealtimeEvent::Error(message));
            }
            ServerWsMessage::Module {
                module,
                msg_type,
                payload,
            } => {
                for handler in self.subscribers.handlers_for(module) {
                    handler(RealtimeEvent::ModuleMessage {
                        module,
                        msg_type,
                        payload: payload.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    async fn send_msg(sink: &mut WsSink, msg: &ClientWsMessage) -> RentoraWsResult<()> {
        let text = serde_json::to_string(msg)?;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| RentoraWsError::Send(e.to_string()))
    }

    fn set_state(&self, state: ConnectionState) {
        self.connection_state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn emit_all(&self, event: RealtimeEvent) {
        for handler in self.subscribers.all_handlers() {
            handler(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(3_000, 1, 3_000)]
    #[case(3_000, 2, 6_000)]
    #[case(3_000, 5, 15_000)]
    #[case(50, 3, 150)]
    fn test_reconnect_delay_is_linear(
        #[case] base: u64,
        #[case] attempts: u32,
        #[case] expected: u64,
    ) {
        assert_eq!(reconnect_delay_ms(base, attempts), expected);
    }

    #[rstest]
    fn test_reconnect_delay_saturates() {
        assert_eq!(reconnect_delay_ms(u64::MAX, 2), u64::MAX);
    }
}
