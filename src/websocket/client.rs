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

//! Client facade for the Rentora realtime notification feed.
//!
//! [`RentoraWebSocketClient`] is a cheap-to-clone handle over shared state.
//! The socket itself lives in a dedicated handler task (see the `handler`
//! module) reached through an unbounded command channel; replacing that
//! channel's sender retires the previous handler.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use arc_swap::ArcSwapOption;
use tokio::sync::{RwLock, mpsc::UnboundedSender};
use ustr::Ustr;

use super::{
    config::RentoraWsConfig,
    enums::{ConnectionState, RentoraModule},
    handler::{HandlerCommand, RentoraFeedHandler},
    messages::{ClientWsMessage, EventHandler},
    subscription::{SubscriberRegistry, SubscriptionState},
};

/// Realtime WebSocket client for the Rentora notification server.
///
/// Manages connection lifecycle (connect, identify, heartbeat, linear-backoff
/// reconnect), module subscriptions, and fan-out of incoming events to
/// registered subscribers.
#[derive(Clone, Debug)]
pub struct RentoraWebSocketClient {
    config: RentoraWsConfig,
    connection_state: Arc<AtomicU8>,
    client_id: Arc<ArcSwapOption<String>>,
    subscribers: SubscriberRegistry,
    subscriptions: SubscriptionState,
    cmd_tx: Arc<RwLock<UnboundedSender<HandlerCommand>>>,
}

impl RentoraWebSocketClient {
    /// Creates a new client; no connection is attempted until [`connect`](Self::connect)
    /// or the first [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is not a WebSocket URL.
    pub fn new(config: RentoraWsConfig) -> anyhow::Result<Self> {
        if !config.url.starts_with("ws://") && !config.url.starts_with("wss://") {
            anyhow::bail!("Invalid WebSocket URL: {}", config.url);
        }

        // Receiver dropped on purpose; commands go nowhere until connect()
        let (cmd_tx, _) = tokio::sync::mpsc::unbounded_channel();

        Ok(Self {
            config,
            connection_state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8())),
            client_id: Arc::new(ArcSwapOption::empty()),
            subscribers: SubscriberRegistry::default(),
            subscriptions: SubscriptionState::default(),
            cmd_tx: Arc::new(RwLock::new(cmd_tx)),
        })
    }

    /// Opens the connection by spawning a fresh handler task.
    ///
    /// No-op when already connected or connecting.
    pub async fn connect(&self) {
        match self.connection_state() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::debug!("Already connected or connecting");
                return;
            }
            ConnectionState::Disconnected | ConnectionState::Error => {}
        }

        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();
        // Dropping the old sender retires any handler still waiting in backoff
        *self.cmd_tx.write().await = cmd_tx;

        self.connection_state
            .store(ConnectionState::Connecting.as_u8(), Ordering::SeqCst);

        let handler = RentoraFeedHandler::new(
            self.config.clone(),
            cmd_rx,
            self.connection_state.clone(),
            self.client_id.clone(),
            self.subscribers.clone(),
            self.subscriptions.clone(),
        );
        tokio::spawn(handler.run());
    }

    /// Closes the connection cleanly and stops the handler task.
    pub async fn disconnect(&self) {
        if !self.send_command(HandlerCommand::Disconnect).await {
            // No live handler; clear local state directly
            self.connection_state
                .store(ConnectionState::Disconnected.as_u8(), Ordering::SeqCst);
            self.client_id.store(None);
            self.subscriptions.reset();
        }
    }

    /// Forces a fresh connection, resetting the backoff attempt counter.
    pub async fn reconnect(&self) {
        if !self.send_command(HandlerCommand::Reconnect).await {
            self.connect().await;
        }
    }

    /// Sends a message to the server.
    ///
    /// A no-op (with a warning) when not connected; messages are never queued.
    pub async fn send(&self, msg: &ClientWsMessage) {
        if !self.is_connected() {
            tracing::warn!("Cannot send while disconnected, message dropped");
            return;
        }

        match serde_json::to_string(msg) {
            Ok(text) => {
                if !self.send_command(HandlerCommand::SendText(text)).await {
                    tracing::warn!("Handler gone, message dropped");
                }
            }
            Err(e) => tracing::error!("Failed to serialize message: {e}"),
        }
    }

    /// Registers a subscriber and returns a guard for managing its interests.
    ///
    /// Connects lazily if the client is currently disconnected. Registering
    /// an id that already exists replaces the previous entry.
    pub async fn subscribe(&self, subscriber_id: Ustr, handler: EventHandler) -> RentoraSubscription {
        let orphaned = self.subscribers.register(subscriber_id, handler);
        for module in orphaned {
            self.drop_module(module).await;
        }

        if matches!(
            self.connection_state(),
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            self.connect().await;
        }

        RentoraSubscription {
            subscriber_id,
            client: self.clone(),
        }
    }

    /// Removes a subscriber, releasing any modules only it was interested in.
    ///
    /// Disconnects when no subscribers remain.
    pub async fn unsubscribe(&self, subscriber_id: &Ustr) {
        let orphaned = self.subscribers.deregister(subscriber_id);
        for module in orphaned {
            self.drop_module(module).await;
        }

        if self.subscribers.is_empty() {
            tracing::debug!("Last subscriber removed, disconnecting");
            self.disconnect().await;
        }
    }

    /// Records a subscriber's interest in a module, subscribing on the wire
    /// on first interest.
    pub async fn add_module_subscription(&self, subscriber_id: &Ustr, module: RentoraModule) {
        if !self.subscribers.add_interest(subscriber_id, module) {
            return;
        }

        // First interest across all subscribers
        if self.subscriptions.mark_subscribe(module)
            && self.client_id.load().is_some()
            && self.is_connected()
        {
            self.send_command(HandlerCommand::Subscribe { module }).await;
        }
    }

    /// Drops a subscriber's interest in a module, unsubscribing on the wire
    /// when no interest remains.
    pub async fn remove_module_subscription(&self, subscriber_id: &Ustr, module: RentoraModule) {
        if self.subscribers.remove_interest(subscriber_id, module) {
            self.drop_module(module).await;
        }
    }

    /// Releases a module nobody is interested in anymore.
    async fn drop_module(&self, module: RentoraModule) {
        let requested = self.client_id.load().is_some() && self.subscriptions.is_requested(module);
        self.subscriptions.mark_unsubscribe(module);

        if requested && self.is_connected() {
            self.send_command(HandlerCommand::Unsubscribe { module }).await;
        }
    }

    async fn send_command(&self, cmd: HandlerCommand) -> bool {
        self.cmd_tx.read().await.send(cmd).is_ok()
    }

    /// Returns whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.connection_state.load(Ordering::SeqCst))
    }

    /// Returns the server-assigned client id for the current session.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        self.client_id.load().as_deref().map(|id| id.to_string())
    }

    /// Returns the modules confirmed by the server for the current session.
    #[must_use]
    pub fn subscribed_modules(&self) -> Vec<RentoraModule> {
        self.subscriptions.confirmed_modules()
    }

    /// Returns the modules requested but not yet confirmed.
    #[must_use]
    pub fn pending_modules(&self) -> Vec<RentoraModule> {
        self.subscriptions.pending_snapshot()
    }

    /// Returns the configured server URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

/// Guard representing one registered subscriber.
///
/// Holds a clone of the client; interests are managed through it and released
/// explicitly with [`unsubscribe`](Self::unsubscribe).
#[derive(Clone, Debug)]
pub struct RentoraSubscription {
    subscriber_id: Ustr,
    client: RentoraWebSocketClient,
}

impl RentoraSubscription {
    /// Returns the subscriber id this guard manages.
    #[must_use]
    pub fn subscriber_id(&self) -> Ustr {
        self.subscriber_id
    }

    /// Adds a module interest for this subscriber.
    pub async fn add_module(&self, module: RentoraModule) {
        self.client
            .add_module_subscription(&self.subscriber_id, module)
            .await;
    }

    /// Removes a module interest for this subscriber.
    pub async fn remove_module(&self, module: RentoraModule) {
        self.client
            .remove_module_subscription(&self.subscriber_id, module)
            .await;
    }

    /// Deregisters this subscriber from the client.
    pub async fn unsubscribe(self) {
        self.client.unsubscribe(&self.subscriber_id).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::websocket::messages::RealtimeEvent;

    #[tokio::test]
    async fn test_new_client_starts_disconnected() {
        let client = RentoraWebSocketClient::new(RentoraWsConfig::default()).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.client_id().is_none());
        assert!(client.subscribed_modules().is_empty());
    }

    #[tokio::test]
    async fn test_new_client_rejects_non_websocket_url() {
        let config = RentoraWsConfig::new("https://api.rentora.io/ws");
        assert!(RentoraWebSocketClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_noop() {
        let client = RentoraWebSocketClient::new(RentoraWsConfig::default()).unwrap();
        client.send(&ClientWsMessage::Ping).await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_interest_tracking_without_connection() {
        let client =
            RentoraWebSocketClient::new(RentoraWsConfig::new("ws://127.0.0.1:1/ws")).unwrap();
        let subscriber_id = Ustr::from("dashboard");
        client
            .subscribers
            .register(subscriber_id, Arc::new(|_: RealtimeEvent| {}));

        client
            .add_module_subscription(&subscriber_id, RentoraModule::Bookings)
            .await;
        assert!(client.pending_modules().contains(&RentoraModule::Bookings));

        client
            .remove_module_subscription(&subscriber_id, RentoraModule::Bookings)
            .await;
        assert!(client.pending_modules().is_empty());
    }
}
