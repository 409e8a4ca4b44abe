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

//! Configuration for the Rentora realtime WebSocket client.

use serde::{Deserialize, Serialize};

use crate::common::consts::{
    ADMIN_DASHBOARD_CLIENT_TYPE, DEFAULT_HEARTBEAT_SECS, DEFAULT_RECONNECT_BASE_DELAY_MS,
    DEFAULT_RECONNECT_MAX_ATTEMPTS, RENTORA_WS_URL,
};

/// Configuration for [`RentoraWebSocketClient`](super::client::RentoraWebSocketClient).
///
/// Reconnect backoff is linear: attempt `n` waits `reconnect_base_delay_ms * n`
/// before redialing, up to `reconnect_max_attempts` attempts. After the
/// ceiling, the client stays disconnected until an explicit reconnect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RentoraWsConfig {
    /// The notification server WebSocket URL.
    pub url: String,
    /// The client type reported during the identify handshake.
    pub client_type: String,
    /// Heartbeat ping interval in seconds (`None` disables the heartbeat).
    pub heartbeat_secs: Option<u64>,
    /// Base delay in milliseconds for the linear reconnect backoff.
    pub reconnect_base_delay_ms: u64,
    /// Ceiling on consecutive automatic reconnect attempts.
    pub reconnect_max_attempts: u32,
}

impl Default for RentoraWsConfig {
    fn default() -> Self {
        Self {
            url: RENTORA_WS_URL.to_string(),
            client_type: ADMIN_DASHBOARD_CLIENT_TYPE.to_string(),
            heartbeat_secs: Some(DEFAULT_HEARTBEAT_SECS),
            reconnect_base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            reconnect_max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl RentoraWsConfig {
    /// Creates a config for the given URL with default policy knobs.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_config() {
        let config = RentoraWsConfig::default();
        assert_eq!(config.url, RENTORA_WS_URL);
        assert_eq!(config.client_type, ADMIN_DASHBOARD_CLIENT_TYPE);
        assert_eq!(config.heartbeat_secs, Some(DEFAULT_HEARTBEAT_SECS));
        assert_eq!(
            config.reconnect_base_delay_ms,
            DEFAULT_RECONNECT_BASE_DELAY_MS
        );
        assert_eq!(config.reconnect_max_attempts, DEFAULT_RECONNECT_MAX_ATTEMPTS);
    }

    #[rstest]
    fn test_new_overrides_url_only() {
        let config = RentoraWsConfig::new("ws://127.0.0.1:9001/ws");
        assert_eq!(config.url, "ws://127.0.0.1:9001/ws");
        assert_eq!(config.client_type, ADMIN_DASHBOARD_CLIENT_TYPE);
    }
}
