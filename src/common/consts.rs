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

//! Constants for the Rentora notification server protocol.

/// Production notification server WebSocket URL.
pub const RENTORA_WS_URL: &str = "wss://api.rentora.io/ws";

/// Staging notification server WebSocket URL.
pub const RENTORA_STAGING_WS_URL: &str = "wss://staging-api.rentora.io/ws";

/// Client type reported to the server during the identify handshake.
pub const ADMIN_DASHBOARD_CLIENT_TYPE: &str = "admin_dashboard";

/// Default heartbeat ping interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default base delay in milliseconds for the linear reconnect backoff.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 3_000;

/// Default ceiling on automatic reconnect attempts.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Fixed delay in milliseconds before a manual reconnect.
pub const MANUAL_RECONNECT_DELAY_MS: u64 = 100;

/// Close codes treated as a clean shutdown (normal closure and going-away).
///
/// Any other code drives the reconnect policy.
pub const CLEAN_CLOSE_CODES: [u16; 2] = [1000, 1001];
