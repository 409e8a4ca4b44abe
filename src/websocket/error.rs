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

//! Error types for the Rentora realtime WebSocket client.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Error types for the realtime connection manager.
#[derive(Debug, Clone, Error)]
pub enum RentoraWsError {
    /// Transport-level error during WebSocket communication.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Failed to send a message over the WebSocket.
    #[error("Send error: {0}")]
    Send(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Incoming payload could not be interpreted as a protocol message.
    #[error("Parsing error: {0}")]
    Parsing(String),
    /// Incoming message carried a `type` the client does not recognize.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
}

impl From<tungstenite::Error> for RentoraWsError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for RentoraWsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

/// Result type alias for realtime WebSocket operations.
pub type RentoraWsResult<T> = Result<T, RentoraWsError>;
