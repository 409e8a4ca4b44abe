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

//! Data structures for the Rentora notification server wire protocol.
//!
//! Every wire message is a JSON object tagged by a `type` field. Incoming text
//! is parsed in two stages: the `type` tag resolves to a [`RentoraWsMsgType`],
//! which then decides how the rest of the payload is interpreted.

use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use ustr::Ustr;

use super::{
    enums::{RentoraModule, RentoraWsMsgType},
    error::{RentoraWsError, RentoraWsResult},
};

/// Messages sent from the client to the notification server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    /// Reports the client type after the connection is established.
    Identify {
        /// The kind of client connecting (e.g. `admin_dashboard`).
        #[serde(rename = "clientType")]
        client_type: String,
    },
    /// Requests a server-side subscription to a module.
    Subscribe {
        /// The module to subscribe to.
        module: RentoraModule,
    },
    /// Drops a server-side subscription to a module.
    Unsubscribe {
        /// The module to unsubscribe from.
        module: RentoraModule,
    },
    /// Heartbeat keep-alive.
    Ping,
}

/// Parsed messages pushed by the notification server.
#[derive(Debug, Clone)]
pub enum ServerWsMessage {
    /// Handshake confirmation carrying the server-assigned client id.
    ConnectionEstablished {
        /// The opaque identity assigned to this client.
        client_id: Ustr,
    },
    /// Acknowledgement of the client's identify message.
    IdentificationConfirmed,
    /// Acknowledgement of a module subscription.
    SubscriptionConfirmed {
        /// The acknowledged module.
        module: RentoraModule,
    },
    /// Heartbeat reply.
    Pong,
    /// Server is going away.
    ServerShutdown,
    /// Server-pushed error.
    Error {
        /// The error description.
        message: String,
    },
    /// Domain event scoped to a module.
    Module {
        /// The module whose subscribers receive this event.
        module: RentoraModule,
        /// The concrete wire message type.
        msg_type: RentoraWsMsgType,
        /// The full message payload.
        payload: serde_json::Value,
    },
}

/// Event delivered to a local subscriber's handler.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// The transport opened.
    Connected,
    /// The transport closed.
    Disconnected,
    /// A transport failure or server-pushed error.
    Error(String),
    /// A domain event for a module the subscriber is interested in.
    ModuleMessage {
        /// The module this event belongs to.
        module: RentoraModule,
        /// The concrete wire message type.
        msg_type: RentoraWsMsgType,
        /// The full message payload.
        payload: serde_json::Value,
    },
}

/// Typed handler invoked for every event a subscriber receives.
pub type EventHandler = Arc<dyn Fn(RealtimeEvent) + Send + Sync>;

/// Parses raw JSON text into a [`ServerWsMessage`].
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON, carries no `type` tag,
/// carries an unrecognized `type`, or misses a required field.
pub fn parse_raw_message(text: &str) -> RentoraWsResult<ServerWsMessage> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| RentoraWsError::Json(e.to_string()))?;

    let type_str = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| RentoraWsError::Parsing("missing `type` field".to_string()))?;

    let msg_type = RentoraWsMsgType::from_str(type_str)
        .map_err(|_| RentoraWsError::UnknownMessageType(type_str.to_string()))?;

    match msg_type {
        RentoraWsMsgType::ConnectionEstablished => {
            let client_id = value
                .get("clientId")
                .and_then(|id| id.as_str())
                .ok_or_else(|| {
                    RentoraWsError::Parsing("connection_established missing `clientId`".to_string())
                })?;
            Ok(ServerWsMessage::ConnectionEstablished {
                client_id: Ustr::from(client_id),
            })
        }
        RentoraWsMsgType::IdentificationConfirmed => Ok(ServerWsMessage::IdentificationConfirmed),
        RentoraWsMsgType::SubscriptionConfirmed => {
            let module = value
                .get("module")
                .and_then(|m| m.as_str())
                .and_then(|m| RentoraModule::from_str(m).ok())
                .ok_or_else(|| {
                    RentoraWsError::Parsing("subscription_confirmed missing `module`".to_string())
                })?;
            Ok(ServerWsMessage::SubscriptionConfirmed { module })
        }
        RentoraWsMsgType::Pong => Ok(ServerWsMessage::Pong),
        RentoraWsMsgType::ServerShutdown => Ok(ServerWsMessage::ServerShutdown),
        RentoraWsMsgType::Error => {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unspecified server error")
                .to_string();
            Ok(ServerWsMessage::Error { message })
        }
        domain => {
            let module = domain.module().ok_or_else(|| {
                RentoraWsError::Parsing(format!("no module mapping for `{domain}`"))
            })?;
            Ok(ServerWsMessage::Module {
                module,
                msg_type: domain,
                payload: value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_serialize_identify() {
        let msg = ClientWsMessage::Identify {
            client_type: "admin_dashboard".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "identify");
        assert_eq!(json["clientType"], "admin_dashboard");
    }

    #[rstest]
    fn test_serialize_subscribe_and_ping() {
        let msg = ClientWsMessage::Subscribe {
            module: RentoraModule::Bookings,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["module"], "bookings");

        let json = serde_json::to_value(ClientWsMessage::Ping).unwrap();
        assert_eq!(json["type"], "ping");
    }

    #[rstest]
    fn test_parse_connection_established() {
        let json = r#"{"type": "connection_established", "clientId": "client-7"}"#;
        let msg = parse_raw_message(json).unwrap();
        match msg {
            ServerWsMessage::ConnectionEstablished { client_id } => {
                assert_eq!(client_id.as_str(), "client-7");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_connection_established_without_id() {
        let json = r#"{"type": "connection_established"}"#;
        assert!(matches!(
            parse_raw_message(json),
            Err(RentoraWsError::Parsing(_))
        ));
    }

    #[rstest]
    fn test_parse_subscription_confirmed() {
        let json = r#"{"type": "subscription_confirmed", "module": "quotes"}"#;
        let msg = parse_raw_message(json).unwrap();
        assert!(matches!(
            msg,
            ServerWsMessage::SubscriptionConfirmed {
                module: RentoraModule::Quotes
            }
        ));
    }

    #[rstest]
    fn test_parse_domain_event_keeps_payload() {
        let json = r#"{"type": "new_booking", "bookingId": 42, "customer": "acme"}"#;
        let msg = parse_raw_message(json).unwrap();
        match msg {
            ServerWsMessage::Module {
                module,
                msg_type,
                payload,
            } => {
                assert_eq!(module, RentoraModule::Bookings);
                assert_eq!(msg_type, RentoraWsMsgType::NewBooking);
                assert_eq!(payload["bookingId"], 42);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_server_error() {
        let json = r#"{"type": "error", "message": "subscription rejected"}"#;
        let msg = parse_raw_message(json).unwrap();
        match msg {
            ServerWsMessage::Error { message } => assert_eq!(message, "subscription rejected"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_unknown_type() {
        let json = r#"{"type": "mystery_event"}"#;
        assert!(matches!(
            parse_raw_message(json),
            Err(RentoraWsError::UnknownMessageType(_))
        ));
    }

    #[rstest]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_raw_message("not json"),
            Err(RentoraWsError::Json(_))
        ));
    }

    #[rstest]
    fn test_parse_missing_type() {
        let json = r#"{"module": "bookings"}"#;
        assert!(matches!(
            parse_raw_message(json),
            Err(RentoraWsError::Parsing(_))
        ));
    }
}
