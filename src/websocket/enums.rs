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

//! Enumerations for connection lifecycle, modules, and wire message types.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Connection lifecycle state of the realtime manager.
///
/// Exactly one value is active at a time; transitions are driven by transport
/// lifecycle events and explicit connect/disconnect calls.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// No transport; the initial and terminal state.
    #[default]
    Disconnected = 0,
    /// Transport open in progress.
    Connecting = 1,
    /// Transport open; messages flow.
    Connected = 2,
    /// Transport open failed.
    Error = 3,
}

impl ConnectionState {
    /// Returns the `u8` representation for atomic storage.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Converts a `u8` back into a state; unknown values map to `Disconnected`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

/// Named category of push notifications a subscriber can opt into.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RentoraModule {
    /// Booking notifications.
    Bookings,
    /// Order notifications.
    Orders,
    /// Quote notifications.
    Quotes,
}

/// Wire message types pushed by the notification server.
///
/// The `type` field of every server payload deserializes into one of these
/// variants; anything else is logged and dropped by the handler.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RentoraWsMsgType {
    // Connection/identity bookkeeping
    /// Handshake confirmation carrying the assigned client id.
    ConnectionEstablished,
    /// Acknowledgement of the client's identify message.
    IdentificationConfirmed,
    /// Acknowledgement of a module subscription.
    SubscriptionConfirmed,
    /// Heartbeat reply.
    Pong,
    /// Server is going away; the close frame follows.
    ServerShutdown,
    /// Server-pushed error, fanned out to all subscribers.
    Error,

    // Domain events
    /// A booking was created.
    NewBooking,
    /// A booking changed status.
    BookingStatusUpdate,
    /// A booking was deleted.
    BookingDeleted,
    /// A quote was created.
    NewQuote,
    /// A quote changed status.
    QuoteStatusUpdated,
    /// A quote was deleted.
    QuoteDeleted,
    /// A response to a quote was created.
    QuoteResponseCreated,
    /// An order was created.
    NewOrder,
    /// An order changed status.
    OrderStatusUpdated,
    /// An order was updated.
    OrderUpdated,
    /// An order was deleted.
    OrderDeleted,
}

impl RentoraWsMsgType {
    /// Maps a wire message type to the module whose subscribers receive it.
    ///
    /// Bookkeeping messages map to `None` and never reach subscribers as
    /// domain events.
    #[must_use]
    pub const fn module(&self) -> Option<RentoraModule> {
        match self {
            Self::NewBooking | Self::BookingStatusUpdate | Self::BookingDeleted => {
                Some(RentoraModule::Bookings)
            }
            Self::NewQuote
            | Self::QuoteStatusUpdated
            | Self::QuoteDeleted
            | Self::QuoteResponseCreated => Some(RentoraModule::Quotes),
            Self::NewOrder | Self::OrderStatusUpdated | Self::OrderUpdated | Self::OrderDeleted => {
                Some(RentoraModule::Orders)
            }
            Self::ConnectionEstablished
            | Self::IdentificationConfirmed
            | Self::SubscriptionConfirmed
            | Self::Pong
            | Self::ServerShutdown
            | Self::Error => None,
        }
    }

    /// Returns whether this is a connection/identity bookkeeping message.
    #[must_use]
    pub const fn is_bookkeeping(&self) -> bool {
        self.module().is_none()
    }
}
