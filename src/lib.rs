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

//! Realtime WebSocket connection manager for the Rentora admin dashboard.
//!
//! Maintains a persistent connection to the Rentora notification server with
//! automatic linear-backoff reconnection, application-level heartbeats, and
//! per-module subscription management. Incoming events are fanned out to
//! registered subscribers based on the modules each has opted into
//! (bookings, orders, quotes).
//!
//! # Usage
//!
//! Create a [`websocket::client::RentoraWebSocketClient`] from a
//! [`websocket::config::RentoraWsConfig`], register subscribers with typed
//! event handlers, and add module interests. The client connects lazily on
//! the first subscriber and disconnects when the last one leaves.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod websocket;
