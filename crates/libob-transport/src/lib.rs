//! # libob Transport
//!
//! The four OneBot 12 communication bindings, each behind a feature flag.
//!
//! ## Features
//!
//! - `http-server`: [`HttpConnection`], actions over `POST` plus `get_latest_events`
//! - `http-client`: [`WebhookConnection`], events pushed to the application
//! - `ws-server`: [`WebSocketConnection`], applications connect in
//! - `ws-client`: [`WebSocketReverseConnection`], the implementation connects out
//! - `full` (default): all of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  libob-runtime      │  OneBot: bots, actions, emit
//! ├─────────────────────┤
//! │  libob-transport    │  <- This crate (Connection implementations)
//! ├─────────────────────┤
//! │  libob-core         │  ActionSink, codecs, events
//! └─────────────────────┘
//! ```
//!
//! Every binding implements [`Connection`]. The runtime hands each one a
//! [`ConnectionContext`] on start: the [`ActionSink`](libob_core::ActionSink)
//! that runs inbound actions, the shared task manager and a shutdown token.
//!
//! Server bindings that use the same `host:port` share one listener.

pub mod connection;
pub mod error;

#[cfg(any(feature = "http-server", feature = "ws-server"))]
mod server;

#[cfg(any(feature = "ws-server", feature = "ws-client"))]
mod frame;

#[cfg(feature = "http-server")]
pub mod http;

#[cfg(feature = "http-client")]
pub mod webhook;

#[cfg(feature = "ws-server")]
pub mod ws;

#[cfg(feature = "ws-client")]
pub mod ws_reverse;

pub use connection::{BoxedConnection, Connection, ConnectionContext, ConnectionKind};
pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use http::{EventBuffer, HttpConfig, HttpConnection};

#[cfg(feature = "http-client")]
pub use webhook::{WebhookConfig, WebhookConnection};

#[cfg(feature = "ws-server")]
pub use ws::{WebSocketConnection, WsConfig};

#[cfg(feature = "ws-client")]
pub use ws_reverse::{WebSocketReverseConnection, WsReverseConfig};
