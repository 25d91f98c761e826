//! # libob
//!
//! Build OneBot 12 implementations in Rust.
//!
//! ## Overview
//!
//! An implementation speaks for one or more bot accounts on some chat
//! platform. libob handles the OneBot side of that: it accepts action
//! requests over HTTP, webhooks and both WebSocket directions, turns their
//! loosely typed params into your handler's arguments, and pushes your
//! events back to every connected application.
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌────────────────┐     ┌─────────┐
//! │ Connections  │────▶│  OneBot  │────▶│ ActionRegistry │────▶│ handler │
//! │ http/ws/...  │◀────│ (emit)   │     │ coerce, inject │     │         │
//! └──────────────┘     └──────────┘     └────────────────┘     └─────────┘
//! ```
//!
//! - **Core**: values, schema reflection, coercion, dispatch
//! - **Transport**: the four connection bindings
//! - **Runtime**: bots, lifecycle, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use libob::prelude::*;
//!
//! #[derive(ActionParams)]
//! struct SendMessage {
//!     detail_type: String,
//!     user_id: Option<String>,
//!     message: Vec<Segment>,
//! }
//!
//! async fn send_message(Params(p): Params<SendMessage>, bot: BotRef) -> anyhow::Result<Value> {
//!     let message_id = deliver(&bot, &p).await?;
//!     Ok([("message_id", message_id), ("time", now())].into_iter().collect())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     libob::runtime::logging::init_from_config(&config.logging);
//!
//!     let onebot = OneBotBuilder::from_config(&config)?
//!         .register_action("send_message", send_message)?
//!         .build()?;
//!     onebot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: config file formats
//! - `json-log`: JSON log output
//! - `http-server`, `http-client`, `ws-server`, `ws-client`: connection
//!   bindings, all enabled by `full-transport` (default)

pub use libob_core as core;
pub use libob_runtime as runtime;
pub use libob_transport as transport;

/// Everything an implementation usually needs.
///
/// ```rust,ignore
/// use libob::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use libob_runtime::{ConfigLoader, LibObConfig, OneBot, OneBotBuilder};

    // Handlers and their arguments
    pub use libob_core::prelude::*;
    pub use libob_core::{ActionRequest, ActionResponse, ActionSink, Bot, ImplInfo, retcode};

    // Connections
    pub use libob_transport::{BoxedConnection, Connection, ConnectionKind};
    #[cfg(feature = "http-server")]
    pub use libob_transport::{HttpConfig, HttpConnection};
    #[cfg(feature = "http-client")]
    pub use libob_transport::{WebhookConfig, WebhookConnection};
    #[cfg(feature = "ws-server")]
    pub use libob_transport::{WebSocketConnection, WsConfig};
    #[cfg(feature = "ws-client")]
    pub use libob_transport::{WebSocketReverseConnection, WsReverseConfig};
}

#[cfg(all(test, feature = "ws-server"))]
mod tests {
    use super::prelude::*;

    #[derive(ActionParams)]
    struct Poke {
        user_id: String,
        #[param(default)]
        times: Option<i64>,
    }

    async fn poke(Params(p): Params<Poke>, bot: BotRef) -> anyhow::Result<Value> {
        Ok([
            ("from", Value::from(bot.user_id())),
            ("to", Value::from(p.user_id)),
            ("times", Value::from(p.times.unwrap_or(1))),
        ]
        .into_iter()
        .collect())
    }

    #[tokio::test]
    async fn prelude_builds_an_implementation() {
        let onebot = OneBot::builder(ImplInfo::new("demo", "0.1.0", "demo"))
            .bot(Bot::new("demo", "bot"))
            .connection(WebSocketConnection::new(WsConfig::default()))
            .register_action("poke", poke)
            .unwrap()
            .build()
            .unwrap();

        let params: Map = [("user_id".to_string(), Value::from("alice"))]
            .into_iter()
            .collect();
        let response = onebot
            .handle_request(ActionRequest::new("poke", params))
            .await;

        assert_eq!(response.retcode, retcode::OK);
        assert_eq!(response.data.get("from"), Some(&Value::from("bot")));
        assert_eq!(response.data.get("times"), Some(&Value::Int(1)));

        let params: Map = [
            ("user_id".to_string(), Value::from("alice")),
            ("times".to_string(), Value::Int(3)),
        ]
        .into_iter()
        .collect();
        let response = onebot
            .handle_request(ActionRequest::new("poke", params))
            .await;
        assert_eq!(response.data.get("times"), Some(&Value::Int(3)));
    }
}
