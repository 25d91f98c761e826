//! libob runtime - the OneBot implementation object and its surroundings.
//!
//! This crate provides:
//! - [`OneBot`] and its [`OneBotBuilder`]: bots, actions, connections and
//!   lifespan hooks in one place
//! - Event fan-out to every enabled connection
//! - Startup and graceful shutdown ([`OneBot::run`])
//! - Layered configuration on `figment` ([`config`])
//! - Logging setup on `tracing-subscriber` ([`logging`])
//!
//! # From a config file
//!
//! ```ignore
//! use libob_runtime::{ConfigLoader, OneBotBuilder, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let onebot = OneBotBuilder::from_config(&config)?
//!         .register_action("send_message", send_message)?
//!         .build()?;
//!     onebot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Connection features
//!
//! Each OneBot binding sits behind a feature, all enabled by default:
//!
//! - `http-server`: HTTP
//! - `http-client`: HTTP webhook
//! - `ws-server`: forward WebSocket
//! - `ws-client`: reverse WebSocket

pub mod config;
pub mod error;
pub mod logging;
pub mod onebot;
mod outbox;
pub mod runner;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, ConnectionConfig, ImplConfig, LibObConfig,
    LoggingConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use onebot::{OneBot, OneBotBuilder, connection_from_config};
pub use runner::wait_for_shutdown;

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for implementation code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
