//! Configuration for a OneBot implementation.
//!
//! Loaded in layers by [`ConfigLoader`] and checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, ConnectionConfig, ImplConfig, LibObConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
