//! Runtime error types.

use libob_core::{LifespanError, SchemaError};
use libob_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or running a [`OneBot`](crate::OneBot).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// An action could not be registered.
    #[error("Action registration failed: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Lifespan(#[from] LifespanError),

    #[error("Connection error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An implementation must serve at least one bot.
    #[error("OneBot needs at least one bot")]
    NoBots,

    /// An implementation must enable at least one connection.
    #[error("OneBot needs at least one connection")]
    NoConnections,

    #[error("Duplicate bot: {0}")]
    DuplicateBot(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
