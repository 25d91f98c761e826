//! Transport errors.

use thiserror::Error;

use libob_core::CodecError;

/// Errors raised while starting or running a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An outbound connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// The connection was started twice.
    #[error("connection '{0}' is already running")]
    AlreadyStarted(&'static str),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransportError {
    pub fn connection_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
