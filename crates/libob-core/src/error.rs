//! Error types for the libob core.
//!
//! - [`ActionError`]: a failed action, carrying a OneBot retcode
//! - [`CoerceError`]: an inbound value that does not fit a declared type
//! - [`SchemaError`]: a handler whose parameters cannot be reflected
//! - [`LifespanError`]: a failing startup or shutdown hook
//! - [`CodecError`]: a payload that cannot be encoded or decoded

use std::fmt;

use thiserror::Error;

use crate::retcode;
use crate::value::Value;

// =============================================================================
// Action Errors
// =============================================================================

/// A failed action, reported to the caller as a `failed` response.
///
/// Handlers return this (directly or through `anyhow`) to pick an explicit
/// retcode. Any other error type ends up as an internal handler error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{retcode}] {message}")]
pub struct ActionError {
    pub retcode: i64,
    pub message: String,
    pub data: Value,
}

impl ActionError {
    pub fn new(retcode: i64, message: impl Into<String>) -> Self {
        Self {
            retcode,
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Attaches a `data` payload to the response.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(retcode::BAD_REQUEST, message)
    }

    pub fn unsupported_action(action: &str) -> Self {
        Self::new(
            retcode::UNSUPPORTED_ACTION,
            format!("unsupported action: {action}"),
        )
    }

    pub fn bad_param(message: impl Into<String>) -> Self {
        Self::new(retcode::BAD_PARAM, message)
    }

    pub fn unsupported_param(message: impl Into<String>) -> Self {
        Self::new(retcode::UNSUPPORTED_PARAM, message)
    }

    pub fn unsupported_segment(message: impl Into<String>) -> Self {
        Self::new(retcode::UNSUPPORTED_SEGMENT, message)
    }

    pub fn bad_segment_data(message: impl Into<String>) -> Self {
        Self::new(retcode::BAD_SEGMENT_DATA, message)
    }

    pub fn unsupported_segment_data(message: impl Into<String>) -> Self {
        Self::new(retcode::UNSUPPORTED_SEGMENT_DATA, message)
    }

    pub fn who_am_i() -> Self {
        Self::new(
            retcode::WHO_AM_I,
            "more than one bot is available, `self` is required",
        )
    }

    pub fn unknown_self() -> Self {
        Self::new(retcode::UNKNOWN_SELF, "unknown self")
    }

    pub fn bad_handler(message: impl Into<String>) -> Self {
        Self::new(retcode::BAD_HANDLER, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(retcode::INTERNAL_HANDLER_ERROR, message)
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ActionError>() {
            Ok(action_err) => action_err,
            Err(err) => Self::internal(format!("{err:#}")),
        }
    }
}

/// Result type for action handlers.
pub type ActionResult<T> = Result<T, ActionError>;

// =============================================================================
// Coercion Errors
// =============================================================================

/// What went wrong while coercing a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceErrorKind {
    /// A required parameter is absent.
    #[error("missing required parameter")]
    Missing,

    /// The value's shape does not match the declared type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The shape matches but the content does not fit (range, encoding).
    #[error("{0}")]
    Invalid(String),

    /// The declared type has no coercion.
    #[error("unsupported declared type")]
    Unsupported,
}

/// A coercion failure, located by the dotted/indexed path of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    pub path: String,
    pub kind: CoerceErrorKind,
}

impl CoerceError {
    pub fn new(kind: CoerceErrorKind) -> Self {
        Self {
            path: String::new(),
            kind,
        }
    }

    /// A missing top-level parameter.
    pub fn missing(wire_name: &str) -> Self {
        Self {
            path: wire_name.to_string(),
            kind: CoerceErrorKind::Missing,
        }
    }

    pub fn mismatch(expected: impl Into<String>, found: &Value) -> Self {
        Self::new(CoerceErrorKind::TypeMismatch {
            expected: expected.into(),
            found: found.kind().to_string(),
        })
    }

    /// A missing field inside a nested record.
    pub fn missing_field(field: &str, expected: impl Into<String>) -> Self {
        Self {
            path: field.to_string(),
            kind: CoerceErrorKind::TypeMismatch {
                expected: expected.into(),
                found: "nothing".to_string(),
            },
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(CoerceErrorKind::Invalid(message.into()))
    }

    /// Prefixes the path with a map key or field name.
    pub fn at_field(mut self, name: &str) -> Self {
        self.path = if self.path.is_empty() {
            name.to_string()
        } else if self.path.starts_with('[') {
            format!("{name}{}", self.path)
        } else {
            format!("{name}.{}", self.path)
        };
        self
    }

    /// Prefixes the path with a list index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = if self.path.is_empty() || self.path.starts_with('[') {
            format!("[{index}]{}", self.path)
        } else {
            format!("[{index}].{}", self.path)
        };
        self
    }
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

impl std::error::Error for CoerceError {}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors raised while reflecting a handler's parameters at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A forward type reference could not be resolved.
    #[error("cannot resolve type '{name}' used by '{parameter}'")]
    UnresolvedType { parameter: String, name: String },

    /// A declared type has no coercion rule.
    #[error("unsupported type for '{parameter}': {reason}")]
    UnsupportedType { parameter: String, reason: String },

    /// Two parameters map to the same wire name.
    #[error("duplicate wire name '{0}'")]
    DuplicateWireName(String),

    /// The action name is taken and duplicates are rejected.
    #[error("action '{0}' is already registered")]
    DuplicateAction(String),
}

// =============================================================================
// Lifespan Errors
// =============================================================================

/// A lifespan hook failed; the remaining hooks of that phase were skipped.
#[derive(Debug, Error)]
#[error("{phase} hook #{index} failed: {source:#}")]
pub struct LifespanError {
    pub phase: &'static str,
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

// =============================================================================
// Codec Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid MessagePack: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("cannot encode MessagePack: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
}
