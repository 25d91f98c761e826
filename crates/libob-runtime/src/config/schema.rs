//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use libob_core::{Bot, DispatchOptions, ImplInfo, Map, ONEBOT_VERSION};
use serde::{Deserialize, Serialize};

#[cfg(feature = "http-server")]
use libob_transport::HttpConfig;
#[cfg(feature = "http-client")]
use libob_transport::WebhookConfig;
#[cfg(feature = "ws-server")]
use libob_transport::WsConfig;
#[cfg(feature = "ws-client")]
use libob_transport::WsReverseConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibObConfig {
    /// Identity reported by `get_version` and `meta.connect`.
    #[serde(default)]
    pub implementation: ImplConfig,

    /// Bots served by this implementation.
    #[serde(default)]
    pub bots: Vec<BotConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatch: DispatchOptions,

    /// Enabled connections, each tagged with its `type`.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

// =============================================================================
// Implementation & bots
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplConfig {
    #[serde(default = "default_impl_name")]
    pub name: String,
    #[serde(default = "default_impl_version")]
    pub version: String,
    #[serde(default = "default_onebot_version")]
    pub onebot_version: String,
    /// Prefix of extension fields, e.g. `qq` for `qq.nickname`.
    #[serde(default = "default_impl_name")]
    pub platform: String,
}

impl Default for ImplConfig {
    fn default() -> Self {
        Self {
            name: default_impl_name(),
            version: default_impl_version(),
            onebot_version: default_onebot_version(),
            platform: default_impl_name(),
        }
    }
}

impl ImplConfig {
    pub fn to_impl_info(&self) -> ImplInfo {
        let mut info = ImplInfo::new(&self.name, &self.version, &self.platform);
        info.onebot_version.clone_from(&self.onebot_version);
        info
    }
}

fn default_impl_name() -> String {
    "libob".to_string()
}

fn default_impl_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_onebot_version() -> String {
    ONEBOT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub platform: String,
    pub user_id: String,
    #[serde(default = "default_online")]
    pub online: bool,
    /// Platform extension fields reported by `get_status`.
    #[serde(default)]
    pub extra: Map,
}

impl BotConfig {
    pub fn to_bot(&self) -> Bot {
        self.extra.iter().fold(
            Bot::new(&self.platform, &self.user_id).with_online(self.online),
            |bot, (key, value)| bot.with_extra(key, value.clone()),
        )
    }
}

fn default_online() -> bool {
    true
}

// =============================================================================
// Connections
// =============================================================================

/// One connection, selected by its `type` field.
///
/// ```toml
/// [[connections]]
/// type = "websocket-reverse"
/// url = "ws://127.0.0.1:8080/onebot/v12"
/// access_token = "secret"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectionConfig {
    #[cfg(feature = "http-server")]
    Http(HttpConfig),

    #[cfg(feature = "http-client")]
    HttpWebhook(WebhookConfig),

    #[cfg(feature = "ws-server")]
    Websocket(WsConfig),

    #[cfg(feature = "ws-client")]
    WebsocketReverse(WsReverseConfig),
}

impl ConnectionConfig {
    pub fn type_name(&self) -> &'static str {
        match *self {
            #[cfg(feature = "http-server")]
            Self::Http(_) => "http",
            #[cfg(feature = "http-client")]
            Self::HttpWebhook(_) => "http-webhook",
            #[cfg(feature = "ws-server")]
            Self::Websocket(_) => "websocket",
            #[cfg(feature = "ws-client")]
            Self::WebsocketReverse(_) => "websocket-reverse",
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines; needs the `json-log` feature.
    Json,
    #[default]
    Compact,
    Full,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Written to `file_path`.
    File,
}

/// When the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub rotation: LogRotation,
    #[serde(default)]
    pub thread_ids: bool,
    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,
    /// Per-target levels, e.g. `libob_transport = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
    #[serde(default)]
    pub span_events: SpanEventConfig,
}
