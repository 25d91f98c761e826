//! Reverse WebSocket binding: the implementation connects to the
//! application and reconnects when the link drops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tracing::{debug, info, warn};

use libob_core::{ImplInfo, Value};

use crate::connection::{Connection, ConnectionContext, ConnectionKind, Started};
use crate::error::{TransportError, TransportResult};
use crate::frame::{Frame, Peers, run_session, spawn_heartbeat};

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_heartbeat_enabled() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    5000
}

/// Settings of a reverse WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsReverseConfig {
    pub url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Milliseconds to wait before reconnecting.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
    #[serde(default = "default_heartbeat_enabled")]
    pub enable_heartbeat: bool,
    /// Milliseconds between `meta.heartbeat` events.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

impl WsReverseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            reconnect_interval: default_reconnect_interval(),
            enable_heartbeat: default_heartbeat_enabled(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

/// The reverse WebSocket connection.
pub struct WebSocketReverseConnection {
    config: WsReverseConfig,
    peers: Arc<Peers>,
    started: Started,
}

impl WebSocketReverseConnection {
    pub fn new(config: WsReverseConfig) -> Self {
        Self {
            config,
            peers: Arc::new(Peers::default()),
            started: Started::default(),
        }
    }

    pub fn config(&self) -> &WsReverseConfig {
        &self.config
    }

    /// Whether the link to the application is currently up.
    pub fn is_connected(&self) -> bool {
        self.peers.len() > 0
    }
}

/// The upgrade request: user agent, `12.{impl}` subprotocol and bearer token.
fn handshake_request(config: &WsReverseConfig, info: &ImplInfo) -> TransportResult<Request> {
    let header_value = |value: String| {
        HeaderValue::from_str(&value)
            .map_err(|e| TransportError::InvalidConfig(format!("bad header value: {e}")))
    };

    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidConfig(format!("bad url {}: {e}", config.url)))?;
    let headers = request.headers_mut();
    headers.insert(header::USER_AGENT, header_value(info.user_agent())?);
    headers.insert(
        header::SEC_WEBSOCKET_PROTOCOL,
        header_value(format!("{}.{}", info.onebot_version, info.name))?,
    );
    if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
        headers.insert(header::AUTHORIZATION, header_value(format!("Bearer {token}"))?);
    }
    Ok(request)
}

#[async_trait]
impl Connection for WebSocketReverseConnection {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::WebSocketReverse
    }

    async fn start(&self, ctx: ConnectionContext) -> TransportResult<()> {
        let request = handshake_request(&self.config, ctx.sink.impl_info())?;
        self.started.set(self.kind(), ctx.clone())?;

        if self.config.enable_heartbeat {
            spawn_heartbeat(&ctx, self.peers.clone(), self.config.heartbeat_interval);
        }

        let url = self.config.url.clone();
        let retry = Duration::from_millis(self.config.reconnect_interval);
        let peers = self.peers.clone();
        let session_ctx = ctx.clone();
        ctx.tasks.spawn_detached(async move {
            let ctx = session_ctx;
            loop {
                info!(url = %url, "Connecting to reverse WebSocket");
                match connect_async(request.clone()).await {
                    Ok((stream, _)) => {
                        info!(url = %url, "Reverse WebSocket connected");
                        run_session(stream, &ctx, &peers, &url).await;
                        if ctx.shutdown.is_cancelled() {
                            break;
                        }
                        warn!(url = %url, retry_ms = retry.as_millis() as u64, "Reverse WebSocket disconnected");
                    }
                    Err(e) => {
                        warn!(
                            url = %url,
                            error = %e,
                            retry_ms = retry.as_millis() as u64,
                            "Reverse WebSocket connection failed"
                        );
                    }
                }

                tokio::select! {
                    () = ctx.shutdown.cancelled() => break,
                    () = tokio::time::sleep(retry) => {}
                }
            }
            debug!(url = %url, "Reverse WebSocket loop stopped");
        });
        Ok(())
    }

    async fn emit_event(&self, event: Value) {
        if let Some(frame) = Frame::event(&event)
            && self.peers.deliver(&frame).await == 0
        {
            debug!(url = %self.config.url, "Event dropped: reverse WebSocket not connected");
        }
    }
}
