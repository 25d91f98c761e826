//! Forward WebSocket binding: applications connect to the implementation.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use libob_core::Value;

use crate::connection::{Connection, ConnectionContext, ConnectionKind, Started};
use crate::error::TransportResult;
use crate::frame::{Frame, Peers, run_session, spawn_heartbeat};
use crate::server::{RequestMeta, register_ws_route};

fn default_heartbeat_enabled() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    5000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Settings of a forward WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_heartbeat_enabled")]
    pub enable_heartbeat: bool,
    /// Milliseconds between `meta.heartbeat` events.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            access_token: None,
            enable_heartbeat: default_heartbeat_enabled(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl WsConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Accepts upgrades for one forward WebSocket connection.
pub(crate) struct WsRoute {
    access_token: Option<String>,
    ctx: ConnectionContext,
    peers: Arc<Peers>,
}

impl WsRoute {
    pub(crate) fn authorized(&self, meta: &RequestMeta) -> bool {
        let ok = meta.authorized(self.access_token.as_deref());
        if !ok {
            warn!(remote_addr = ?meta.remote_addr, "WebSocket upgrade rejected: bad access token");
        }
        ok
    }

    pub(crate) async fn serve(&self, addr: SocketAddr, socket: WebSocket) {
        run_session(socket, &self.ctx, &self.peers, &addr.to_string()).await;
    }
}

/// The forward WebSocket connection.
pub struct WebSocketConnection {
    config: WsConfig,
    peers: Arc<Peers>,
    started: Started,
    local_addr: OnceLock<SocketAddr>,
}

impl WebSocketConnection {
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            peers: Arc::new(Peers::default()),
            started: Started::default(),
            local_addr: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Number of applications currently connected.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::WebSocket
    }

    async fn start(&self, ctx: ConnectionContext) -> TransportResult<()> {
        self.started.set(self.kind(), ctx.clone())?;
        let route = Arc::new(WsRoute {
            access_token: self.config.access_token.clone(),
            ctx: ctx.clone(),
            peers: self.peers.clone(),
        });

        let addr =
            register_ws_route(&self.config.addr(), "/", route, ctx.shutdown.clone()).await?;
        let _ = self.local_addr.set(addr);

        if self.config.enable_heartbeat {
            spawn_heartbeat(&ctx, self.peers.clone(), self.config.heartbeat_interval);
        }
        Ok(())
    }

    async fn emit_event(&self, event: Value) {
        if let Some(frame) = Frame::event(&event) {
            let delivered = self.peers.deliver(&frame).await;
            debug!(delivered, "Event sent over WebSocket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{EchoSink, context};
    use futures::{SinkExt, StreamExt};
    use libob_core::Encoding;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    async fn started(token: Option<&str>, heartbeat: bool) -> (WebSocketConnection, ConnectionContext) {
        let connection = WebSocketConnection::new(WsConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            access_token: token.map(str::to_string),
            enable_heartbeat: heartbeat,
            heartbeat_interval: 50,
        });
        let ctx = context(EchoSink::new());
        connection.start(ctx.clone()).await.unwrap();
        (connection, ctx)
    }

    fn json(message: Message) -> Value {
        match message {
            Message::Text(text) => Encoding::Json.decode(text.as_str().as_bytes()).unwrap(),
            Message::Binary(data) => Encoding::MsgPack.decode(&data).unwrap(),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_event_then_actions_in_both_encodings() {
        let (connection, ctx) = started(Some("t"), false).await;
        let url = format!("ws://{}/", connection.local_addr().unwrap());

        let mut request = url.into_client_request().unwrap();
        request
            .headers_mut()
            .insert("Authorization", "Bearer t".parse().unwrap());
        let (mut socket, _) = connect_async(request).await.unwrap();

        let connect = json(socket.next().await.unwrap().unwrap());
        assert_eq!(connect.get("detail_type"), Some(&Value::from("connect")));

        socket
            .send(Message::Text(
                r#"{"action":"ping","params":{},"echo":1}"#.into(),
            ))
            .await
            .unwrap();
        let reply = socket.next().await.unwrap().unwrap();
        assert!(reply.is_text());
        assert_eq!(json(reply).get("echo"), Some(&Value::Int(1)));

        let request: Value = [("action", Value::from("pong")), ("params", Value::Map(Default::default()))]
            .into_iter()
            .collect();
        socket
            .send(Message::Binary(Encoding::MsgPack.encode(&request).unwrap().into()))
            .await
            .unwrap();
        let reply = socket.next().await.unwrap().unwrap();
        assert!(reply.is_binary());
        assert_eq!(json(reply).get("retcode"), Some(&Value::Int(0)));

        connection.emit_event(Value::from("event")).await;
        assert_eq!(json(socket.next().await.unwrap().unwrap()), Value::from("event"));

        ctx.shutdown.cancel();
    }

    #[tokio::test]
    async fn unauthorized_upgrade_is_refused() {
        let (connection, ctx) = started(Some("t"), false).await;
        let url = format!("ws://{}/", connection.local_addr().unwrap());
        assert!(connect_async(url.as_str()).await.is_err());

        let url = format!("{url}?access_token=t");
        assert!(connect_async(url.as_str()).await.is_ok());
        ctx.shutdown.cancel();
    }

    #[tokio::test]
    async fn heartbeats_are_sent() {
        let (connection, ctx) = started(None, true).await;
        let url = format!("ws://{}/", connection.local_addr().unwrap());
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();

        let _connect = socket.next().await.unwrap().unwrap();
        let heartbeat = json(socket.next().await.unwrap().unwrap());
        assert_eq!(heartbeat.get("detail_type"), Some(&Value::from("heartbeat")));
        assert_eq!(heartbeat.get("interval"), Some(&Value::Int(50)));
        ctx.shutdown.cancel();
    }
}
