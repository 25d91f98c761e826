//! HTTP binding: actions arrive as `POST` requests, events are buffered for
//! `get_latest_events`.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use libob_core::{
    ActionError, ActionParams, ActionRegistry, ActionResponse, ActionSink, Encoding, Params,
    SchemaError, Value,
};

use crate::connection::{Connection, ConnectionContext, ConnectionKind, Started};
use crate::error::TransportResult;
use crate::server::{RequestMeta, register_http_route};

// ============================================================================
// Configuration
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_event_enabled() -> bool {
    true
}

fn default_event_buffer_size() -> usize {
    20
}

/// Settings of an HTTP connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Buffers events and registers `get_latest_events`.
    #[serde(default = "default_event_enabled")]
    pub event_enabled: bool,
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            access_token: None,
            event_enabled: default_event_enabled(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Event buffer
// ============================================================================

/// A bounded event queue that drops the oldest event when full.
#[derive(Debug)]
pub struct EventBuffer {
    events: Mutex<VecDeque<Value>>,
    capacity: usize,
    arrived: Notify,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            arrived: Notify::new(),
        }
    }

    pub fn push(&self, event: Value) {
        {
            let mut events = self.events.lock();
            if events.len() >= self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
        self.arrived.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Removes up to `limit` events, oldest first. `0` means all.
    fn drain(&self, limit: usize) -> Vec<Value> {
        let mut events = self.events.lock();
        let n = if limit == 0 {
            events.len()
        } else {
            limit.min(events.len())
        };
        events.drain(..n).collect()
    }

    /// Takes buffered events, waiting up to `timeout` for the first one
    /// when the buffer is empty.
    pub async fn take(&self, limit: usize, timeout: Duration) -> Vec<Value> {
        let arrived = self.arrived.notified();
        tokio::pin!(arrived);
        arrived.as_mut().enable();

        let events = self.drain(limit);
        if !events.is_empty() || timeout.is_zero() {
            return events;
        }
        let _ = tokio::time::timeout(timeout, arrived).await;
        self.drain(limit)
    }
}

const LATEST_EVENTS: &str = "get_latest_events";

#[derive(ActionParams)]
struct LatestEvents {
    #[param(default)]
    limit: usize,
    /// Seconds.
    #[param(default)]
    timeout: u64,
}

// ============================================================================
// Route
// ============================================================================

/// Handles `POST` requests for one HTTP connection.
pub(crate) struct HttpRoute {
    access_token: Option<String>,
    sink: Arc<dyn ActionSink>,
}

impl HttpRoute {
    pub(crate) async fn handle(&self, meta: RequestMeta, body: Bytes) -> Response {
        if !meta.authorized(self.access_token.as_deref()) {
            warn!(remote_addr = ?meta.remote_addr, "HTTP request rejected: bad access token");
            return StatusCode::UNAUTHORIZED.into_response();
        }

        let Some(encoding) = meta
            .content_type
            .as_deref()
            .and_then(Encoding::from_content_type)
        else {
            warn!(
                remote_addr = ?meta.remote_addr,
                content_type = ?meta.content_type,
                "HTTP request rejected: unsupported content type"
            );
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        };

        let response = match encoding.decode::<Value>(&body) {
            Ok(value) => {
                debug!(remote_addr = ?meta.remote_addr, ?encoding, "HTTP action received");
                self.sink.handle_value(value).await
            }
            Err(e) => ActionResponse::failed(ActionError::bad_request(format!(
                "invalid request body: {e}"
            ))),
        };
        encode_response(encoding, &response)
    }
}

fn encode_response(encoding: Encoding, response: &ActionResponse) -> Response {
    match encoding.encode(response) {
        Ok(bytes) => ([(header::CONTENT_TYPE, encoding.content_type())], bytes).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Connection
// ============================================================================

/// The HTTP connection.
pub struct HttpConnection {
    config: HttpConfig,
    buffer: Option<Arc<EventBuffer>>,
    started: Started,
    local_addr: OnceLock<SocketAddr>,
}

impl HttpConnection {
    pub fn new(config: HttpConfig) -> Self {
        let buffer = config
            .event_enabled
            .then(|| Arc::new(EventBuffer::new(config.event_buffer_size)));
        Self {
            config,
            buffer,
            started: Started::default(),
            local_addr: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn events(&self) -> Option<&Arc<EventBuffer>> {
        self.buffer.as_ref()
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    fn route(&self, ctx: &ConnectionContext) -> HttpRoute {
        HttpRoute {
            access_token: self.config.access_token.clone(),
            sink: ctx.sink.clone(),
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Http
    }

    fn register_actions(&self, registry: &mut ActionRegistry) -> Result<(), SchemaError> {
        let Some(buffer) = self.buffer.clone() else {
            return Ok(());
        };
        // one buffer owns the action; a second would silently replace it
        if registry.contains(LATEST_EVENTS) {
            return Err(SchemaError::DuplicateAction(LATEST_EVENTS.into()));
        }
        info!("get_latest_events enabled");
        registry.register(
            LATEST_EVENTS,
            move |Params(p): Params<LatestEvents>| {
                let buffer = buffer.clone();
                async move {
                    let events = buffer.take(p.limit, Duration::from_secs(p.timeout)).await;
                    Value::List(events)
                }
            },
        )
    }

    async fn start(&self, ctx: ConnectionContext) -> TransportResult<()> {
        let route = Arc::new(self.route(&ctx));
        let shutdown = ctx.shutdown.clone();
        self.started.set(self.kind(), ctx)?;

        let addr = register_http_route(&self.config.addr(), "/", route, shutdown).await?;
        let _ = self.local_addr.set(addr);
        Ok(())
    }

    async fn emit_event(&self, event: Value) {
        if let Some(buffer) = &self.buffer {
            buffer.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{EchoSink, context};
    use libob_core::Map;

    fn route(token: Option<&str>) -> HttpRoute {
        HttpRoute {
            access_token: token.map(str::to_string),
            sink: EchoSink::new(),
        }
    }

    fn meta(content_type: &str) -> RequestMeta {
        RequestMeta {
            content_type: Some(content_type.to_string()),
            ..RequestMeta::default()
        }
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn answers_in_request_encoding() {
        let request: Value = [
            ("action", Value::from("get_status")),
            ("params", Value::Map(Map::new())),
            ("echo", Value::Int(1)),
        ]
        .into_iter()
        .collect();
        let body = Encoding::MsgPack.encode(&request).unwrap();

        let response = route(None)
            .handle(meta("application/msgpack"), body.into())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/msgpack"
        );
        let decoded: Value = Encoding::MsgPack.decode(&body_of(response).await).unwrap();
        assert_eq!(decoded.get("retcode"), Some(&Value::Int(0)));
        assert_eq!(decoded.get("echo"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn rejects_bad_token_and_content_type() {
        let response = route(Some("secret"))
            .handle(meta("application/json"), Bytes::from_static(b"{}"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut authorized = meta("text/plain");
        authorized.authorization = Some("Bearer secret".to_string());
        let response = route(Some("secret"))
            .handle(authorized, Bytes::from_static(b"{}"))
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let response = route(None)
            .handle(meta("application/json"), Bytes::from_static(b"{not json"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let decoded: Value = Encoding::Json.decode(&body_of(response).await).unwrap();
        assert_eq!(decoded.get("retcode"), Some(&Value::Int(10001)));

        let response = route(None)
            .handle(meta("application/json"), Bytes::from_static(b"{\"params\":{}}"))
            .await;
        let decoded: Value = Encoding::Json.decode(&body_of(response).await).unwrap();
        assert_eq!(decoded.get("retcode"), Some(&Value::Int(10001)));
    }

    #[test]
    fn buffer_drops_oldest() {
        let buffer = EventBuffer::new(2);
        for i in 0..3 {
            buffer.push(Value::Int(i));
        }
        assert_eq!(buffer.drain(0), vec![Value::Int(1), Value::Int(2)]);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn take_respects_limit() {
        let buffer = EventBuffer::new(5);
        for i in 0..4 {
            buffer.push(Value::Int(i));
        }
        let events = buffer.take(3, Duration::ZERO).await;
        assert_eq!(events.len(), 3);
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn take_long_polls_until_an_event_arrives() {
        let buffer = Arc::new(EventBuffer::new(5));
        let waiter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.take(0, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        buffer.push(Value::from("late"));

        let events = waiter.await.unwrap();
        assert_eq!(events, vec![Value::from("late")]);
    }

    #[tokio::test(start_paused = true)]
    async fn take_gives_up_after_timeout() {
        let buffer = EventBuffer::new(5);
        assert!(buffer.take(0, Duration::from_secs(1)).await.is_empty());
    }

    #[tokio::test]
    async fn latest_events_action_reads_the_buffer() {
        let connection = HttpConnection::new(HttpConfig {
            event_buffer_size: 3,
            ..HttpConfig::default()
        });
        let mut registry = ActionRegistry::new();
        connection.register_actions(&mut registry).unwrap();
        assert!(registry.contains("get_latest_events"));

        connection.emit_event(Value::from("e1")).await;
        connection.emit_event(Value::from("e2")).await;

        let params: Map = [("limit".to_string(), Value::Int(1))].into_iter().collect();
        let response = registry.dispatch("get_latest_events", params, None).await;
        assert_eq!(response.data, Value::List(vec![Value::from("e1")]));

        let params: Map = [("limit".to_string(), Value::Int(-1))].into_iter().collect();
        let response = registry.dispatch("get_latest_events", params, None).await;
        assert_eq!(response.retcode, 10003);
    }

    #[tokio::test]
    async fn disabled_buffer_registers_nothing() {
        let connection = HttpConnection::new(HttpConfig {
            event_enabled: false,
            ..HttpConfig::default()
        });
        let mut registry = ActionRegistry::new();
        connection.register_actions(&mut registry).unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn second_event_buffer_is_rejected() {
        let first = HttpConnection::new(HttpConfig::default());
        let second = HttpConnection::new(HttpConfig::default());
        let mut registry = ActionRegistry::new();
        first.register_actions(&mut registry).unwrap();

        assert_eq!(
            second.register_actions(&mut registry),
            Err(SchemaError::DuplicateAction("get_latest_events".into()))
        );

        first.emit_event(Value::from("e1")).await;
        let response = registry.dispatch("get_latest_events", Map::new(), None).await;
        assert_eq!(response.data, Value::List(vec![Value::from("e1")]));
    }

    #[tokio::test]
    async fn serves_actions_over_tcp() {
        let connection = HttpConnection::new(HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            access_token: Some("t".to_string()),
            ..HttpConfig::default()
        });
        let ctx = context(EchoSink::new());
        let shutdown = ctx.shutdown.clone();
        connection.start(ctx).await.unwrap();
        let addr = connection.local_addr().unwrap();

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/?access_token=t"))
            .json(&serde_json::json!({"action": "ping", "params": {"x": 1}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["data"]["action"], "ping");
        assert_eq!(body["data"]["params"]["x"], 1);

        shutdown.cancel();
    }
}
