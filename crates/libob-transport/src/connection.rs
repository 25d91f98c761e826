//! The contract every OneBot connection implements.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use libob_core::{ActionRegistry, ActionSink, SchemaError, TaskManager, Value};

use crate::error::{TransportError, TransportResult};

/// The four OneBot 12 communication bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Http,
    HttpWebhook,
    WebSocket,
    WebSocketReverse,
}

impl ConnectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::HttpWebhook => "http-webhook",
            Self::WebSocket => "websocket",
            Self::WebSocketReverse => "websocket-reverse",
        }
    }

    /// Whether `meta.status_update` is pushed over this binding.
    ///
    /// Plain HTTP only buffers events for polling, so it is left out.
    pub fn accepts_status_updates(self) -> bool {
        !matches!(self, Self::Http)
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a connection receives when it is started.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Runs inbound actions.
    pub sink: Arc<dyn ActionSink>,
    /// Tracks the connection's background work.
    pub tasks: TaskManager,
    /// Cancelled when the implementation shuts down.
    pub shutdown: CancellationToken,
}

impl ConnectionContext {
    pub fn new(sink: Arc<dyn ActionSink>, tasks: TaskManager, shutdown: CancellationToken) -> Self {
        Self {
            sink,
            tasks,
            shutdown,
        }
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("impl", &self.sink.impl_info().name)
            .field("tasks", &self.tasks)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// A OneBot connection between the implementation and an application.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn kind(&self) -> ConnectionKind;

    /// Adds the connection's own meta actions, such as `get_latest_events`.
    fn register_actions(&self, _registry: &mut ActionRegistry) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Binds or connects, then returns while the connection keeps running in
    /// background tasks until `ctx.shutdown` is cancelled.
    async fn start(&self, ctx: ConnectionContext) -> TransportResult<()>;

    /// Delivers one event in its wire form.
    async fn emit_event(&self, event: Value);

    fn accepts_status_updates(&self) -> bool {
        self.kind().accepts_status_updates()
    }
}

/// A shared, type-erased connection.
pub type BoxedConnection = Arc<dyn Connection>;

/// The context a connection was started with, set exactly once.
#[derive(Debug, Default)]
pub(crate) struct Started(OnceLock<ConnectionContext>);

impl Started {
    pub(crate) fn set(&self, kind: ConnectionKind, ctx: ConnectionContext) -> TransportResult<()> {
        self.0
            .set(ctx)
            .map_err(|_| TransportError::AlreadyStarted(kind.as_str()))
    }

    pub(crate) fn get(&self) -> Option<&ConnectionContext> {
        self.0.get()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use libob_core::{ActionRequest, ActionResponse, ImplInfo, Map};
    use parking_lot::Mutex;

    /// Answers every action with its name and params, and records it.
    pub(crate) struct EchoSink {
        info: ImplInfo,
        pub(crate) seen: Mutex<Vec<String>>,
    }

    impl EchoSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                info: ImplInfo::new("echo", "0.1.0", "test"),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ActionSink for EchoSink {
        async fn handle_request(&self, request: ActionRequest) -> ActionResponse {
            self.seen.lock().push(request.action.clone());
            let data: Map = [
                ("action".to_string(), Value::from(request.action.as_str())),
                ("params".to_string(), Value::Map(request.params)),
            ]
            .into_iter()
            .collect();
            ActionResponse::ok(Value::Map(data)).with_echo(request.echo)
        }

        fn impl_info(&self) -> &ImplInfo {
            &self.info
        }
    }

    pub(crate) fn context(sink: Arc<EchoSink>) -> ConnectionContext {
        ConnectionContext::new(sink, TaskManager::new(), CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_updates_skip_plain_http() {
        assert!(!ConnectionKind::Http.accepts_status_updates());
        assert!(ConnectionKind::HttpWebhook.accepts_status_updates());
        assert!(ConnectionKind::WebSocketReverse.accepts_status_updates());
        assert_eq!(ConnectionKind::WebSocket.to_string(), "websocket");
    }

    #[test]
    fn context_is_set_once() {
        let started = Started::default();
        let ctx = testing::context(testing::EchoSink::new());
        started.set(ConnectionKind::Http, ctx.clone()).unwrap();
        assert!(matches!(
            started.set(ConnectionKind::Http, ctx),
            Err(TransportError::AlreadyStarted("http"))
        ));
        assert!(started.get().is_some());
    }
}
