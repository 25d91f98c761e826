//! The OneBot implementation object.
//!
//! [`OneBot`] ties the pieces together: the bots it speaks for, the frozen
//! [`ActionRegistry`], the enabled connections, one [`TaskManager`] and one
//! [`LifespanManager`]. It answers every inbound action through
//! [`ActionSink`] and fans events out with [`OneBot::emit`].
//!
//! ```rust,ignore
//! let onebot = OneBot::builder(ImplInfo::new("walle", "0.1.0", "qq"))
//!     .bot(Bot::new("qq", "10001"))
//!     .connection(WebSocketConnection::new(WsConfig::default()))
//!     .register_action("send_message", send_message)?
//!     .build()?;
//!
//! onebot.emit(&Event::private_message(&bot, "m1", message, "20002"));
//! onebot.run().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use libob_core::{
    ActionError, ActionHandler, ActionRegistry, ActionRequest, ActionResponse, ActionSink, Bot,
    BotRef, BotSelf, DispatchOptions, Event, ImplInfo, LifespanManager, Map, TaskManager, Value,
};
use libob_transport::{BoxedConnection, Connection};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, LibObConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::outbox::Outbox;

// =============================================================================
// Router
// =============================================================================

/// Health flag and bots, shared with the `get_status` handler.
#[derive(Debug)]
pub(crate) struct Health {
    good: AtomicBool,
    bots: BTreeMap<String, BotRef>,
}

impl Health {
    fn status(&self) -> Value {
        let mut status = Map::new();
        status.insert(
            "good".to_string(),
            Value::Bool(self.good.load(Ordering::Relaxed)),
        );
        status.insert(
            "bots".to_string(),
            Value::List(self.bots.values().map(|bot| bot.status()).collect()),
        );
        Value::Map(status)
    }
}

/// Resolves the acting bot and dispatches; handed to every connection.
pub(crate) struct Router {
    info: ImplInfo,
    health: Arc<Health>,
    registry: ActionRegistry,
}

impl Router {
    /// `self` names a bot, or there is exactly one bot.
    fn resolve_bot(&self, bot_self: Option<&BotSelf>) -> Result<BotRef, ActionError> {
        if let Some(id) = bot_self {
            return self.health.bots.get(&id.key()).cloned().ok_or_else(|| {
                warn!(bot_id = %id.key(), "Action addressed to an unknown bot");
                ActionError::unknown_self()
            });
        }
        let mut bots = self.health.bots.values();
        match (bots.next(), bots.next()) {
            (Some(bot), None) => Ok(bot.clone()),
            _ => Err(ActionError::who_am_i()),
        }
    }
}

#[async_trait]
impl ActionSink for Router {
    async fn handle_request(&self, request: ActionRequest) -> ActionResponse {
        let ActionRequest {
            action,
            params,
            echo,
            bot_self,
        } = request;

        let response = if !self.registry.contains(&action) {
            ActionResponse::failed(ActionError::unsupported_action(&action))
        } else {
            match self.resolve_bot(bot_self.as_ref()) {
                Ok(bot) => self.registry.dispatch(&action, params, Some(bot)).await,
                Err(err) => ActionResponse::failed(err),
            }
        };

        debug!(
            action = %action,
            retcode = response.retcode,
            "Action handled"
        );
        response.with_echo(echo)
    }

    fn impl_info(&self) -> &ImplInfo {
        &self.info
    }
}

// =============================================================================
// OneBot
// =============================================================================

/// A running OneBot 12 implementation.
pub struct OneBot {
    pub(crate) router: Arc<Router>,
    pub(crate) connections: Vec<BoxedConnection>,
    outboxes: Vec<Arc<Outbox>>,
    pub(crate) tasks: TaskManager,
    pub(crate) lifespan: LifespanManager,
    pub(crate) shutdown: CancellationToken,
    pub(crate) started: AtomicBool,
    pub(crate) stopped: AtomicBool,
}

impl OneBot {
    pub fn builder(info: ImplInfo) -> OneBotBuilder {
        OneBotBuilder::new(info)
    }

    pub fn impl_info(&self) -> &ImplInfo {
        &self.router.info
    }

    pub fn bot(&self, platform: &str, user_id: &str) -> Option<&BotRef> {
        self.router
            .health
            .bots
            .get(&BotSelf::new(platform, user_id).key())
    }

    pub fn bots(&self) -> impl Iterator<Item = &BotRef> {
        self.router.health.bots.values()
    }

    pub fn connections(&self) -> &[BoxedConnection] {
        &self.connections
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.router.registry
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Whether the implementation reports itself healthy in `get_status`.
    pub fn is_good(&self) -> bool {
        self.router.health.good.load(Ordering::Relaxed)
    }

    pub fn set_good(&self, good: bool) {
        self.router.health.good.store(good, Ordering::Relaxed);
    }

    /// The `get_status` payload.
    pub fn status(&self) -> Value {
        self.router.health.status()
    }

    /// Sends `event` to every connection.
    ///
    /// Returns once the event is queued. Each connection receives events in
    /// the order they were emitted; delivery runs in tracked background
    /// tasks.
    pub fn emit(&self, event: &Event) {
        self.emit_where(event, |_| true);
    }

    /// Sends `event` to the given connections only. Connections that do not
    /// belong to this implementation are skipped.
    pub fn emit_to(&self, event: &Event, connections: &[BoxedConnection]) {
        self.emit_where(event, |connection| {
            connections
                .iter()
                .any(|target| std::ptr::addr_eq(Arc::as_ptr(target), connection))
        });
    }

    /// Emits `meta.status_update` to the connections that take it: every
    /// kind except plain HTTP.
    pub fn update_status(&self) {
        let event = Event::status_update(self.status());
        self.emit_where(&event, |connection| connection.accepts_status_updates());
    }

    /// Sends `event` to the connections `accepts` picks.
    pub fn emit_where(&self, event: &Event, accepts: impl Fn(&dyn Connection) -> bool) {
        let value = event.to_value(&self.router.info.platform);
        let mut scheduled = 0;
        for outbox in &self.outboxes {
            if !accepts(outbox.connection().as_ref()) {
                continue;
            }
            outbox.push(value.clone(), &self.tasks);
            scheduled += 1;
        }
        debug!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            detail_type = %event.detail_type,
            connections = scheduled,
            "Event emitted"
        );
    }
}

#[async_trait]
impl ActionSink for OneBot {
    async fn handle_request(&self, request: ActionRequest) -> ActionResponse {
        self.router.handle_request(request).await
    }

    fn impl_info(&self) -> &ImplInfo {
        &self.router.info
    }
}

impl std::fmt::Debug for OneBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneBot")
            .field("impl", &self.router.info.name)
            .field("bots", &self.router.health.bots.keys().collect::<Vec<_>>())
            .field("actions", &self.router.registry.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

// =============================================================================
// OneBotBuilder
// =============================================================================

/// Collects bots, actions, connections and hooks for a [`OneBot`].
///
/// Registration happens here only; the built implementation's registry is
/// read-only.
pub struct OneBotBuilder {
    info: ImplInfo,
    bots: Vec<Bot>,
    registry: ActionRegistry,
    connections: Vec<BoxedConnection>,
    lifespan: LifespanManager,
}

impl OneBotBuilder {
    pub fn new(info: ImplInfo) -> Self {
        Self {
            info,
            bots: Vec::new(),
            registry: ActionRegistry::new(),
            connections: Vec::new(),
            lifespan: LifespanManager::new(),
        }
    }

    /// Starts from a validated configuration: identity, bots, dispatch
    /// options and connections.
    pub fn from_config(config: &LibObConfig) -> RuntimeResult<Self> {
        validate_config(config)?;

        let mut builder = Self::new(config.implementation.to_impl_info())
            .dispatch_options(config.dispatch.clone());
        for bot in &config.bots {
            builder = builder.bot(bot.to_bot());
        }
        for connection in &config.connections {
            builder = builder.shared_connection(connection_from_config(connection)?);
        }
        Ok(builder)
    }

    pub fn bot(mut self, bot: Bot) -> Self {
        self.bots.push(bot);
        self
    }

    pub fn connection<C: Connection>(self, connection: C) -> Self {
        self.shared_connection(Arc::new(connection))
    }

    /// Adds a connection the caller keeps a handle to.
    pub fn shared_connection(mut self, connection: BoxedConnection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Applies to actions registered after this call.
    pub fn dispatch_options(mut self, options: DispatchOptions) -> Self {
        self.registry.set_options(options);
        self
    }

    /// Registers `handler` as action `name`.
    ///
    /// The handler's parameter schema is reflected here; a handler whose
    /// types cannot be resolved fails now instead of at call time.
    pub fn register_action<H, T>(mut self, name: impl Into<String>, handler: H) -> RuntimeResult<Self>
    where
        H: ActionHandler<T>,
        T: 'static,
    {
        self.registry.register(name, handler)?;
        Ok(self)
    }

    pub fn on_startup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifespan.on_startup(hook);
        self
    }

    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifespan.on_shutdown(hook);
        self
    }

    pub fn build(self) -> RuntimeResult<Arc<OneBot>> {
        let Self {
            info,
            bots,
            mut registry,
            connections,
            lifespan,
        } = self;

        if bots.is_empty() {
            return Err(RuntimeError::NoBots);
        }
        if connections.is_empty() {
            return Err(RuntimeError::NoConnections);
        }

        let mut bot_map = BTreeMap::new();
        for bot in bots {
            let key = bot.key();
            if bot_map.insert(key.clone(), Arc::new(bot)).is_some() {
                return Err(RuntimeError::DuplicateBot(key));
            }
        }
        let health = Arc::new(Health {
            good: AtomicBool::new(true),
            bots: bot_map,
        });

        for connection in &connections {
            connection.register_actions(&mut registry)?;
        }
        register_meta_actions(&mut registry, &info, &health)?;

        info!(
            impl_name = %info.name,
            platform = %info.platform,
            bots = health.bots.len(),
            actions = registry.len(),
            connections = connections.len(),
            "OneBot implementation built"
        );

        let outboxes = connections.iter().cloned().map(Outbox::new).collect();
        Ok(Arc::new(OneBot {
            router: Arc::new(Router {
                info,
                health,
                registry,
            }),
            connections,
            outboxes,
            tasks: TaskManager::new(),
            lifespan,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }))
    }
}

// =============================================================================
// Meta actions & connections from config
// =============================================================================

/// Registers `get_version`, `get_status` and `get_supported_actions` unless
/// the implementation registered its own.
fn register_meta_actions(
    registry: &mut ActionRegistry,
    info: &ImplInfo,
    health: &Arc<Health>,
) -> RuntimeResult<()> {
    if !registry.contains("get_version") {
        let version = info.version_value();
        registry.register("get_version", move || {
            let version = version.clone();
            async move { version }
        })?;
    }

    if !registry.contains("get_status") {
        let health = health.clone();
        registry.register("get_status", move || {
            let health = health.clone();
            async move { health.status() }
        })?;
    }

    if !registry.contains("get_supported_actions") {
        let mut names = registry.names();
        names.push("get_supported_actions".to_string());
        names.sort();
        let names: Arc<Vec<Value>> = Arc::new(names.into_iter().map(Value::String).collect());
        registry.register("get_supported_actions", move || {
            let names = names.clone();
            async move { Value::List(names.as_ref().clone()) }
        })?;
    }
    Ok(())
}

/// Instantiates the connection a config entry describes.
pub fn connection_from_config(config: &ConnectionConfig) -> RuntimeResult<BoxedConnection> {
    let connection: BoxedConnection = match *config {
        #[cfg(feature = "http-server")]
        ConnectionConfig::Http(ref config) => {
            Arc::new(libob_transport::HttpConnection::new(config.clone()))
        }
        #[cfg(feature = "http-client")]
        ConnectionConfig::HttpWebhook(ref config) => {
            Arc::new(libob_transport::WebhookConnection::new(config.clone())?)
        }
        #[cfg(feature = "ws-server")]
        ConnectionConfig::Websocket(ref config) => {
            Arc::new(libob_transport::WebSocketConnection::new(config.clone()))
        }
        #[cfg(feature = "ws-client")]
        ConnectionConfig::WebsocketReverse(ref config) => {
            Arc::new(libob_transport::WebSocketReverseConnection::new(config.clone()))
        }
    };
    debug!(kind = %connection.kind(), "Connection configured");
    Ok(connection)
}


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;
    use libob_core::{ActionParams, DuplicatePolicy, Params, SchemaError, retcode};
    use libob_transport::ConnectionKind;

    #[derive(ActionParams)]
    struct Hello {
        name: String,
    }

    async fn hello(Params(p): Params<Hello>, bot: BotRef) -> anyhow::Result<String> {
        Ok(format!("hello {} from {}", p.name, bot.user_id()))
    }

    fn info() -> ImplInfo {
        ImplInfo::new("walle", "0.2.0", "qq")
    }

    fn onebot(bots: &[&str]) -> (Arc<OneBot>, Arc<Recorder>) {
        let recorder = Recorder::new(ConnectionKind::WebSocket);
        let builder = bots.iter().fold(
            OneBot::builder(info()).shared_connection(recorder.clone()),
            |builder, user_id| builder.bot(Bot::new("qq", *user_id)),
        );
        let onebot = builder
            .register_action("hello", hello)
            .unwrap()
            .build()
            .unwrap();
        (onebot, recorder)
    }

    fn params(entries: &[(&str, &str)]) -> Map {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn hello_with_the_only_bot() {
        let (onebot, _) = onebot(&["10001"]);
        let response = onebot
            .handle_request(
                ActionRequest::new("hello", params(&[("name", "alice")])).with_echo("e1"),
            )
            .await;

        assert!(response.is_ok());
        assert_eq!(response.data, Value::from("hello alice from 10001"));
        assert_eq!(response.echo, Some(Value::from("e1")));

        let response = onebot
            .handle_request(ActionRequest::new("hello", Map::new()))
            .await;
        assert_eq!(response.retcode, retcode::BAD_PARAM);
    }

    #[tokio::test]
    async fn acting_bot_resolution() {
        let (onebot, _) = onebot(&["10001", "10002"]);

        let response = onebot
            .handle_request(ActionRequest::new("hello", params(&[("name", "a")])))
            .await;
        assert_eq!(response.retcode, retcode::WHO_AM_I);

        let response = onebot
            .handle_request(
                ActionRequest::new("hello", params(&[("name", "a")]))
                    .with_self(BotSelf::new("qq", "99999")),
            )
            .await;
        assert_eq!(response.retcode, retcode::UNKNOWN_SELF);

        let response = onebot
            .handle_request(
                ActionRequest::new("hello", params(&[("name", "a")]))
                    .with_self(BotSelf::new("qq", "10002")),
            )
            .await;
        assert_eq!(response.data, Value::from("hello a from 10002"));

        // the action is checked before the bot
        let response = onebot
            .handle_request(ActionRequest::new("nope", Map::new()))
            .await;
        assert_eq!(response.retcode, retcode::UNSUPPORTED_ACTION);
    }

    #[tokio::test]
    async fn malformed_envelope_keeps_echo() {
        let (onebot, _) = onebot(&["10001"]);
        let envelope: Value = [("echo", Value::Int(3)), ("params", Value::Map(Map::new()))]
            .into_iter()
            .collect();

        let response = onebot.handle_value(envelope).await;
        assert_eq!(response.retcode, retcode::BAD_REQUEST);
        assert_eq!(response.echo, Some(Value::Int(3)));
    }

    #[tokio::test]
    async fn meta_actions() {
        let (onebot, _) = onebot(&["10001", "10002"]);
        let as_bot = |action: &str| {
            ActionRequest::new(action, Map::new()).with_self(BotSelf::new("qq", "10001"))
        };

        let version = onebot.handle_request(as_bot("get_version")).await.data;
        assert_eq!(version.get("impl"), Some(&Value::from("walle")));
        assert_eq!(version.get("version"), Some(&Value::from("0.2.0")));
        assert_eq!(version.get("onebot_version"), Some(&Value::from("12")));

        let supported = onebot.handle_request(as_bot("get_supported_actions")).await.data;
        let names: Vec<_> = supported
            .as_list()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(
            names,
            vec![
                "get_status",
                "get_supported_actions",
                "get_version",
                "hello",
                "recorder.ping"
            ]
        );

        let status = onebot.handle_request(as_bot("get_status")).await.data;
        assert_eq!(status.get("good"), Some(&Value::Bool(true)));
        assert_eq!(status.get("bots").and_then(Value::as_list).map(<[_]>::len), Some(2));

        onebot.set_good(false);
        onebot.bot("qq", "10002").unwrap().set_online(false);
        let status = onebot.handle_request(as_bot("get_status")).await.data;
        assert_eq!(status.get("good"), Some(&Value::Bool(false)));
        let bots = status.get("bots").and_then(Value::as_list).unwrap();
        assert_eq!(bots[1].get("online"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn registered_meta_action_wins() {
        let onebot = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .shared_connection(Recorder::new(ConnectionKind::Http))
            .register_action("get_version", || async { Value::from("custom") })
            .unwrap()
            .build()
            .unwrap();

        let response = onebot
            .handle_request(ActionRequest::new("get_version", Map::new()))
            .await;
        assert_eq!(response.data, Value::from("custom"));
    }

    #[tokio::test]
    async fn emit_reaches_every_connection() {
        let ws = Recorder::new(ConnectionKind::WebSocket);
        let http = Recorder::new(ConnectionKind::Http);
        let webhook = Recorder::new(ConnectionKind::HttpWebhook);
        let onebot = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .shared_connection(ws.clone())
            .shared_connection(http.clone())
            .shared_connection(webhook.clone())
            .build()
            .unwrap();

        let bot = onebot.bot("qq", "1").unwrap().clone();
        onebot.emit(&Event::notice("friend_increase").with_bot(&bot).with_extra("note", "x"));
        onebot.tasks().drain().await;

        for recorder in [&ws, &http, &webhook] {
            let events = recorder.events.lock();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].get("qq.note"), Some(&Value::from("x")));
        }

        onebot.update_status();
        onebot.tasks().drain().await;

        assert_eq!(http.events.lock().len(), 1);
        for recorder in [&ws, &webhook] {
            let events = recorder.events.lock();
            assert_eq!(events.len(), 2);
            assert_eq!(events[1].get("detail_type"), Some(&Value::from("status_update")));
            assert_eq!(
                events[1].get("status").and_then(|s| s.get("good")),
                Some(&Value::Bool(true))
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn emit_keeps_order_per_connection() {
        let first = Recorder::new(ConnectionKind::WebSocket);
        let second = Recorder::new(ConnectionKind::HttpWebhook);
        let onebot = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .shared_connection(first.clone())
            .shared_connection(second.clone())
            .build()
            .unwrap();

        for i in 0..2000_i64 {
            onebot.emit(&Event::notice("n").with_field("seq", i));
        }
        onebot.tasks().drain().await;

        let expected: Vec<_> = (0..2000).map(Value::Int).collect();
        for recorder in [&first, &second] {
            let seen: Vec<_> = recorder
                .events
                .lock()
                .iter()
                .filter_map(|event| event.get("seq").cloned())
                .collect();
            assert_eq!(seen, expected);
        }
    }

    #[tokio::test]
    async fn emit_to_targets_chosen_connections() {
        let ws = Recorder::new(ConnectionKind::WebSocket);
        let http = Recorder::new(ConnectionKind::Http);
        let stranger: BoxedConnection = Recorder::new(ConnectionKind::WebSocketReverse);
        let onebot = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .shared_connection(ws.clone())
            .shared_connection(http.clone())
            .build()
            .unwrap();

        let targets = vec![http.clone() as BoxedConnection, stranger];
        onebot.emit_to(&Event::notice("only_http"), &targets);
        onebot.emit_where(&Event::notice("only_ws"), |connection| {
            connection.kind() == ConnectionKind::WebSocket
        });
        onebot.tasks().drain().await;

        let detail = |recorder: &Recorder| -> Vec<Value> {
            recorder
                .events
                .lock()
                .iter()
                .filter_map(|event| event.get("detail_type").cloned())
                .collect()
        };
        assert_eq!(detail(&http), vec![Value::from("only_http")]);
        assert_eq!(detail(&ws), vec![Value::from("only_ws")]);
    }

    #[tokio::test]
    async fn unknown_action_leaves_no_task() {
        let (onebot, _) = onebot(&["10001"]);
        let response = onebot
            .handle_request(ActionRequest::new("nope", Map::new()))
            .await;

        assert_eq!(response.retcode, retcode::UNSUPPORTED_ACTION);
        assert!(onebot.tasks().is_empty());
    }

    #[test]
    fn build_needs_bots_and_connections() {
        let err = OneBot::builder(info())
            .shared_connection(Recorder::new(ConnectionKind::Http))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoBots));

        let err = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoConnections));

        let err = OneBot::builder(info())
            .bot(Bot::new("qq", "1"))
            .bot(Bot::new("qq", "1"))
            .shared_connection(Recorder::new(ConnectionKind::Http))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateBot(key) if key == "qq.1"));
    }

    #[tokio::test]
    async fn dispatch_options_apply() {
        let rejected = OneBot::builder(info())
            .dispatch_options(DispatchOptions {
                duplicate_policy: DuplicatePolicy::Reject,
                reject_unknown_params: true,
            })
            .register_action("hello", hello)
            .unwrap()
            .register_action("hello", hello);
        assert!(matches!(
            rejected,
            Err(RuntimeError::Schema(SchemaError::DuplicateAction(name))) if name == "hello"
        ));

        let onebot = OneBot::builder(info())
            .dispatch_options(DispatchOptions {
                reject_unknown_params: true,
                ..Default::default()
            })
            .bot(Bot::new("qq", "1"))
            .shared_connection(Recorder::new(ConnectionKind::Http))
            .register_action("hello", hello)
            .unwrap()
            .build()
            .unwrap();
        let response = onebot
            .handle_request(ActionRequest::new(
                "hello",
                params(&[("name", "a"), ("volume", "11")]),
            ))
            .await;
        assert_eq!(response.retcode, retcode::UNSUPPORTED_PARAM);
    }

    #[cfg(feature = "ws-client")]
    #[test]
    fn builder_from_config() {
        use crate::config::{BotConfig, ImplConfig};
        use libob_transport::WsReverseConfig;

        let config = LibObConfig {
            implementation: ImplConfig {
                name: "walle".to_string(),
                platform: "qq".to_string(),
                ..Default::default()
            },
            bots: vec![BotConfig {
                platform: "qq".to_string(),
                user_id: "1".to_string(),
                online: true,
                extra: Map::new(),
            }],
            connections: vec![ConnectionConfig::WebsocketReverse(WsReverseConfig::new(
                "ws://127.0.0.1:9/onebot",
            ))],
            ..Default::default()
        };

        let onebot = OneBotBuilder::from_config(&config).unwrap().build().unwrap();
        assert_eq!(onebot.impl_info().platform, "qq");
        assert_eq!(onebot.connections()[0].kind(), ConnectionKind::WebSocketReverse);
        assert!(onebot.bot("qq", "1").is_some());

        let mut invalid = config;
        invalid.implementation.platform.clear();
        assert!(matches!(
            OneBotBuilder::from_config(&invalid),
            Err(RuntimeError::Config(_))
        ));
    }
}
