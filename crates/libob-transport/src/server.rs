//! Shared listeners for the server-side connections.
//!
//! HTTP and forward WebSocket connections that use the same address share
//! one TCP listener. Each bound address has one [`ServerEntry`] in a global
//! registry; connections add routes to it and remove them when their
//! shutdown token fires. The listener stops once the last route is gone.
//!
//! ```text
//! 0.0.0.0:8080
//! ├── GET  /      → forward WebSocket
//! └── POST /      → HTTP actions
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock, Weak};

use axum::{
    Router,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
use {
    crate::http::HttpRoute,
    axum::{body::Bytes, routing::post},
};

#[cfg(feature = "ws-server")]
use {
    crate::ws::WsRoute,
    axum::{extract::WebSocketUpgrade, routing::get},
};

// ============================================================================
// Shared state
// ============================================================================

struct SharedState {
    #[cfg(feature = "http-server")]
    http_routes: RwLock<HashMap<String, Arc<HttpRoute>>>,

    #[cfg(feature = "ws-server")]
    ws_routes: RwLock<HashMap<String, Arc<WsRoute>>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            #[cfg(feature = "http-server")]
            http_routes: RwLock::new(HashMap::new()),
            #[cfg(feature = "ws-server")]
            ws_routes: RwLock::new(HashMap::new()),
        }
    }
}

/// One bound listener. Dropping the last clone stops it.
struct ServerEntry {
    local_addr: SocketAddr,
    state: Arc<SharedState>,
    shutdown_token: CancellationToken,
}

impl Drop for ServerEntry {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

static SERVER_REGISTRY: LazyLock<Mutex<HashMap<String, Weak<ServerEntry>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Ephemeral ports always get a listener of their own.
fn is_shareable(addr: &str) -> bool {
    !addr.ends_with(":0")
}

async fn get_or_create_server(addr: &str) -> TransportResult<Arc<ServerEntry>> {
    if is_shareable(addr) {
        let registry = SERVER_REGISTRY.lock();
        if let Some(weak) = registry.get(addr)
            && let Some(entry) = weak.upgrade()
        {
            return Ok(entry);
        }
    }

    let bind_error = |source| TransportError::Bind {
        addr: addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    let state = Arc::new(SharedState::new());
    let router = build_router(state.clone());
    let shutdown_token = CancellationToken::new();
    let entry = Arc::new(ServerEntry {
        local_addr,
        state,
        shutdown_token: shutdown_token.clone(),
    });

    if is_shareable(addr) {
        SERVER_REGISTRY
            .lock()
            .insert(addr.to_string(), Arc::downgrade(&entry));
    }
    debug!(addr = %local_addr, "Listener started");

    tokio::spawn(async move {
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned());
        if let Err(e) = server.await {
            error!(addr = %local_addr, error = %e, "Listener error");
        }
        info!(addr = %local_addr, "Listener stopped");
    });

    Ok(entry)
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn build_router(state: Arc<SharedState>) -> Router {
    let mut router = Router::new();

    #[cfg(feature = "http-server")]
    {
        router = router
            .route("/{*path}", post(http_dispatch))
            .route("/", post(http_dispatch));
    }

    #[cfg(feature = "ws-server")]
    {
        router = router
            .route("/{*path}", get(ws_dispatch))
            .route("/", get(ws_dispatch));
    }

    router.with_state(state)
}

/// Request metadata the route handlers authenticate against.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestMeta {
    pub remote_addr: Option<SocketAddr>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub access_token: Option<String>,
}

impl RequestMeta {
    fn new(addr: SocketAddr, headers: &HeaderMap, mut query: HashMap<String, String>) -> Self {
        let header = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            remote_addr: Some(addr),
            authorization: header(axum::http::header::AUTHORIZATION),
            content_type: header(axum::http::header::CONTENT_TYPE),
            access_token: query.remove("access_token"),
        }
    }

    pub fn authorized(&self, token: Option<&str>) -> bool {
        libob_core::authorize(
            token,
            self.authorization.as_deref(),
            self.access_token.as_deref(),
        )
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[cfg(feature = "http-server")]
async fn http_dispatch(
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let path = uri.path().to_string();
    let route = state.http_routes.read().get(&path).cloned();

    match route {
        Some(route) => {
            route
                .handle(RequestMeta::new(addr, &headers, query), body)
                .await
        }
        None => (StatusCode::NOT_FOUND, format!("No HTTP route for {path}")).into_response(),
    }
}

/// Serves `route` for `POST {path}` on `addr` until `shutdown` fires.
#[cfg(feature = "http-server")]
pub(crate) async fn register_http_route(
    addr: &str,
    path: &str,
    route: Arc<HttpRoute>,
    shutdown: CancellationToken,
) -> TransportResult<SocketAddr> {
    let path = normalize_path(path);
    let entry = get_or_create_server(addr).await?;
    let local_addr = entry.local_addr;
    entry.state.http_routes.write().insert(path.clone(), route);
    info!(addr = %local_addr, path = %path, "HTTP route registered");

    tokio::spawn(async move {
        shutdown.cancelled().await;
        entry.state.http_routes.write().remove(&path);
        debug!(path = %path, "HTTP route removed");
    });
    Ok(local_addr)
}

// ============================================================================
// WebSocket
// ============================================================================

#[cfg(feature = "ws-server")]
async fn ws_dispatch(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let path = uri.path().to_string();
    let route = state.ws_routes.read().get(&path).cloned();

    let Some(route) = route else {
        return (
            StatusCode::NOT_FOUND,
            format!("No WebSocket route for {path}"),
        )
            .into_response();
    };

    let meta = RequestMeta::new(addr, &headers, query);
    if !route.authorized(&meta) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    debug!(remote_addr = %addr, path = %path, "WebSocket upgrade");
    ws.on_upgrade(move |socket| async move { route.serve(addr, socket).await })
        .into_response()
}

/// Serves `route` for WebSocket upgrades on `GET {path}` until `shutdown`
/// fires.
#[cfg(feature = "ws-server")]
pub(crate) async fn register_ws_route(
    addr: &str,
    path: &str,
    route: Arc<WsRoute>,
    shutdown: CancellationToken,
) -> TransportResult<SocketAddr> {
    let path = normalize_path(path);
    let entry = get_or_create_server(addr).await?;
    let local_addr = entry.local_addr;
    entry.state.ws_routes.write().insert(path.clone(), route);
    info!(addr = %local_addr, path = %path, "WebSocket route registered");

    tokio::spawn(async move {
        shutdown.cancelled().await;
        entry.state.ws_routes.write().remove(&path);
        debug!(path = %path, "WebSocket route removed");
    });
    Ok(local_addr)
}
