//! HTTP webhook binding: events are pushed to the application with `POST`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use libob_core::{ActionSink, Encoding, Value};

use crate::connection::{Connection, ConnectionContext, ConnectionKind, Started};
use crate::error::{TransportError, TransportResult};

fn default_timeout() -> u64 {
    5000
}

/// Settings of an HTTP webhook connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Request timeout in milliseconds; `0` disables it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            timeout: default_timeout(),
        }
    }
}

/// The HTTP webhook connection.
pub struct WebhookConnection {
    config: WebhookConfig,
    client: Client,
    started: Started,
}

impl WebhookConnection {
    pub fn new(config: WebhookConfig) -> TransportResult<Self> {
        let mut builder = Client::builder();
        if config.timeout > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout));
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::connection_failed(&config.url, e))?;
        Ok(Self {
            config,
            client,
            started: Started::default(),
        })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    async fn push(&self, sink: &dyn ActionSink, event: &Value) -> Result<(), reqwest::Error> {
        let info = sink.impl_info();
        let mut request = self
            .client
            .post(&self.config.url)
            .header(header::USER_AGENT, info.user_agent())
            .header("X-OneBot-Version", info.onebot_version.as_str())
            .header("X-Impl", info.name.as_str())
            .json(event);
        if let Some(token) = self.config.access_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::OK => {
                let encoding = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(Encoding::from_content_type);
                let body = response.bytes().await?;
                let Some(encoding) = encoding else {
                    if !body.is_empty() {
                        warn!(url = %self.config.url, "Webhook response has an unsupported content type");
                    }
                    return Ok(());
                };
                self.run_returned_actions(sink, encoding, &body).await;
                Ok(())
            }
            status => {
                warn!(url = %self.config.url, %status, "Webhook push failed");
                Ok(())
            }
        }
    }

    /// Runs the actions an application answered with. Their responses are
    /// discarded.
    async fn run_returned_actions(&self, sink: &dyn ActionSink, encoding: Encoding, body: &[u8]) {
        let actions = match encoding.decode::<Value>(body) {
            Ok(Value::List(actions)) => actions,
            Ok(other) => {
                warn!(url = %self.config.url, kind = other.kind(), "Webhook response is not a list of actions");
                return;
            }
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "Webhook response could not be decoded");
                return;
            }
        };
        debug!(url = %self.config.url, count = actions.len(), "Running actions from webhook response");
        for action in actions {
            let response = sink.handle_value(action).await;
            if !response.is_ok() {
                debug!(retcode = response.retcode, message = %response.message, "Webhook action failed");
            }
        }
    }
}

#[async_trait]
impl Connection for WebhookConnection {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::HttpWebhook
    }

    async fn start(&self, ctx: ConnectionContext) -> TransportResult<()> {
        self.started.set(self.kind(), ctx)
    }

    async fn emit_event(&self, event: Value) {
        let Some(ctx) = self.started.get() else {
            warn!(url = %self.config.url, "Webhook not started; event dropped");
            return;
        };
        if let Err(e) = self.push(ctx.sink.as_ref(), &event).await {
            warn!(url = %self.config.url, error = %e, "Webhook push failed");
        }
    }
}
