//! Action request and response envelopes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bot::BotSelf;
use crate::error::ActionError;
use crate::retcode;
use crate::value::{Map, Value};

/// The OneBot protocol version implemented by this crate.
pub const ONEBOT_VERSION: &str = "12";

/// Identity of the implementation, reported by `get_version` and in
/// connection handshakes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplInfo {
    /// Implementation name, e.g. `walle-q`.
    #[serde(rename = "impl")]
    pub name: String,
    pub version: String,
    #[serde(default = "default_onebot_version")]
    pub onebot_version: String,
    /// Platform name, used to prefix extension fields.
    pub platform: String,
}

fn default_onebot_version() -> String {
    ONEBOT_VERSION.to_string()
}

impl ImplInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            onebot_version: default_onebot_version(),
            platform: platform.into(),
        }
    }

    /// `{impl, version, onebot_version}`, the `get_version` payload.
    pub fn version_value(&self) -> Value {
        [
            ("impl", self.name.as_str()),
            ("version", self.version.as_str()),
            ("onebot_version", self.onebot_version.as_str()),
        ]
        .into_iter()
        .collect()
    }

    /// `User-Agent` sent by client connections.
    pub fn user_agent(&self) -> String {
        format!(
            "OneBot/{} libob/{} {}/{}",
            self.onebot_version,
            env!("CARGO_PKG_VERSION"),
            self.name,
            self.version
        )
    }
}

// ============================================================================
// ActionRequest
// ============================================================================

/// An inbound action call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionRequest {
    pub action: String,
    pub params: Map,
    pub echo: Option<Value>,
    pub bot_self: Option<BotSelf>,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, params: Map) -> Self {
        Self {
            action: action.into(),
            params,
            ..Default::default()
        }
    }

    pub fn with_echo(mut self, echo: impl Into<Value>) -> Self {
        self.echo = Some(echo.into());
        self
    }

    pub fn with_self(mut self, bot_self: BotSelf) -> Self {
        self.bot_self = Some(bot_self);
        self
    }

    /// Parses a decoded envelope.
    ///
    /// A missing or mistyped `action` or `params` is a bad request.
    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        let Value::Map(mut envelope) = value else {
            return Err(ActionError::bad_request("request must be a map"));
        };

        let action = match envelope.remove("action") {
            Some(Value::String(action)) => action,
            Some(_) => return Err(ActionError::bad_request("`action` must be a string")),
            None => return Err(ActionError::bad_request("missing `action`")),
        };
        let params = match envelope.remove("params") {
            Some(Value::Map(params)) => params,
            Some(_) => return Err(ActionError::bad_request("`params` must be a map")),
            None => return Err(ActionError::bad_request("missing `params`")),
        };
        let bot_self = match envelope.remove("self") {
            None | Some(Value::Null) => None,
            Some(Value::Map(s)) => match (s.get("platform"), s.get("user_id")) {
                (Some(Value::String(platform)), Some(Value::String(user_id))) => {
                    Some(BotSelf::new(platform.clone(), user_id.clone()))
                }
                _ => return Err(ActionError::bad_request("malformed `self`")),
            },
            Some(_) => return Err(ActionError::bad_request("malformed `self`")),
        };

        Ok(Self {
            action,
            params,
            echo: envelope.remove("echo"),
            bot_self,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".to_string(), Value::from(self.action.as_str()));
        map.insert("params".to_string(), Value::Map(self.params.clone()));
        if let Some(echo) = &self.echo {
            map.insert("echo".to_string(), echo.clone());
        }
        if let Some(bot_self) = &self.bot_self {
            map.insert("self".to_string(), bot_self.to_value());
        }
        Value::Map(map)
    }
}

// ============================================================================
// ActionResponse
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Ok,
    Failed,
}

/// The reply to an action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ActionStatus,
    pub retcode: i64,
    pub data: Value,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<Value>,
}

impl ActionResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: ActionStatus::Ok,
            retcode: retcode::OK,
            data,
            message: String::new(),
            echo: None,
        }
    }

    pub fn failed(err: ActionError) -> Self {
        Self {
            status: ActionStatus::Failed,
            retcode: err.retcode,
            data: err.data,
            message: err.message,
            echo: None,
        }
    }

    pub fn from_result(result: Result<Value, ActionError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(err),
        }
    }

    pub fn with_echo(mut self, echo: Option<Value>) -> Self {
        self.echo = echo;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }
}

impl From<ActionError> for ActionResponse {
    fn from(err: ActionError) -> Self {
        Self::failed(err)
    }
}

// ============================================================================
// ActionSink
// ============================================================================

/// Where connections send inbound actions.
#[async_trait]
pub trait ActionSink: Send + Sync + 'static {
    /// Runs a parsed request and returns its response, echo included.
    async fn handle_request(&self, request: ActionRequest) -> ActionResponse;

    fn impl_info(&self) -> &ImplInfo;

    /// Parses a decoded envelope and runs it.
    ///
    /// The echo is preserved even when the envelope is malformed.
    async fn handle_value(&self, value: Value) -> ActionResponse {
        let echo = value.get("echo").cloned();
        match ActionRequest::from_value(value) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => ActionResponse::failed(err).with_echo(echo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(entries: Vec<(&str, Value)>) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn parses_full_envelope() {
        let request = ActionRequest::from_value(envelope(vec![
            ("action", Value::from("send_message")),
            ("params", Value::Map(Map::new())),
            ("echo", Value::from("e1")),
            (
                "self",
                envelope(vec![
                    ("platform", Value::from("qq")),
                    ("user_id", Value::from("1")),
                ]),
            ),
        ]))
        .unwrap();

        assert_eq!(request.action, "send_message");
        assert_eq!(request.echo, Some(Value::from("e1")));
        assert_eq!(request.bot_self, Some(BotSelf::new("qq", "1")));
    }

    #[test]
    fn missing_action_or_params_is_bad_request() {
        let err = ActionRequest::from_value(envelope(vec![("params", Value::Map(Map::new()))]))
            .unwrap_err();
        assert_eq!(err.retcode, retcode::BAD_REQUEST);

        let err = ActionRequest::from_value(envelope(vec![("action", Value::from("x"))]))
            .unwrap_err();
        assert_eq!(err.retcode, retcode::BAD_REQUEST);

        let err = ActionRequest::from_value(Value::from("x")).unwrap_err();
        assert_eq!(err.retcode, retcode::BAD_REQUEST);
    }

    #[test]
    fn response_serializes_without_missing_echo() {
        let json = serde_json::to_value(ActionResponse::ok(Value::Int(1))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "ok", "retcode": 0, "data": 1, "message": ""})
        );

        let json = serde_json::to_value(
            ActionResponse::failed(ActionError::unknown_self()).with_echo(Some(Value::Int(7))),
        )
        .unwrap();
        assert_eq!(json["retcode"], 10102);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["echo"], 7);
    }
}
