//! Events emitted to connected applications.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::bot::{Bot, BotSelf};
use crate::protocol::ImplInfo;
use crate::segment::Segment;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Meta,
    Message,
    Notice,
    Request,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Message => "message",
            Self::Notice => "notice",
            Self::Request => "request",
        }
    }
}

/// A OneBot 12 event.
///
/// Standard fields live in `fields`; platform extension fields live in
/// `extra` and are serialized as `{platform}.{key}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub time: f64,
    pub event_type: EventType,
    pub detail_type: String,
    pub sub_type: String,
    pub bot_self: Option<BotSelf>,
    pub fields: Map,
    pub extra: Map,
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl Event {
    pub fn new(event_type: EventType, detail_type: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            time: now(),
            event_type,
            detail_type: detail_type.into(),
            sub_type: String::new(),
            bot_self: None,
            fields: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn message(detail_type: impl Into<String>) -> Self {
        Self::new(EventType::Message, detail_type)
    }

    pub fn notice(detail_type: impl Into<String>) -> Self {
        Self::new(EventType::Notice, detail_type)
    }

    pub fn request(detail_type: impl Into<String>) -> Self {
        Self::new(EventType::Request, detail_type)
    }

    /// `message.private` from `user_id`.
    pub fn private_message(
        bot: &Bot,
        message_id: impl Into<String>,
        message: Vec<Segment>,
        user_id: impl Into<String>,
    ) -> Self {
        let alt = crate::segment::plain_text(&message);
        Self::message("private")
            .with_bot(bot)
            .with_field("message_id", message_id.into())
            .with_field(
                "message",
                Value::List(message.iter().map(Segment::to_value).collect()),
            )
            .with_field("alt_message", alt)
            .with_field("user_id", user_id.into())
    }

    /// `message.group` from `user_id` in `group_id`.
    pub fn group_message(
        bot: &Bot,
        message_id: impl Into<String>,
        message: Vec<Segment>,
        group_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let alt = crate::segment::plain_text(&message);
        Self::message("group")
            .with_bot(bot)
            .with_field("message_id", message_id.into())
            .with_field(
                "message",
                Value::List(message.iter().map(Segment::to_value).collect()),
            )
            .with_field("alt_message", alt)
            .with_field("group_id", group_id.into())
            .with_field("user_id", user_id.into())
    }

    /// `meta.connect`, sent first on every WebSocket connection.
    pub fn connect(info: &ImplInfo) -> Self {
        Self::new(EventType::Meta, "connect").with_field("version", info.version_value())
    }

    /// `meta.heartbeat` with the interval in milliseconds.
    pub fn heartbeat(interval_ms: u64) -> Self {
        Self::new(EventType::Meta, "heartbeat").with_field("interval", interval_ms)
    }

    /// `meta.status_update` carrying a `get_status` payload.
    pub fn status_update(status: Value) -> Self {
        Self::new(EventType::Meta, "status_update").with_field("status", status)
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = sub_type.into();
        self
    }

    pub fn with_bot(mut self, bot: &Bot) -> Self {
        self.bot_self = Some(bot.self_id().clone());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Adds a platform extension field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The wire form, with extension fields prefixed by `platform`.
    pub fn to_value(&self, platform: &str) -> Value {
        let mut map = self.fields.clone();
        for (key, value) in &self.extra {
            map.insert(format!("{platform}.{key}"), value.clone());
        }
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("time".to_string(), Value::Float(self.time));
        map.insert("type".to_string(), Value::from(self.event_type.as_str()));
        map.insert(
            "detail_type".to_string(),
            Value::from(self.detail_type.as_str()),
        );
        map.insert("sub_type".to_string(), Value::from(self.sub_type.as_str()));
        if let Some(bot_self) = &self.bot_self {
            map.insert("self".to_string(), bot_self.to_value());
        }
        Value::Map(map)
    }

    pub fn is_meta(&self) -> bool {
        self.event_type == EventType::Meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_has_standard_and_prefixed_fields() {
        let bot = Bot::new("qq", "1");
        let event = Event::private_message(&bot, "m1", vec![Segment::text("hey")], "2")
            .with_extra("font", "sans");

        let value = event.to_value("qq");
        assert_eq!(value.get("type"), Some(&Value::from("message")));
        assert_eq!(value.get("detail_type"), Some(&Value::from("private")));
        assert_eq!(value.get("sub_type"), Some(&Value::from("")));
        assert_eq!(value.get("alt_message"), Some(&Value::from("hey")));
        assert_eq!(value.get("qq.font"), Some(&Value::from("sans")));
        assert_eq!(
            value.get("self").and_then(|s| s.get("platform")),
            Some(&Value::from("qq"))
        );
        assert_eq!(uuid::Uuid::parse_str(&event.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn meta_events() {
        let info = ImplInfo::new("walle", "0.1.0", "qq");
        let connect = Event::connect(&info).to_value("qq");
        assert_eq!(
            connect.get("version").and_then(|v| v.get("impl")),
            Some(&Value::from("walle"))
        );
        assert!(connect.get("self").is_none());

        let heartbeat = Event::heartbeat(5000);
        assert!(heartbeat.is_meta());
        assert_eq!(heartbeat.fields.get("interval"), Some(&Value::Int(5000)));
    }
}
