//! Bot accounts served by an implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::value::{Map, Value};

/// The `self` field of requests and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotSelf {
    pub platform: String,
    pub user_id: String,
}

impl BotSelf {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
        }
    }

    /// The `platform.user_id` key bots are indexed by.
    pub fn key(&self) -> String {
        format!("{}.{}", self.platform, self.user_id)
    }

    pub fn to_value(&self) -> Value {
        [
            ("platform", Value::from(self.platform.as_str())),
            ("user_id", Value::from(self.user_id.as_str())),
        ]
        .into_iter()
        .collect()
    }
}

/// A bot account.
///
/// The online flag can change at runtime; call
/// `OneBot::update_status` afterwards to notify connected applications.
#[derive(Debug)]
pub struct Bot {
    id: BotSelf,
    online: AtomicBool,
    extra: Map,
}

/// Shared handle to a bot; also the handler extractor for the acting bot.
pub type BotRef = Arc<Bot>;

impl Bot {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: BotSelf::new(platform, user_id),
            online: AtomicBool::new(true),
            extra: Map::new(),
        }
    }

    /// Adds a platform extension field reported in `get_status`.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_online(self, online: bool) -> Self {
        self.online.store(online, Ordering::Relaxed);
        self
    }

    pub fn platform(&self) -> &str {
        &self.id.platform
    }

    pub fn user_id(&self) -> &str {
        &self.id.user_id
    }

    pub fn self_id(&self) -> &BotSelf {
        &self.id
    }

    pub fn key(&self) -> String {
        self.id.key()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// Status entry: `{"self": .., "online": .., "{platform}.{key}": ..}`.
    pub fn status(&self) -> Value {
        let mut map = Map::new();
        map.insert("self".to_string(), self.id.to_value());
        map.insert("online".to_string(), Value::Bool(self.is_online()));
        for (key, value) in &self.extra {
            map.insert(format!("{}.{key}", self.id.platform), value.clone());
        }
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_prefixes_extra_fields() {
        let bot = Bot::new("qq", "10001").with_extra("nickname", "alice");
        bot.set_online(false);

        let status = bot.status();
        assert_eq!(status.get("online"), Some(&Value::Bool(false)));
        assert_eq!(status.get("qq.nickname"), Some(&Value::from("alice")));
        assert_eq!(
            status.get("self").and_then(|s| s.get("user_id")),
            Some(&Value::from("10001"))
        );
        assert_eq!(bot.key(), "qq.10001");
    }
}
