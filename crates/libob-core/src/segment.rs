//! Message segments.

use serde::{Deserialize, Serialize};

use crate::coerce::Coerce;
use crate::error::CoerceError;
use crate::schema::TypeDescriptor;
use crate::value::{Map, Value};

/// One segment of a message: `{"type": .., "data": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map,
}

impl Segment {
    pub fn new(kind: impl Into<String>, data: Map) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    fn with(kind: &str, fields: Vec<(&str, Value)>) -> Self {
        Self::new(
            kind,
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with("text", vec![("text", Value::String(text.into()))])
    }

    pub fn mention(user_id: impl Into<String>) -> Self {
        Self::with("mention", vec![("user_id", Value::String(user_id.into()))])
    }

    pub fn mention_all() -> Self {
        Self::new("mention_all", Map::new())
    }

    pub fn image(file_id: impl Into<String>) -> Self {
        Self::with("image", vec![("file_id", Value::String(file_id.into()))])
    }

    pub fn voice(file_id: impl Into<String>) -> Self {
        Self::with("voice", vec![("file_id", Value::String(file_id.into()))])
    }

    pub fn audio(file_id: impl Into<String>) -> Self {
        Self::with("audio", vec![("file_id", Value::String(file_id.into()))])
    }

    pub fn video(file_id: impl Into<String>) -> Self {
        Self::with("video", vec![("file_id", Value::String(file_id.into()))])
    }

    pub fn file(file_id: impl Into<String>) -> Self {
        Self::with("file", vec![("file_id", Value::String(file_id.into()))])
    }

    pub fn location(latitude: f64, longitude: f64, title: &str, content: &str) -> Self {
        Self::with(
            "location",
            vec![
                ("latitude", Value::Float(latitude)),
                ("longitude", Value::Float(longitude)),
                ("title", Value::from(title)),
                ("content", Value::from(content)),
            ],
        )
    }

    pub fn reply(message_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::with(
            "reply",
            vec![
                ("message_id", Value::String(message_id.into())),
                ("user_id", Value::String(user_id.into())),
            ],
        )
    }

    /// Adds an extension field to `data`.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        [
            ("type", Value::from(self.kind.as_str())),
            ("data", Value::Map(self.data.clone())),
        ]
        .into_iter()
        .collect()
    }
}

/// Plain text of a message: the concatenated `text` segments.
pub fn plain_text(message: &[Segment]) -> String {
    message
        .iter()
        .filter(|s| s.kind == "text")
        .filter_map(|s| s.data.get("text").and_then(Value::as_str))
        .collect()
}

impl Coerce for Segment {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(TypeDescriptor::Any)
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        let Value::Map(map) = value else {
            return Err(CoerceError::mismatch("segment", value));
        };
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(CoerceError::mismatch("string", other).at_field("type")),
            None => return Err(CoerceError::missing_field("type", "string")),
        };
        let data = match map.get("data") {
            Some(Value::Map(data)) => data.clone(),
            Some(other) => return Err(CoerceError::mismatch("map", other).at_field("data")),
            None => return Err(CoerceError::missing_field("data", "map")),
        };
        Ok(Self { kind, data })
    }

    fn to_value(&self) -> Option<Value> {
        Some(Segment::to_value(self))
    }
}
