//! Wire encodings: JSON and MessagePack.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// A payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    MsgPack,
}

impl Encoding {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::MsgPack => "application/msgpack",
        }
    }

    /// Matches a `Content-Type` header, ignoring parameters like `charset`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        if mime.eq_ignore_ascii_case("application/json") {
            Some(Self::Json)
        } else if mime.eq_ignore_ascii_case("application/msgpack") {
            Some(Self::MsgPack)
        } else {
            None
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::MsgPack => rmp_serde::from_slice(bytes)?,
        })
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            Self::Json => serde_json::to_vec(value)?,
            Self::MsgPack => rmp_serde::to_vec_named(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ActionResponse;
    use crate::value::Value;

    #[test]
    fn content_type_matching() {
        assert_eq!(
            Encoding::from_content_type("application/json; charset=utf-8"),
            Some(Encoding::Json)
        );
        assert_eq!(
            Encoding::from_content_type("Application/MsgPack"),
            Some(Encoding::MsgPack)
        );
        assert_eq!(Encoding::from_content_type("text/plain"), None);
    }

    #[test]
    fn responses_survive_both_encodings() {
        let response = ActionResponse::ok(Value::bytes(vec![1, 2, 3])).with_echo(Some(Value::Int(9)));

        let packed = Encoding::MsgPack.encode(&response).unwrap();
        let decoded: Value = Encoding::MsgPack.decode(&packed).unwrap();
        assert_eq!(decoded.get("data"), Some(&Value::bytes(vec![1, 2, 3])));
        assert_eq!(decoded.get("status"), Some(&Value::from("ok")));

        let json = Encoding::Json.encode(&response).unwrap();
        let decoded: Value = Encoding::Json.decode(&json).unwrap();
        assert_eq!(decoded.get("data"), Some(&Value::from("AQID")));
        assert_eq!(decoded.get("echo"), Some(&Value::Int(9)));
    }
}
