//! Message body: type tag, message ids and free-form payload fields

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use flood_core::{FloodError, FloodResult};

/// Body of an envelope
///
/// `type`, `msg_id` and `in_reply_to` are lifted into typed fields; every
/// other key is kept verbatim in `fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(rename = "type")]
    pub msg_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    #[serde(flatten)]
    pub fields: Map<String, Json>,
}

impl Body {
    /// Empty body of the given type
    pub fn new(msg_type: impl Into<String>) -> Self {
        Body {
            msg_type: msg_type.into(),
            ..Default::default()
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Json> {
        self.fields.get(key)
    }

    /// Read a numeric field as an integer, telling a missing field apart from
    /// a mistyped one. Fractional numbers are truncated toward zero.
    pub fn require_integer(&self, key: &str) -> FloodResult<i64> {
        let value = self
            .field(key)
            .ok_or_else(|| FloodError::InvalidRequest(format!("missing '{}' field", key)))?;

        if let Some(v) = value.as_i64() {
            return Ok(v);
        }

        match value.as_f64() {
            Some(f) if f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => {
                Ok(f.trunc() as i64)
            }
            Some(_) => Err(FloodError::InvalidRequest(format!(
                "'{}' is out of range, got {}",
                key, value
            ))),
            None => Err(FloodError::InvalidRequest(format!(
                "'{}' must be a number, got {}",
                key, value
            ))),
        }
    }

    /// Decode the payload fields into a typed request
    pub fn decode<T: DeserializeOwned>(&self) -> FloodResult<T> {
        serde_json::from_value(Json::Object(self.fields.clone()))
            .map_err(|e| FloodError::InvalidRequest(e.to_string()))
    }
}
