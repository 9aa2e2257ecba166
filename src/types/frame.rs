use serde::de::DeserializeOwned;
use serde_json::Value;

/// One decoded frame: the `type` tag plus the whole JSON object it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    kind: String,
    body: Value,
}

impl RawEvent {
    /// Accepts only JSON objects carrying a string `type`.
    pub fn from_value(body: Value) -> Option<Self> {
        let kind = body.get("type")?.as_str()?.to_string();
        Some(Self { kind, body })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The `payload` member used by the report protocol; `Null` when absent.
    pub fn payload(&self) -> &Value {
        self.body.get("payload").unwrap_or(&Value::Null)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Renders a JSON payload as display text: strings verbatim, null as empty,
/// anything else as compact JSON.
pub fn payload_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
