//! Wire shape of an error: `{message, name?, stack?}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which a failed level's data carries its error
pub const ERROR_MARKER: &str = "$error";

/// A serializable error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: None,
            stack: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Wraps this error as a level's data: `{"$error": {...}}`
    pub fn into_level_data(self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(
            ERROR_MARKER.to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }

    /// Extracts the error from a level's data, if the level failed
    pub fn from_level_data(data: &Value) -> Option<Self> {
        let inner = data.as_object()?.get(ERROR_MARKER)?;
        serde_json::from_value(inner.clone()).ok()
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<anyhow::Error> for ErrorPayload {
    fn from(err: anyhow::Error) -> Self {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let payload = ErrorPayload::new(err.to_string()).with_name("Error");

        if causes.is_empty() {
            payload
        } else {
            payload.with_stack(causes.join("\n"))
        }
    }
}
