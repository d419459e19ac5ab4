//! Explicit placeholder for a deferred value
//!
//! A deferred value is serialized into loader data as a tagged handle:
//!
//! ```json
//! {"$defer": "reviews", "status": "pending"}
//! {"$defer": "reviews", "status": "resolved", "value": [...]}
//! {"$defer": "reviews", "status": "rejected", "error": {"message": "..."}}
//! ```
//!
//! Consumers inspect `status` instead of relying on object identity.

use crate::ErrorPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key that marks an object as a deferred handle
pub const DEFER_MARKER: &str = "$defer";

/// Settlement state of a deferred value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeferredState {
    Pending,
    Resolved { value: Value },
    Rejected { error: ErrorPayload },
}

/// A deferred value as seen inside loader data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredHandle {
    #[serde(rename = "$defer")]
    pub key: String,
    #[serde(flatten)]
    pub state: DeferredState,
}

impl DeferredHandle {
    pub fn pending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: DeferredState::Pending,
        }
    }

    pub fn resolved(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            state: DeferredState::Resolved { value },
        }
    }

    pub fn rejected(key: impl Into<String>, error: ErrorPayload) -> Self {
        Self {
            key: key.into(),
            state: DeferredState::Rejected { error },
        }
    }

    /// Builds the settled handle for a producer result
    pub fn settled(key: impl Into<String>, result: Result<Value, ErrorPayload>) -> Self {
        match result {
            Ok(value) => Self::resolved(key, value),
            Err(error) => Self::rejected(key, error),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DeferredState::Pending)
    }

    /// Reads a handle out of a JSON value, if it is one
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object()?.get(DEFER_MARKER)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Replaces every pending handle for `key` inside `data` with `self`
    ///
    /// Returns the number of replaced handles.
    pub fn substitute_into(&self, data: &mut Value) -> usize {
        if self.is_pending_slot(data) {
            *data = self.to_value();
            return 1;
        }

        match data {
            Value::Object(map) => map.values_mut().map(|v| self.substitute_into(v)).sum(),
            Value::Array(items) => items.iter_mut().map(|v| self.substitute_into(v)).sum(),
            _ => 0,
        }
    }

    fn is_pending_slot(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|map| {
            map.get(DEFER_MARKER).and_then(Value::as_str) == Some(self.key.as_str())
                && map.get("status").and_then(Value::as_str) == Some("pending")
        })
    }
}

impl From<DeferredHandle> for Value {
    fn from(handle: DeferredHandle) -> Self {
        handle.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_handle_shapes() {
        assert_eq!(
            DeferredHandle::pending("reviews").to_value(),
            json!({"$defer": "reviews", "status": "pending"})
        );
        assert_eq!(
            DeferredHandle::resolved("reviews", json!([1, 2])).to_value(),
            json!({"$defer": "reviews", "status": "resolved", "value": [1, 2]})
        );
        assert_eq!(
            DeferredHandle::rejected("reviews", ErrorPayload::new("timeout")).to_value(),
            json!({"$defer": "reviews", "status": "rejected", "error": {"message": "timeout"}})
        );
    }

    #[test]
    fn test_from_value_ignores_plain_objects() {
        assert!(DeferredHandle::from_value(&json!({"status": "pending"})).is_none());
        let handle = DeferredHandle::from_value(&json!({"$defer": "k", "status": "pending"})).unwrap();
        assert!(handle.is_pending());
    }

    #[test]
    fn test_substitute_nested_pending_only() {
        let mut data = json!({
            "product": {"id": 1},
            "sections": [
                {"stock": {"$defer": "stock", "status": "pending"}},
                {"other": {"$defer": "other", "status": "pending"}}
            ]
        });

        let replaced = DeferredHandle::resolved("stock", json!(7)).substitute_into(&mut data);
        assert_eq!(replaced, 1);
        assert_eq!(
            data["sections"][0]["stock"],
            json!({"$defer": "stock", "status": "resolved", "value": 7})
        );
        assert_eq!(data["sections"][1]["other"]["status"], json!("pending"));
    }
}
