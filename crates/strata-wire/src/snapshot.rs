//! Data embedded in a full-document response
//!
//! Equivalent to replaying every loader, chunk, error, head and query message
//! of a streamed response, so the first paint needs no second round trip.

use crate::{DeferredHandle, HeadFields, QueryState, StreamMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Level id → loader data, with settled deferred handles substituted in
    #[serde(default)]
    pub loaders: BTreeMap<String, Option<Value>>,
    /// Level id → defer key → settled handle
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deferred: BTreeMap<String, BTreeMap<String, DeferredHandle>>,
    /// Level id → head fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub heads: BTreeMap<String, HeadFields>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryState>,
}

impl DocumentSnapshot {
    /// Folds one stream message into the snapshot
    pub fn apply(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Loader { level_id, data } => {
                self.loaders.insert(level_id, data);
            }
            StreamMessage::Chunk { level_id, key, data } => {
                self.settle(level_id, DeferredHandle::resolved(key, data));
            }
            StreamMessage::Error {
                level_id,
                key: Some(key),
                error,
            } => {
                self.settle(level_id, DeferredHandle::rejected(key, error));
            }
            StreamMessage::Error { key: None, .. } => {}
            StreamMessage::Head { level_id, head } => {
                let level_id = level_id.unwrap_or_default();
                let merged = self.heads.remove(&level_id).unwrap_or_default().merge(head);
                self.heads.insert(level_id, merged);
            }
            StreamMessage::Query { queries } => self.queries.extend(queries),
            StreamMessage::Ready | StreamMessage::Done => {}
        }
    }

    fn settle(&mut self, level_id: String, handle: DeferredHandle) {
        if let Some(Some(data)) = self.loaders.get_mut(&level_id) {
            handle.substitute_into(data);
        }
        self.deferred
            .entry(level_id)
            .or_default()
            .insert(handle.key.clone(), handle);
    }

    /// Builds a snapshot from a complete message sequence
    pub fn from_messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = StreamMessage>,
    {
        let mut snapshot = Self::default();
        for message in messages {
            snapshot.apply(message);
        }
        snapshot
    }

    /// Replays the snapshot as stream messages in protocol order
    ///
    /// `level_order` fixes the order of loader messages; levels missing from
    /// it follow in id order.
    pub fn to_messages(&self, level_order: &[String]) -> Vec<StreamMessage> {
        let mut ordered: Vec<&String> = level_order
            .iter()
            .filter(|id| self.loaders.contains_key(*id))
            .collect();
        ordered.extend(self.loaders.keys().filter(|id| !level_order.contains(id)));

        let mut messages = Vec::new();
        for level_id in ordered {
            messages.push(StreamMessage::Loader {
                level_id: level_id.clone(),
                data: self.loaders.get(level_id).cloned().flatten(),
            });
            if let Some(head) = self.heads.get(level_id) {
                messages.push(StreamMessage::Head {
                    level_id: Some(level_id.clone()),
                    head: head.clone(),
                });
            }
        }

        if !self.queries.is_empty() {
            messages.push(StreamMessage::Query {
                queries: self.queries.clone(),
            });
        }
        messages.push(StreamMessage::Ready);

        for (level_id, handles) in &self.deferred {
            for handle in handles.values() {
                let result = match &handle.state {
                    crate::DeferredState::Resolved { value } => Ok(value.clone()),
                    crate::DeferredState::Rejected { error } => Err(error.clone()),
                    crate::DeferredState::Pending => continue,
                };
                messages.push(StreamMessage::settlement(level_id.clone(), handle.key.clone(), result));
            }
        }

        messages.push(StreamMessage::Done);
        messages
    }

    /// Merged head for a chain, shallowest level first
    pub fn merged_head(&self, level_order: &[String]) -> HeadFields {
        level_order
            .iter()
            .filter_map(|id| self.heads.get(id))
            .cloned()
            .fold(HeadFields::default(), HeadFields::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorPayload;
    use serde_json::json;

    #[test]
    fn test_chunks_substitute_into_loader_data() {
        let snapshot = DocumentSnapshot::from_messages(vec![
            StreamMessage::Loader {
                level_id: "p".into(),
                data: Some(json!({"reviews": {"$defer": "reviews", "status": "pending"}})),
            },
            StreamMessage::Ready,
            StreamMessage::settlement("p", "reviews", Ok(json!(["great"]))),
            StreamMessage::Done,
        ]);

        assert_eq!(
            snapshot.loaders["p"].as_ref().unwrap()["reviews"],
            json!({"$defer": "reviews", "status": "resolved", "value": ["great"]})
        );
        assert_eq!(snapshot.deferred["p"].len(), 1);
    }

    #[test]
    fn test_replay_keeps_protocol_order() {
        let snapshot = DocumentSnapshot::from_messages(vec![
            StreamMessage::Loader { level_id: "leaf".into(), data: None },
            StreamMessage::Loader { level_id: "_root_".into(), data: None },
            StreamMessage::settlement("leaf", "k", Err(ErrorPayload::new("nope"))),
        ]);

        let tags: String = snapshot
            .to_messages(&["_root_".to_string(), "leaf".to_string()])
            .iter()
            .map(StreamMessage::tag)
            .collect();
        assert_eq!(tags, "llred");
    }
}
