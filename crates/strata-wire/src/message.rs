//! Stream messages
//!
//! One JSON object per line, discriminated by `t`:
//!
//! | `t` | meaning | fields |
//! |-----|---------|--------|
//! | `l` | loader result for a level | `m`, `d?` |
//! | `c` | resolved deferred chunk | `m`, `k`, `d` |
//! | `e` | rejected deferred value | `m`, `k?`, `e` |
//! | `h` | head metadata | `m?`, `d` |
//! | `q` | tracked query state | `d` |
//! | `r` | ready boundary | |
//! | `d` | done | |

use crate::{ErrorPayload, HeadFields, QueryState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum StreamMessage {
    #[serde(rename = "l")]
    Loader {
        #[serde(rename = "m")]
        level_id: String,
        #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    #[serde(rename = "c")]
    Chunk {
        #[serde(rename = "m")]
        level_id: String,
        #[serde(rename = "k")]
        key: String,
        #[serde(rename = "d")]
        data: Value,
    },
    #[serde(rename = "e")]
    Error {
        #[serde(rename = "m")]
        level_id: String,
        #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(rename = "e")]
        error: ErrorPayload,
    },
    #[serde(rename = "h")]
    Head {
        #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
        level_id: Option<String>,
        #[serde(rename = "d")]
        head: HeadFields,
    },
    #[serde(rename = "q")]
    Query {
        #[serde(rename = "d")]
        queries: Vec<QueryState>,
    },
    #[serde(rename = "r")]
    Ready,
    #[serde(rename = "d")]
    Done,
}

impl StreamMessage {
    /// Message for a settled stream:true deferred entry
    pub fn settlement(
        level_id: impl Into<String>,
        key: impl Into<String>,
        result: Result<Value, ErrorPayload>,
    ) -> Self {
        match result {
            Ok(data) => StreamMessage::Chunk {
                level_id: level_id.into(),
                key: key.into(),
                data,
            },
            Err(error) => StreamMessage::Error {
                level_id: level_id.into(),
                key: Some(key.into()),
                error,
            },
        }
    }

    /// Serializes to one complete newline-terminated line
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|err| {
            let fallback = StreamMessage::Error {
                level_id: String::new(),
                key: None,
                error: ErrorPayload::new(err.to_string()).with_name("EncodeError"),
            };
            serde_json::to_string(&fallback).unwrap_or_default()
        });
        line.push('\n');
        line
    }

    /// Parses one line (with or without its trailing newline)
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
    }

    /// One-letter wire tag
    pub fn tag(&self) -> char {
        match self {
            StreamMessage::Loader { .. } => 'l',
            StreamMessage::Chunk { .. } => 'c',
            StreamMessage::Error { .. } => 'e',
            StreamMessage::Head { .. } => 'h',
            StreamMessage::Query { .. } => 'q',
            StreamMessage::Ready => 'r',
            StreamMessage::Done => 'd',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn wire(msg: &StreamMessage) -> Value {
        serde_json::from_str(&msg.to_line()).unwrap()
    }

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            wire(&StreamMessage::Loader {
                level_id: "_root_".into(),
                data: Some(json!({"user": "ada"}))
            }),
            json!({"t": "l", "m": "_root_", "d": {"user": "ada"}})
        );
        assert_eq!(
            wire(&StreamMessage::Loader { level_id: "_root_".into(), data: None }),
            json!({"t": "l", "m": "_root_"})
        );
        assert_eq!(
            wire(&StreamMessage::settlement("p", "slow", Ok(json!(1)))),
            json!({"t": "c", "m": "p", "k": "slow", "d": 1})
        );
        assert_eq!(
            wire(&StreamMessage::settlement("p", "slow", Err(ErrorPayload::new("x")))),
            json!({"t": "e", "m": "p", "k": "slow", "e": {"message": "x"}})
        );
        assert_eq!(wire(&StreamMessage::Ready), json!({"t": "r"}));
        assert_eq!(wire(&StreamMessage::Done), json!({"t": "d"}));
    }

    #[test]
    fn test_lines_are_newline_terminated() {
        let line = StreamMessage::Query { queries: vec![] }.to_line();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_done_tag_does_not_clash_with_data_field() {
        // `d` is both the done tag and the data field name of other messages
        let parsed = StreamMessage::parse_line(r#"{"t":"d"}"#).unwrap();
        assert_eq!(parsed, StreamMessage::Done);

        let parsed = StreamMessage::parse_line(r#"{"t":"h","d":{"title":"Home"}}"#).unwrap();
        assert_eq!(
            parsed,
            StreamMessage::Head { level_id: None, head: HeadFields::titled("Home") }
        );
    }
}
