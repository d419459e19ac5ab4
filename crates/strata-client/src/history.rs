//! History entry state
//!
//! Every push mints a fresh key; replaces keep the current one. The key is
//! what scroll positions are stored under.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_router::Params;

/// How the entry's data was first delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavFormat {
    /// Server-rendered document
    Document,
    /// Client-side navigation over the data stream
    #[default]
    Stream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub pathname: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub hash: String,
    pub key: String,
    #[serde(default)]
    pub nav_format: NavFormat,
    #[serde(default)]
    pub history_index: u64,
}

/// Fresh history key, unique for the life of the session
pub fn new_history_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl HistoryState {
    /// State for the first entry of a session
    pub fn initial(location: Location, params: Params, nav_format: NavFormat) -> Self {
        Self {
            pathname: location.pathname,
            params,
            search: location.search,
            hash: location.hash,
            key: new_history_key(),
            nav_format,
            history_index: 0,
        }
    }

    /// State for a push on top of `self`: new key, next index
    pub fn pushed(&self, location: Location, params: Params, nav_format: NavFormat) -> Self {
        Self {
            pathname: location.pathname,
            params,
            search: location.search,
            hash: location.hash,
            key: new_history_key(),
            nav_format,
            history_index: self.history_index + 1,
        }
    }

    /// State replacing `self`: same key, same index
    pub fn replaced(&self, location: Location, params: Params, nav_format: NavFormat) -> Self {
        Self {
            pathname: location.pathname,
            params,
            search: location.search,
            hash: location.hash,
            key: self.key.clone(),
            nav_format,
            history_index: self.history_index,
        }
    }

    /// Reads a state stored by someone else
    ///
    /// Returns `None` for anything without a string `pathname` and `key`,
    /// so foreign or legacy entries never break navigation.
    pub fn parse(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        object.get("pathname")?.as_str()?;
        object.get("key")?.as_str()?;

        match serde_json::from_value(value.clone()) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::debug!("Ignoring unreadable history state: {}", err);
                None
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn location(&self) -> Location {
        Location {
            pathname: self.pathname.clone(),
            search: self.search.clone(),
            hash: self.hash.clone(),
        }
    }
}

/// A split href
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    /// Query string without the leading `?`
    pub search: String,
    /// Fragment without the leading `#`
    pub hash: String,
}

impl Location {
    pub fn parse(href: &str) -> Self {
        let (rest, hash) = match href.split_once('#') {
            Some((rest, hash)) => (rest, hash.to_string()),
            None => (href, String::new()),
        };
        let (pathname, search) = match rest.split_once('?') {
            Some((path, query)) => (path, query.to_string()),
            None => (rest, String::new()),
        };

        Self {
            pathname: if pathname.is_empty() { "/".to_string() } else { pathname.to_string() },
            search,
            hash,
        }
    }

    /// Same document: only the hash may differ
    pub fn same_document(&self, other: &Location) -> bool {
        self.pathname == other.pathname && self.search == other.search
    }

    pub fn href(&self) -> String {
        let mut href = self.pathname.clone();
        if !self.search.is_empty() {
            href.push('?');
            href.push_str(&self.search);
        }
        if !self.hash.is_empty() {
            href.push('#');
            href.push_str(&self.hash);
        }
        href
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_push_mints_key_and_replace_keeps_it() {
        let first = HistoryState::initial(Location::parse("/"), Params::new(), NavFormat::Document);
        let pushed = first.pushed(Location::parse("/a"), Params::new(), NavFormat::Stream);
        let replaced = pushed.replaced(Location::parse("/b"), Params::new(), NavFormat::Stream);

        assert_ne!(first.key, pushed.key);
        assert_eq!(pushed.history_index, 1);
        assert_eq!(replaced.key, pushed.key);
        assert_eq!(replaced.history_index, 1);
        assert_eq!(replaced.pathname, "/b");
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!("legacy"))]
    #[case(json!({"key": "k"}))]
    #[case(json!({"pathname": "/"}))]
    #[case(json!({"pathname": 3, "key": "k"}))]
    fn test_parse_rejects_foreign_values(#[case] value: Value) {
        assert_eq!(HistoryState::parse(&value), None);
    }

    #[test]
    fn test_parse_fills_defaults() {
        let state = HistoryState::parse(&json!({"pathname": "/docs", "key": "abc", "extra": 1})).unwrap();
        assert_eq!(state.key, "abc");
        assert_eq!(state.history_index, 0);
        assert_eq!(state.nav_format, NavFormat::Stream);
        assert_eq!(HistoryState::parse(&state.to_value()), Some(state));
    }

    #[test]
    fn test_location_parse() {
        let location = Location::parse("/docs/a?x=1#intro");
        assert_eq!(location.pathname, "/docs/a");
        assert_eq!(location.search, "x=1");
        assert_eq!(location.hash, "intro");
        assert_eq!(location.href(), "/docs/a?x=1#intro");
        assert_eq!(Location::parse("?q=1").pathname, "/");
    }
}
