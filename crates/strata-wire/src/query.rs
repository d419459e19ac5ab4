//! Tracked cache reads shipped to the client as one `q` message

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cached query read during loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    /// Query key, usually an array such as `["product", 42]`
    pub key: Value,
    /// Data the loader observed
    pub data: Value,
    /// Milliseconds since the Unix epoch when the data was produced
    pub updated_at: i64,
}
