//! Tracks cache reads made while loading, for the `q` message

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use strata_wire::QueryState;

/// Shared across every loader of one request
#[derive(Debug, Clone, Default)]
pub struct QueryTracker {
    states: Arc<Mutex<Vec<QueryState>>>,
}

impl QueryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one read; a later read of the same key replaces the earlier
    pub fn record<K, D>(&self, key: &K, data: &D) -> Result<(), serde_json::Error>
    where
        K: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let state = QueryState {
            key: serde_json::to_value(key)?,
            data: serde_json::to_value(data)?,
            updated_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        match states.iter_mut().find(|existing| existing.key == state.key) {
            Some(existing) => *existing = state,
            None => states.push(state),
        }
        Ok(())
    }

    /// Everything recorded so far, in first-read order
    pub fn snapshot(&self) -> Vec<QueryState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
