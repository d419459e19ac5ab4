//! Context accumulated top-down by preloaders

use serde_json::{Map, Value};

/// Read-only view of every ancestor's preloader output
///
/// Object outputs are shallow-merged into [`LoaderContext::get`]; any output
/// is also available unmerged through [`LoaderContext::level`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderContext {
    merged: Map<String, Value>,
    levels: Vec<(String, Value)>,
}

impl LoaderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged value for `key`, deeper levels overriding shallower ones
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.merged.get(key)
    }

    /// Output of one level's preloader
    pub fn level(&self, level_id: &str) -> Option<&Value> {
        self.levels
            .iter()
            .find(|(id, _)| id == level_id)
            .map(|(_, value)| value)
    }

    pub fn merged(&self) -> &Map<String, Value> {
        &self.merged
    }

    /// Level ids that contributed, shallowest first
    pub fn contributors(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|(id, _)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// New context with `output` layered on top
    pub(crate) fn extended(&self, level_id: &str, output: Value) -> Self {
        let mut next = self.clone();
        if let Value::Object(map) = &output {
            for (key, value) in map {
                next.merged.insert(key.clone(), value.clone());
            }
        }
        next.levels.push((level_id.to_string(), output));
        next
    }
}
