//! LRU store of scroll positions keyed by history key

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_SCROLL_CAPACITY: usize = 50;

/// Session storage key the store persists under
pub const SCROLL_STORAGE_KEY: &str = "strata:scroll";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub const TOP: ScrollPosition = ScrollPosition { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where the view should scroll once a navigation renders
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Top,
    Position(ScrollPosition),
    /// Element id from the URL fragment
    Anchor(String),
}

/// Opaque per-session key/value storage
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String);
}

/// In-memory [`SessionStorage`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.items.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone)]
struct Slot {
    position: ScrollPosition,
    tick: u64,
}

/// Fixed-capacity LRU map from history key to scroll position
///
/// `recency` orders keys by their last save; the smallest tick is evicted.
#[derive(Debug, Clone)]
pub struct ScrollStore {
    capacity: usize,
    slots: HashMap<String, Slot>,
    recency: BTreeMap<u64, String>,
    tick: u64,
}

#[derive(Serialize, Deserialize)]
struct SavedEntry {
    key: String,
    #[serde(flatten)]
    position: ScrollPosition,
}

impl ScrollStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Inserts or refreshes `key`, evicting the least recently saved entry
    /// when over capacity
    pub fn save(&mut self, key: &str, position: ScrollPosition) {
        self.tick += 1;
        let tick = self.tick;

        if let Some(previous) = self.slots.insert(key.to_string(), Slot { position, tick }) {
            self.recency.remove(&previous.tick);
        }
        self.recency.insert(tick, key.to_string());

        while self.slots.len() > self.capacity {
            let Some((_, evicted)) = self.recency.pop_first() else {
                break;
            };
            self.slots.remove(&evicted);
        }
    }

    /// Reads a position without touching recency
    pub fn get(&self, key: &str) -> Option<ScrollPosition> {
        self.slots.get(key).map(|slot| slot.position)
    }

    pub fn remove(&mut self, key: &str) -> Option<ScrollPosition> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.position)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently saved
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &str> {
        self.recency.values().map(String::as_str)
    }

    /// Target for a back/forward navigation to `key`
    pub fn restore_target(&self, key: &str) -> ScrollTarget {
        match self.get(key) {
            Some(position) => ScrollTarget::Position(position),
            None => ScrollTarget::Top,
        }
    }

    /// JSON array ordered least to most recent
    pub fn to_json(&self) -> String {
        let entries: Vec<SavedEntry> = self
            .recency
            .values()
            .filter_map(|key| {
                self.slots.get(key).map(|slot| SavedEntry {
                    key: key.clone(),
                    position: slot.position,
                })
            })
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    /// Rebuilds a store from [`ScrollStore::to_json`] output
    pub fn from_json(json: &str, capacity: usize) -> Result<Self, serde_json::Error> {
        let entries: Vec<SavedEntry> = serde_json::from_str(json)?;
        let mut store = Self::new(capacity);
        for entry in entries {
            store.save(&entry.key, entry.position);
        }
        Ok(store)
    }

    pub fn persist<S: SessionStorage + ?Sized>(&self, storage: &mut S) {
        storage.set_item(SCROLL_STORAGE_KEY, self.to_json());
    }

    /// Restores from storage, starting empty when nothing usable is stored
    pub fn restore<S: SessionStorage + ?Sized>(storage: &S, capacity: usize) -> Self {
        storage
            .get_item(SCROLL_STORAGE_KEY)
            .and_then(|json| match Self::from_json(&json, capacity) {
                Ok(store) => Some(store),
                Err(err) => {
                    tracing::debug!("Discarding stored scroll positions: {}", err);
                    None
                }
            })
            .unwrap_or_else(|| Self::new(capacity))
    }
}

impl Default for ScrollStore {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(y: f64) -> ScrollPosition {
        ScrollPosition::new(0.0, y)
    }

    #[test]
    fn test_overflow_evicts_least_recent() {
        let mut store = ScrollStore::new(3);
        store.save("a", at(1.0));
        store.save("b", at(2.0));
        store.save("c", at(3.0));
        store.save("d", at(4.0));

        assert!(!store.contains("a"));
        assert_eq!(store.len(), 3);
        assert_eq!(store.keys_by_recency().collect::<Vec<_>>(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_resave_refreshes_recency() {
        let mut store = ScrollStore::new(3);
        store.save("a", at(1.0));
        store.save("b", at(2.0));
        store.save("c", at(3.0));
        store.save("a", at(10.0));
        store.save("d", at(4.0));

        assert_eq!(store.get("a"), Some(at(10.0)));
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_default_capacity_is_fifty() {
        let mut store = ScrollStore::default();
        for i in 0..60 {
            store.save(&format!("k{}", i), at(i as f64));
        }
        assert_eq!(store.len(), 50);
        assert!(!store.contains("k9"));
        assert!(store.contains("k10"));
    }

    #[test]
    fn test_restore_target() {
        let mut store = ScrollStore::default();
        store.save("seen", at(120.0));
        assert_eq!(store.restore_target("seen"), ScrollTarget::Position(at(120.0)));
        assert_eq!(store.restore_target("unseen"), ScrollTarget::Top);
    }

    #[test]
    fn test_session_storage_snapshot_keeps_order() {
        let mut store = ScrollStore::new(2);
        store.save("a", at(1.0));
        store.save("b", at(2.0));
        store.save("a", at(3.0));

        let mut storage = MemoryStorage::default();
        store.persist(&mut storage);
        let mut restored = ScrollStore::restore(&storage, 2);
        assert_eq!(restored.get("a"), Some(at(3.0)));

        // "b" is still the least recent after the round trip
        restored.save("c", at(4.0));
        assert!(!restored.contains("b"));
        assert!(restored.contains("a"));
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let mut storage = MemoryStorage::default();
        storage.set_item(SCROLL_STORAGE_KEY, "{not json".to_string());
        assert!(ScrollStore::restore(&storage, 5).is_empty());
    }
}
