//! Per-level freshness metadata
//!
//! Entries are created by the first successful load of a level, refreshed by
//! every later one and only ever marked invalid, never evicted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use strata_router::MatchChain;

/// Freshness of one level's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub updated_at: DateTime<Utc>,
    pub invalid: bool,
    /// Overrides the default stale time for this level
    pub stale_time: Option<Duration>,
}

impl CacheEntry {
    /// Whether the entry must be refetched at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, default_stale_time: Duration) -> bool {
        if self.invalid {
            return true;
        }
        let limit = self.stale_time.unwrap_or(default_stale_time);
        match chrono::Duration::from_std(limit) {
            Ok(limit) => now.signed_duration_since(self.updated_at) > limit,
            // Longer than chrono can represent: never stale by age
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationCache {
    entries: HashMap<String, CacheEntry>,
}

impl NavigationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, level_id: &str) -> Option<&CacheEntry> {
        self.entries.get(level_id)
    }

    /// Records a successful load: `{updated_at: now, invalid: false}`
    pub fn record_loaded(&mut self, level_id: &str, now: DateTime<Utc>, stale_time: Option<Duration>) {
        self.entries.insert(
            level_id.to_string(),
            CacheEntry {
                updated_at: now,
                invalid: false,
                stale_time,
            },
        );
    }

    /// Marks one level for refetch; returns whether it was cached
    pub fn invalidate(&mut self, level_id: &str) -> bool {
        match self.entries.get_mut(level_id) {
            Some(entry) => {
                entry.invalid = true;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.invalid = true;
        }
    }

    /// Marks every level whose id starts with `prefix`; returns how many
    pub fn invalidate_matching(&mut self, prefix: &str) -> usize {
        let mut count = 0;
        for (level_id, entry) in self.entries.iter_mut() {
            if level_id.starts_with(prefix) {
                entry.invalid = true;
                count += 1;
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Level ids of `chain` that need fresh data, in chain order
///
/// A level is needed when its refetch predicate says so, when it has no
/// entry, when its entry is invalid, or when the entry is older than the
/// level's stale time (falling back to `default_stale_time`).
pub fn compute_needed_match_ids<H>(
    chain: &MatchChain<H>,
    cache: &NavigationCache,
    search: &str,
    now: DateTime<Utc>,
    default_stale_time: Duration,
) -> Vec<String> {
    chain
        .iter()
        .filter(|level| {
            let route = &level.route;
            if route.wants_refetch(search) {
                return true;
            }
            match cache.get(&route.level_id) {
                None => true,
                Some(entry) => {
                    let stale_time = route.stale_time.or(entry.stale_time);
                    CacheEntry {
                        stale_time,
                        ..entry.clone()
                    }
                    .is_stale(now, default_stale_time)
                }
            }
        })
        .map(|level| level.route.level_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary_is_exclusive() {
        let now = Utc::now();
        let entry = CacheEntry {
            updated_at: now - chrono::Duration::seconds(60),
            invalid: false,
            stale_time: None,
        };
        assert!(!entry.is_stale(now, Duration::from_secs(60)));
        assert!(entry.is_stale(now + chrono::Duration::milliseconds(1), Duration::from_secs(60)));
    }

    #[test]
    fn test_invalidate_matching_prefix() {
        let now = Utc::now();
        let mut cache = NavigationCache::new();
        cache.record_loaded("_root_", now, None);
        cache.record_loaded("_root_/products", now, None);
        cache.record_loaded("_root_/products/[id]", now, None);

        assert_eq!(cache.invalidate_matching("_root_/products"), 2);
        assert!(!cache.get("_root_").unwrap().invalid);
        assert!(cache.get("_root_/products/[id]").unwrap().invalid);
        assert!(!cache.invalidate("_root_/missing"));
    }
}
