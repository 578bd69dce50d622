//! Policy evaluation cache (C3): a bounded, TTL-scoped map from request
//! fingerprint to `EvaluationResult`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::result::EvaluationResult;

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct Entry {
    result: EvaluationResult,
    inserted_at: Instant,
}

/// Bounded, TTL-scoped cache guarded by a single `RwLock`. Reads take a
/// shared lock; writes (including the batch-expiry sweep) take an
/// exclusive lock, matching the "concurrent-safe... entries expire in
/// batch on a timer" contract in §5.
pub struct PolicyCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, Entry>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Build the cache fingerprint from the fields named in §4.1 step 1.
    pub fn fingerprint(email: &str, role: &str, request_type: &str, query: &str) -> String {
        format!("{email}\u{1}{role}\u{1}{request_type}\u{1}{query}")
    }

    pub fn get(&self, fingerprint: &str) -> Option<EvaluationResult> {
        let entries = self.entries.read();
        let entry = entries.get(fingerprint)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn insert(&self, fingerprint: String, result: EvaluationResult) {
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(&fingerprint) {
            self.evict_oldest_locked(&mut entries);
        }

        entries.insert(
            fingerprint,
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Batch-expire stale entries. Intended to be driven by a periodic
    /// timer task alongside the policy reload loop.
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest_locked(&self, entries: &mut HashMap<String, Entry>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
        }
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_cached_result() {
        let cache = PolicyCache::new();
        let fp = PolicyCache::fingerprint("a@b.com", "user", "chat", "hello");
        cache.insert(fp.clone(), EvaluationResult::new(0.1));
        assert!(cache.get(&fp).is_some());
    }

    #[test]
    fn miss_on_unknown_fingerprint() {
        let cache = PolicyCache::new();
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn ttl_expiry() {
        let cache = PolicyCache::with_capacity(Duration::from_millis(1), 100);
        let fp = "fp".to_string();
        cache.insert(fp.clone(), EvaluationResult::new(0.1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&fp).is_none());
    }

    #[test]
    fn bounded_eviction() {
        let cache = PolicyCache::with_capacity(DEFAULT_TTL, 2);
        cache.insert("a".into(), EvaluationResult::new(0.1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".into(), EvaluationResult::new(0.1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".into(), EvaluationResult::new(0.1));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let cache = PolicyCache::with_capacity(Duration::from_millis(1), 100);
        cache.insert("a".into(), EvaluationResult::new(0.1));
        std::thread::sleep(Duration::from_millis(5));
        let removed = cache.sweep_expired();
        assert_eq!(removed, 1);
        assert!(cache.is_empty());
    }
}
