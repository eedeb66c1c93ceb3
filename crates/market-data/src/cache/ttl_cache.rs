//! In-memory TTL cache with per-entry access counts

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Mutex-guarded map of entries that expire `ttl` after insertion.
///
/// Expired entries are evicted lazily on `get` or in bulk by
/// [`cleanup_expired`](Self::cleanup_expired). Nothing is persisted.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    default_ttl: Mutex<Duration>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Mutex::new(default_ttl),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache entries mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn default_ttl(&self) -> Duration {
        *self
            .default_ttl
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies to entries inserted afterwards.
    pub fn set_default_ttl(&self, ttl: Duration) {
        let mut current = self
            .default_ttl
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = ttl;
    }

    /// Returns the value if it has not expired; an expired entry is evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock_entries();
        let now = Instant::now();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                debug!("Cache entry {} expired", key);
                None
            }
            None => None,
        }
    }

    /// Inserts or overwrites with `expires_at = now + ttl`.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
        };
        self.lock_entries().insert(key, entry);
    }

    /// Inserts with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        let ttl = self.default_ttl();
        self.set(key, value, ttl);
    }

    /// Returns true if an entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.lock_entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Entries currently stored, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts every expired entry and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.lock_entries();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Cache sweep evicted {} expired entries", removed);
        }
        removed
    }

    pub fn get_stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        let now = Instant::now();

        let mut items: Vec<CacheEntryStats> = entries
            .iter()
            .map(|(key, entry)| CacheEntryStats {
                key: key.to_string(),
                access_count: entry.access_count,
                age_secs: now.saturating_duration_since(entry.created_at).as_secs(),
                expires_in_secs: entry.expires_at.saturating_duration_since(now).as_secs(),
                expired: entry.is_expired(now),
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            item_count: items.len(),
            expired_count: items.iter().filter(|item| item.expired).count(),
            total_accesses: items.iter().map(|item| item.access_count).sum(),
            default_ttl_secs: self.default_ttl().as_secs(),
            entries: items,
        }
    }
}

/// Cache statistics
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub item_count: usize,
    /// Stored but past expiry, waiting for a get or a sweep
    pub expired_count: usize,
    pub total_accesses: u64,
    pub default_ttl_secs: u64,
    pub entries: Vec<CacheEntryStats>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryStats {
    pub key: String,
    pub access_count: u64,
    pub age_secs: u64,
    pub expires_in_secs: u64,
    pub expired: bool,
}
