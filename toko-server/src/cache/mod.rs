//! In-process cache for storefront listings
//!
//! Product listings are read-heavy and change only when stock is sold
//! or an admin edits the catalog, so rendered responses are cached and
//! dropped wholesale on any mutation.

use dashmap::DashMap;

use crate::util::now_millis;

struct CacheEntry {
    expires_at: i64,
    value: serde_json::Value,
}

/// TTL cache for rendered listing payloads
///
/// Keys are route-shaped ("listing", "product:slug"). Writers call
/// [`ListingCache::clear`] after every catalog or stock mutation.
pub struct ListingCache {
    ttl_ms: i64,
    entries: DashMap<String, CacheEntry>,
}

impl ListingCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            entries: DashMap::new(),
        }
    }

    /// Get a cached value if present and not expired
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now_millis() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Cache a value under the given key
    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                expires_at: now_millis() + self.ttl_ms,
                value,
            },
        );
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        // 30 seconds is plenty for a storefront page
        Self::new(30_000)
    }
}
