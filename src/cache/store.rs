//! Cache store implementation
//!
//! In-memory cache with TTL support and prefix-based invalidation.

use super::CacheConfig;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A cached entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached data (JSON bytes)
    pub data: Vec<u8>,
    /// When this entry was created
    pub created_at: Instant,
    /// When this entry expires
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check if this entry has expired
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory content cache
pub struct ContentCache {
    /// The cache storage: storage_key -> entry
    entries: DashMap<String, CacheEntry>,
    /// Configuration
    config: CacheConfig,
    /// Hit counter
    hits: AtomicU64,
    /// Miss counter
    misses: AtomicU64,
    /// Eviction counter
    evictions: AtomicU64,
}

impl ContentCache {
    /// Create a new content cache with configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Get an entry from the cache by storage key
    pub fn get(&self, storage_key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.entries.get(storage_key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = storage_key, "Cache hit");
                return Some(entry.clone());
            }
            // Entry expired, remove it
            drop(entry); // Release the reference before removing
            self.entries.remove(storage_key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = storage_key, "Cache miss");
        None
    }

    /// Store an entry in the cache with explicit TTL
    pub fn set(&self, storage_key: &str, data: Vec<u8>, ttl: Duration) {
        let entry = CacheEntry::new(data, ttl);
        debug!(key = storage_key, ttl_secs = ttl.as_secs(), "Cache set");
        self.entries.insert(storage_key.to_string(), entry);

        // Check if we need to evict entries
        self.maybe_evict();
    }

    /// Remove an entry from the cache
    pub fn remove(&self, storage_key: &str) -> Option<CacheEntry> {
        self.entries.remove(storage_key).map(|(_, entry)| entry)
    }

    /// Invalidate entries matching a pattern (prefix match)
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let keys_to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(pattern))
            .map(|entry| entry.key().clone())
            .collect();

        let count = keys_to_remove.len();
        for key in keys_to_remove {
            self.entries.remove(&key);
        }

        if count > 0 {
            debug!(pattern = pattern, count = count, "Invalidated cache entries");
        }
        count
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.clear();
        info!("Cache cleared");
    }

    /// Remove expired entries
    pub fn cleanup(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
        }

        if count > 0 {
            debug!(count = count, "Cleaned up expired cache entries");
        }
        count
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Evict entries if over capacity (oldest first)
    fn maybe_evict(&self) {
        if self.entries.len() <= self.config.max_entries {
            return;
        }

        // Evict a batch beyond the overflow to avoid thrashing
        let to_evict = self.entries.len() - self.config.max_entries + 100;

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.created_at))
            .collect();

        entries.sort_by_key(|(_, created)| *created);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        debug!(evicted = to_evict, "Evicted cache entries");
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn a background task to periodically cleanup expired entries
pub fn spawn_cleanup_task(cache: Arc<ContentCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.entries,
                hit_rate = format!("{:.1}%", stats.hit_rate()),
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::CreditListKey;

    #[test]
    fn test_cache_get_set() {
        let cache = ContentCache::with_defaults();
        let key = "credits:list:abc123";

        // Miss initially
        assert!(cache.get(key).is_none());

        // Set and get
        cache.set(key, b"[]".to_vec(), Duration::from_secs(60));
        let entry = cache.get(key).expect("Should have entry");
        assert_eq!(entry.data, b"[]");

        // Stats
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = ContentCache::with_defaults();
        let key = "credits:list:expiring";

        cache.set(key, b"will expire".to_vec(), Duration::from_millis(10));

        // Should exist immediately
        assert!(cache.get(key).is_some());

        // Wait for expiry
        std::thread::sleep(Duration::from_millis(20));

        // Should be gone
        assert!(cache.get(key).is_none());
    }

    #[test]
    fn test_invalidate_pattern() {
        let cache = ContentCache::with_defaults();
        let ttl = Duration::from_secs(60);

        cache.set("credits:list:a", b"a".to_vec(), ttl);
        cache.set("credits:stats", b"b".to_vec(), ttl);
        cache.set("users:profile:x", b"c".to_vec(), ttl);

        assert_eq!(cache.stats().entries, 3);

        // A credit write invalidates every credit-derived entry
        let removed = cache.invalidate_pattern("credits:");
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.get("users:profile:x").is_some());
    }

    #[test]
    fn test_filtered_listings_never_share_entries() {
        // Regression coverage for the parameterized key scheme: a cached
        // page for one filter must be invisible to a different filter
        let cache = ContentCache::with_defaults();
        let ttl = Duration::from_secs(60);

        let available = CreditListKey {
            page: 1,
            limit: 20,
            status: Some("Available".into()),
            ..Default::default()
        };
        let sold = CreditListKey {
            status: Some("Sold".into()),
            ..available.clone()
        };

        cache.set(&available.to_storage_key(), b"available-page".to_vec(), ttl);

        assert!(cache.get(&sold.to_storage_key()).is_none());
        assert_eq!(
            cache.get(&available.to_storage_key()).unwrap().data,
            b"available-page"
        );
    }

    #[test]
    fn test_eviction_over_capacity() {
        let config = CacheConfig {
            max_entries: 10,
            ..CacheConfig::default()
        };
        let cache = ContentCache::new(config);
        let ttl = Duration::from_secs(60);

        for i in 0..120 {
            cache.set(&format!("credits:list:{}", i), vec![0u8; 8], ttl);
        }

        assert!(cache.stats().entries <= 110);
        assert!(cache.stats().evictions > 0);
    }
}
