use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use keyloom_common::SourceTag;

use crate::source::{CallParams, SourcePayload};

/// Cache identity: source + normalized query + geo + language. Cached
/// provider data is not project-specific, so one cache may back every
/// gateway in the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceTag,
    pub query: String,
    pub geo: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(source: SourceTag, query: &str, params: &CallParams) -> Self {
        Self {
            source,
            query: query.to_string(),
            geo: params.geo.clone(),
            language: params.language.clone(),
        }
    }
}

struct CacheEntry {
    value: SourcePayload,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) <= self.ttl
    }
}

/// Cache-aside store for provider responses. An entry is never returned
/// past its TTL; expired entries are dropped lazily on access.
#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<SourcePayload> {
        let now = Instant::now();
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
                Some(_) => {} // stale — fall through to evict
                None => return None,
            }
        }
        self.entries.write().expect("cache lock poisoned").remove(key);
        None
    }

    pub fn insert(&self, key: CacheKey, value: SourcePayload, ttl: Duration) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries.write().expect("cache lock poisoned").insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use keyloom_common::{TrendSummary, VolumeMetrics};

    use super::*;

    fn ads_payload(volume: u64) -> SourcePayload {
        SourcePayload::Ads(VolumeMetrics { volume, cpc: 1.2 })
    }

    fn key(query: &str) -> CacheKey {
        CacheKey::new(SourceTag::Ads, query, &CallParams::default())
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl() {
        let cache = ResponseCache::new();
        cache.insert(key("seo tools"), ads_payload(1000), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(30)).await;
        let hit = cache.get(&key("seo tools")).unwrap();
        assert_eq!(hit.as_ads().unwrap().volume, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_a_miss() {
        let cache = ResponseCache::new();
        cache.insert(key("seo tools"), ads_payload(1000), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get(&key("seo tools")).is_none());
        // Evicted, not just hidden.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_scope_by_geo_and_language() {
        let cache = ResponseCache::new();
        let us = CacheKey::new(SourceTag::Ads, "seo tools", &CallParams::new("US", "en"));
        let au = CacheKey::new(SourceTag::Ads, "seo tools", &CallParams::new("AU", "en"));
        cache.insert(us.clone(), ads_payload(1000), Duration::from_secs(60));

        assert!(cache.get(&us).is_some());
        assert!(cache.get(&au).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_the_clock() {
        let cache = ResponseCache::new();
        cache.insert(key("q"), ads_payload(1), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.insert(key("q"), ads_payload(2), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;

        let hit = cache.get(&key("q")).unwrap();
        assert_eq!(hit.as_ads().unwrap().volume, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn payload_kinds_do_not_collide() {
        let cache = ResponseCache::new();
        let trend_key = CacheKey::new(SourceTag::Trends, "q", &CallParams::default());
        cache.insert(
            trend_key.clone(),
            SourcePayload::Trend(TrendSummary::from_delta(0.3, false)),
            Duration::from_secs(60),
        );
        cache.insert(key("q"), ads_payload(9), Duration::from_secs(60));

        assert!(cache.get(&trend_key).unwrap().as_trend().is_some());
        assert!(cache.get(&key("q")).unwrap().as_ads().is_some());
    }
}
