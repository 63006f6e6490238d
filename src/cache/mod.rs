//! Hybrid key/TTL cache: a distributed primary store with an in-process
//! fallback map.
//!
//! Primary-store failures are absorbed here. A single errored operation
//! downgrades to the fallback map with a warning; callers never see a cache
//! backend error and a long-lived subscription never dies because the cache
//! service went away.
//!
//! Keys follow the `<category>:<scope>` convention (`positions:all`,
//! `predictions:1426,17076`) so monitoring tooling can group them.

mod value;

pub use value::CacheValue;

use crate::error::FeedError;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Fallback-map entry count above which expired entries are swept on write.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 256;

struct FallbackEntry {
    payload: String,
    expires_at: DateTime<Utc>,
}

pub struct HybridCache {
    primary: Option<ConnectionManager>,
    fallback: Mutex<HashMap<String, FallbackEntry>>,
    sweep_threshold: usize,
}

impl HybridCache {
    /// Connects to the distributed store when a URL is configured. A failed
    /// connect is not fatal: the cache runs on the fallback map alone.
    pub async fn connect(redis_url: Option<&str>, sweep_threshold: usize) -> Self {
        let primary = match redis_url {
            Some(url) => match Self::open_primary(url).await {
                Ok(conn) => {
                    info!(url, "primary cache store connected");
                    Some(conn)
                }
                Err(e) => {
                    warn!(url, error = %e, "primary cache store unavailable, using in-process fallback");
                    None
                }
            },
            None => {
                info!("no primary cache store configured, using in-process fallback");
                None
            }
        };

        HybridCache {
            primary,
            fallback: Mutex::new(HashMap::new()),
            sweep_threshold,
        }
    }

    /// A cache with no primary store at all; what tests construct.
    pub fn in_process(sweep_threshold: usize) -> Self {
        HybridCache {
            primary: None,
            fallback: Mutex::new(HashMap::new()),
            sweep_threshold,
        }
    }

    async fn open_primary(url: &str) -> redis::RedisResult<ConnectionManager> {
        let client = redis::Client::open(url)?;
        ConnectionManager::new(client).await
    }

    /// Looks up `key`. Expired entries read as a miss, not a stale value.
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        if let Some(conn) = &self.primary {
            let mut conn = conn.clone();
            match conn.get::<_, Option<String>>(key).await {
                Ok(Some(raw)) => match CacheValue::decode(&raw) {
                    Ok(v) => {
                        debug!(key, "primary cache hit");
                        return Some(v);
                    }
                    Err(e) => {
                        warn!(key, error = %e, "undecodable primary cache payload, treating as miss");
                        return None;
                    }
                },
                Ok(None) => {
                    debug!(key, "primary cache miss");
                    return None;
                }
                Err(e) => {
                    warn!(key, error = %e, "primary cache read failed, consulting fallback");
                }
            }
        }
        self.fallback_get(key)
    }

    /// Stores `value` under `key` for `ttl_secs` seconds. Writes are atomic at
    /// single-key granularity; concurrent writers race benignly (last wins).
    pub async fn set(&self, key: &str, value: &CacheValue, ttl_secs: u64) {
        let payload = match value.encode() {
            Ok(p) => p,
            Err(e) => {
                warn!(key, error = %e, "cache payload failed to encode, skipping store");
                return;
            }
        };

        if let Some(conn) = &self.primary {
            let mut conn = conn.clone();
            match conn.set_ex::<_, _, ()>(key, &payload, ttl_secs).await {
                Ok(()) => {
                    debug!(key, ttl_secs, "primary cache store");
                    return;
                }
                Err(e) => {
                    warn!(key, error = %e, "primary cache write failed, storing in fallback");
                }
            }
        }
        self.fallback_set(key, payload, ttl_secs);
    }

    /// `get`, and on miss run `producer`, store its result, and return it.
    ///
    /// No single-flight guarantee: concurrent misses on the same key may each
    /// invoke `producer` independently. The duplicate upstream fetch on a cold
    /// key is the accepted race.
    pub async fn cached_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        producer: F,
    ) -> Result<CacheValue, FeedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, FeedError>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let produced = producer().await?;
        self.set(key, &produced, ttl_secs).await;
        Ok(produced)
    }

    fn fallback_get(&self, key: &str) -> Option<CacheValue> {
        let mut map = self.fallback.lock().expect("fallback cache lock poisoned");
        let now = Utc::now();
        match map.get(key) {
            Some(entry) if entry.expires_at > now => CacheValue::decode(&entry.payload).ok(),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    fn fallback_set(&self, key: &str, payload: String, ttl_secs: u64) {
        let mut map = self.fallback.lock().expect("fallback cache lock poisoned");
        map.insert(
            key.to_string(),
            FallbackEntry {
                payload,
                expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
            },
        );
        if map.len() > self.sweep_threshold {
            let now = Utc::now();
            let before = map.len();
            map.retain(|_, entry| entry.expires_at > now);
            debug!(swept = before - map.len(), remaining = map.len(), "fallback cache sweep");
        }
    }

    #[cfg(test)]
    fn fallback_len(&self) -> usize {
        self.fallback.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_roundtrips() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        cache
            .set("profiles:1426", &CacheValue::Str("Addison & Clark".into()), 60)
            .await;
        assert_eq!(
            cache.get("profiles:1426").await,
            Some(CacheValue::Str("Addison & Clark".into()))
        );
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        cache.set("positions:all", &CacheValue::Bool(true), 0).await;
        assert_eq!(cache.get("positions:all").await, None);
    }

    #[tokio::test]
    async fn test_cached_absence_is_distinct_from_miss() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        assert_eq!(cache.get("predictions:99999").await, None);

        cache.set("predictions:99999", &CacheValue::Absent, 60).await;
        assert_eq!(cache.get("predictions:99999").await, Some(CacheValue::Absent));
    }

    #[tokio::test]
    async fn test_cached_or_fetch_skips_producer_on_hit() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        cache.set("k", &CacheValue::Num(1.0), 60).await;

        let value = cache
            .cached_or_fetch("k", 60, || async { panic!("producer must not run on a hit") })
            .await
            .unwrap();
        assert_eq!(value, CacheValue::Num(1.0));
    }

    #[tokio::test]
    async fn test_cached_or_fetch_stores_produced_value() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        let value = cache
            .cached_or_fetch("k", 60, || async { Ok(CacheValue::Num(7.0)) })
            .await
            .unwrap();
        assert_eq!(value, CacheValue::Num(7.0));
        assert_eq!(cache.get("k").await, Some(CacheValue::Num(7.0)));
    }

    #[tokio::test]
    async fn test_cached_or_fetch_propagates_producer_error_without_store() {
        let cache = HybridCache::in_process(DEFAULT_SWEEP_THRESHOLD);
        let result = cache
            .cached_or_fetch("k", 60, || async {
                Err(FeedError::Status { status: 503 })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_entries_past_threshold() {
        let cache = HybridCache::in_process(4);
        for i in 0..4 {
            cache.set(&format!("stale:{i}"), &CacheValue::Bool(false), 0).await;
        }
        // Crossing the threshold triggers the sweep, which drops the expired four.
        cache.set("fresh", &CacheValue::Bool(true), 60).await;
        assert_eq!(cache.fallback_len(), 1);
        assert_eq!(cache.get("fresh").await, Some(CacheValue::Bool(true)));
    }
}
