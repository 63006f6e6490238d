//! Splits arbitrary-length identifier lists into provider-legal batches,
//! dispatches them concurrently through the cache, and merges the partial
//! results.
//!
//! Chunk cache keys are built from the sorted, comma-joined identifiers, so
//! key generation does not depend on caller ordering. One chunk failing is
//! logged and omitted from the merge; sibling chunks are unaffected, and the
//! missing identifiers are simply absent rather than populated with partial
//! data.

use crate::bustime::BusTimeApi;
use crate::cache::{CacheValue, HybridCache};
use crate::error::{FeedError, MAX_STOPS_PER_REQUEST};
use crate::model::{BusStopPrediction, BusStopProfile};
use crate::normalize::bustime::{predictions_by_stop, profiles_from_stops};
use chrono::Utc;
use chrono_tz::Tz;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Deduplicates and sorts `codes`, then partitions into chunks of at most the
/// per-request limit. Produces `ceil(n / limit)` chunks for n unique codes.
pub fn chunk_identifiers(codes: &[String]) -> Vec<Vec<String>> {
    let unique: BTreeSet<&String> = codes.iter().filter(|c| !c.is_empty()).collect();
    let sorted: Vec<String> = unique.into_iter().cloned().collect();
    sorted
        .chunks(MAX_STOPS_PER_REQUEST)
        .map(|c| c.to_vec())
        .collect()
}

/// Cache key for one chunk: `<category>:<sorted, comma-joined identifiers>`.
pub fn chunk_cache_key(category: &str, chunk: &[String]) -> String {
    format!("{category}:{}", chunk.join(","))
}

pub struct BatchCoordinator {
    cache: Arc<HybridCache>,
    api: Arc<dyn BusTimeApi>,
    home_zone: Tz,
    profile_ttl_secs: u64,
    prediction_ttl_secs: u64,
}

impl BatchCoordinator {
    pub fn new(
        cache: Arc<HybridCache>,
        api: Arc<dyn BusTimeApi>,
        home_zone: Tz,
        profile_ttl_secs: u64,
        prediction_ttl_secs: u64,
    ) -> Self {
        BatchCoordinator {
            cache,
            api,
            home_zone,
            profile_ttl_secs,
            prediction_ttl_secs,
        }
    }

    /// Profile lookup for any number of stop codes, merged into one map keyed
    /// by code. Failed chunks are logged and their identifiers omitted.
    pub async fn stop_profiles(&self, codes: &[String]) -> HashMap<String, BusStopProfile> {
        let mut merged = HashMap::new();
        for (chunk, result) in self.profile_chunks(codes).await {
            match result {
                Ok(map) => merged.extend(map),
                Err(e) => {
                    warn!(chunk = %chunk.join(","), error = %e, "profile chunk failed, omitting identifiers");
                }
            }
        }
        merged
    }

    /// Like [`stop_profiles`](Self::stop_profiles) but propagating the first
    /// chunk error instead of absorbing it. Stream priming uses this to tell
    /// "upstream is down" apart from "these codes do not exist".
    pub async fn stop_profiles_strict(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, BusStopProfile>, FeedError> {
        let mut merged = HashMap::new();
        for (_, result) in self.profile_chunks(codes).await {
            merged.extend(result?);
        }
        Ok(merged)
    }

    /// Prediction lookup for any number of stop codes, merged into one map
    /// keyed by code. Failed chunks are logged and their identifiers omitted.
    pub async fn stop_predictions(
        &self,
        codes: &[String],
    ) -> HashMap<String, Vec<BusStopPrediction>> {
        let chunks = chunk_identifiers(codes);
        let results = join_all(chunks.iter().map(|chunk| self.prediction_chunk(chunk))).await;

        let mut merged = HashMap::new();
        for (chunk, result) in chunks.iter().zip(results) {
            match result {
                Ok(map) => merged.extend(map),
                Err(e) => {
                    warn!(chunk = %chunk.join(","), error = %e, "prediction chunk failed, omitting identifiers");
                }
            }
        }
        merged
    }

    async fn profile_chunks(
        &self,
        codes: &[String],
    ) -> Vec<(Vec<String>, Result<HashMap<String, BusStopProfile>, FeedError>)> {
        let chunks = chunk_identifiers(codes);
        let results = join_all(chunks.iter().map(|chunk| self.profile_chunk(chunk))).await;
        chunks.into_iter().zip(results).collect()
    }

    async fn profile_chunk(
        &self,
        chunk: &[String],
    ) -> Result<HashMap<String, BusStopProfile>, FeedError> {
        let key = chunk_cache_key("profiles", chunk);
        let value = self
            .cache
            .cached_or_fetch(&key, self.profile_ttl_secs, move || async move {
                let stops = self.api.stops(chunk).await?;
                let map: HashMap<String, BusStopProfile> = profiles_from_stops(&stops)
                    .into_iter()
                    .map(|p| (p.code.clone(), p))
                    .collect();
                Ok(CacheValue::from_serialize(&map)?)
            })
            .await?;
        Ok(value.into_deserialize().unwrap_or_default())
    }

    async fn prediction_chunk(
        &self,
        chunk: &[String],
    ) -> Result<BTreeMap<String, Vec<BusStopPrediction>>, FeedError> {
        let key = chunk_cache_key("predictions", chunk);
        let value = self
            .cache
            .cached_or_fetch(&key, self.prediction_ttl_secs, move || async move {
                let raw = self.api.predictions(chunk).await?;
                let map = predictions_by_stop(&raw, self.home_zone, Utc::now());
                Ok(CacheValue::from_serialize(&map)?)
            })
            .await?;
        Ok(value.into_deserialize().unwrap_or_default())
    }
}
