//! Snapshot and subscription operations composing the clients, the cache, the
//! batching coordinator, and the normalizers.
//!
//! Cache keys follow `<category>:<scope>`: position snapshots are keyed by
//! route or "all", alerts under `alerts:all`, and profile/prediction batches
//! by their sorted identifier chunk (see [`crate::batch`]).

use crate::cache::CacheValue;
use crate::context::AppContext;
use crate::error::FeedError;
use crate::model::{BusPosition, BusStopPrediction, BusStopProfile, ServiceAlert};
use crate::normalize;
use crate::stream::PollingStream;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Current vehicle positions, cached per route scope. With no route the
/// binary feed supplies the whole fleet; with a route the JSON upstream is
/// asked for just that route's vehicles.
pub async fn position_snapshot(
    ctx: &AppContext,
    route: Option<&str>,
) -> Result<Vec<BusPosition>, FeedError> {
    let key = format!("positions:{}", route.unwrap_or("all"));
    let value = ctx
        .cache
        .cached_or_fetch(&key, ctx.ttl.positions_secs, move || async move {
            let positions = match route {
                None => {
                    let feed = ctx.realtime.fetch_feed().await?;
                    normalize::realtime::positions_from_feed(&feed)
                }
                Some(route) => {
                    let raw = ctx.bustime.vehicles(route).await?;
                    normalize::bustime::positions_from_vehicles(&raw, ctx.home_zone)
                }
            };
            Ok(CacheValue::from_serialize(&positions)?)
        })
        .await?;
    Ok(value.into_deserialize().unwrap_or_default())
}

/// Current service alerts from the binary feed, cached under `alerts:all`.
pub async fn alert_snapshot(ctx: &AppContext) -> Result<Vec<ServiceAlert>, FeedError> {
    let value = ctx
        .cache
        .cached_or_fetch("alerts:all", ctx.ttl.alerts_secs, move || async move {
            let feed = ctx.realtime.fetch_feed().await?;
            Ok(CacheValue::from_serialize(&normalize::realtime::alerts_from_feed(&feed))?)
        })
        .await?;
    Ok(value.into_deserialize().unwrap_or_default())
}

/// Profile lookup for any number of stop codes.
pub async fn stop_profiles(
    ctx: &AppContext,
    codes: &[String],
) -> HashMap<String, BusStopProfile> {
    ctx.coordinator().stop_profiles(codes).await
}

/// Prediction lookup for any number of stop codes, keyed by code.
pub async fn stop_predictions(
    ctx: &AppContext,
    codes: &[String],
) -> HashMap<String, Vec<BusStopPrediction>> {
    ctx.coordinator().stop_predictions(codes).await
}

/// Continuous position snapshots on the context's polling interval.
pub fn watch_positions(
    ctx: Arc<AppContext>,
    route: Option<String>,
) -> PollingStream<Vec<BusPosition>> {
    let interval = ctx.poll_interval;
    PollingStream::spawn(interval, move || {
        let ctx = ctx.clone();
        let route = route.clone();
        async move { position_snapshot(&ctx, route.as_deref()).await }
    })
}

/// Continuous alert snapshots on the context's polling interval.
pub fn watch_alerts(ctx: Arc<AppContext>) -> PollingStream<Vec<ServiceAlert>> {
    let interval = ctx.poll_interval;
    PollingStream::spawn(interval, move || {
        let ctx = ctx.clone();
        async move { alert_snapshot(&ctx).await }
    })
}

/// Continuous merged predictions for a set of stop codes, sorted by arrival.
///
/// Priming validates the codes through a strict profile lookup: when none of
/// them resolve upstream the stream ends with
/// [`FeedError::UnknownIdentifier`]; an upstream failure during validation
/// propagates as transient instead.
pub fn watch_stop_predictions(
    ctx: Arc<AppContext>,
    codes: Vec<String>,
) -> PollingStream<Vec<BusStopPrediction>> {
    let interval = ctx.poll_interval;
    let mut primed = false;
    PollingStream::spawn(interval, move || {
        let ctx = ctx.clone();
        let codes = codes.clone();
        let validate = !primed;
        primed = true;
        async move {
            let coordinator = ctx.coordinator();
            if validate && !codes.is_empty() {
                let profiles = coordinator.stop_profiles_strict(&codes).await?;
                if profiles.is_empty() {
                    return Err(FeedError::UnknownIdentifier(codes.join(",")));
                }
            }
            let by_stop = coordinator.stop_predictions(&codes).await;
            let mut merged: Vec<BusStopPrediction> = by_stop.into_values().flatten().collect();
            merged.sort_by_key(|p| p.arrival);
            Ok(merged)
        }
    })
}

/// Countdown freshness depends on the provider's clock, not ours; surface it
/// for display layers that want to show "as of" times.
pub async fn provider_now(ctx: &AppContext) -> Result<chrono::DateTime<Utc>, FeedError> {
    ctx.bustime.system_time().await
}
