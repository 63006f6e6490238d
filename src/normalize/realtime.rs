//! Normalization of the binary GTFS-Realtime feed.

use crate::model::{BusPosition, BusStopPrediction, Direction, ServiceAlert, Severity};
use crate::normalize::text::clean_alert_text;
use chrono::{DateTime, Utc};
use gtfs_realtime::alert::SeverityLevel;
use gtfs_realtime::{FeedMessage, TranslatedString};
use std::collections::{BTreeMap, BTreeSet};

/// GTFS `direction_id` convention on this feed: 0 is outbound, 1 is inbound.
pub fn direction_from_gtfs(direction_id: u32) -> Direction {
    if direction_id == 0 {
        Direction::Outbound
    } else {
        Direction::Inbound
    }
}

/// Maps every well-formed vehicle entity to a [`BusPosition`], sorted by
/// vehicle id. Entities without a resolvable vehicle id, route id, or finite
/// coordinates are dropped.
pub fn positions_from_feed(feed: &FeedMessage) -> Vec<BusPosition> {
    let header_time = feed
        .header
        .timestamp
        .and_then(|t| DateTime::from_timestamp(t as i64, 0));

    let mut out = Vec::new();
    for entity in &feed.entity {
        let Some(vehicle) = &entity.vehicle else {
            continue;
        };
        let Some(position) = &vehicle.position else {
            continue;
        };
        let latitude = position.latitude as f64;
        let longitude = position.longitude as f64;
        if !latitude.is_finite() || !longitude.is_finite() {
            continue;
        }

        // Prefer the descriptor id; the entity id is an acceptable stand-in.
        let vehicle_id = vehicle
            .vehicle
            .as_ref()
            .and_then(|d| d.id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| (!entity.id.is_empty()).then(|| entity.id.clone()));
        let Some(vehicle_id) = vehicle_id else {
            continue;
        };
        let Some(route_id) = vehicle
            .trip
            .as_ref()
            .and_then(|t| t.route_id.clone())
            .filter(|r| !r.is_empty())
        else {
            continue;
        };

        let timestamp = vehicle
            .timestamp
            .and_then(|t| DateTime::from_timestamp(t as i64, 0))
            .or(header_time)
            .unwrap_or_else(Utc::now);

        out.push(BusPosition {
            vehicle_id,
            route_id,
            latitude,
            longitude,
            heading: position.bearing,
            speed_ms: position.speed, // already meters/second on this feed
            timestamp,
            trip_id: vehicle.trip.as_ref().and_then(|t| t.trip_id.clone()),
            stop_sequence: vehicle.current_stop_sequence,
        });
    }
    out.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
    out
}

/// Maps trip-update entities to per-stop predictions keyed by GTFS stop_id,
/// each list sorted ascending by arrival. Updates without a vehicle id, or
/// stop entries missing both arrival and departure, are dropped.
pub fn predictions_from_feed(
    feed: &FeedMessage,
    now: DateTime<Utc>,
) -> BTreeMap<String, Vec<BusStopPrediction>> {
    let mut by_stop: BTreeMap<String, Vec<BusStopPrediction>> = BTreeMap::new();

    for entity in &feed.entity {
        let Some(update) = &entity.trip_update else {
            continue;
        };
        let Some(vehicle_id) = update
            .vehicle
            .as_ref()
            .and_then(|d| d.id.clone())
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        let trip_id = update.trip.trip_id.clone();
        let direction = update.trip.direction_id.map(direction_from_gtfs);

        for stop_update in &update.stop_time_update {
            let Some(stop_id) = stop_update.stop_id.clone().filter(|s| !s.is_empty()) else {
                continue;
            };
            let arrival_secs = stop_update.arrival.as_ref().and_then(|ev| ev.time);
            let departure_secs = stop_update.departure.as_ref().and_then(|ev| ev.time);
            let Some(arrival) = arrival_secs
                .or(departure_secs)
                .and_then(|t| DateTime::from_timestamp(t, 0))
            else {
                continue;
            };
            let departure = departure_secs
                .and_then(|t| DateTime::from_timestamp(t, 0))
                .unwrap_or(arrival);

            let minutes_away = (arrival - now).num_minutes().max(0) as u32;

            by_stop.entry(stop_id).or_default().push(BusStopPrediction {
                vehicle_id: vehicle_id.clone(),
                trip_id: trip_id.clone(),
                arrival,
                departure,
                minutes_away,
                direction,
                distance_feet: None,
            });
        }
    }

    for predictions in by_stop.values_mut() {
        predictions.sort_by_key(|p| p.arrival);
    }
    by_stop
}

/// Maps alert entities to [`ServiceAlert`]s, sorted by id. Alerts whose header
/// cleans down to nothing are dropped.
pub fn alerts_from_feed(feed: &FeedMessage) -> Vec<ServiceAlert> {
    let mut out = Vec::new();
    for entity in &feed.entity {
        let Some(alert) = &entity.alert else {
            continue;
        };
        let header = match alert.header_text.as_ref().map(translated_text) {
            Some(raw) => clean_alert_text(&raw),
            None => String::new(),
        };
        if header.is_empty() {
            continue;
        }
        let description = alert
            .description_text
            .as_ref()
            .map(translated_text)
            .map(|raw| clean_alert_text(&raw))
            .filter(|s| !s.is_empty());

        let severity = match alert.severity_level() {
            SeverityLevel::Warning => Severity::Warning,
            SeverityLevel::Severe => Severity::Severe,
            SeverityLevel::Info | SeverityLevel::UnknownSeverity => Severity::Info,
        };

        let period = alert.active_period.first();
        let active_start = period
            .and_then(|p| p.start)
            .and_then(|t| DateTime::from_timestamp(t as i64, 0));
        let active_end = period
            .and_then(|p| p.end)
            .and_then(|t| DateTime::from_timestamp(t as i64, 0));

        let mut route_ids = BTreeSet::new();
        let mut stop_ids = BTreeSet::new();
        for informed in &alert.informed_entity {
            if let Some(route) = informed.route_id.clone().filter(|r| !r.is_empty()) {
                route_ids.insert(route);
            }
            if let Some(stop) = informed.stop_id.clone().filter(|s| !s.is_empty()) {
                stop_ids.insert(stop);
            }
        }

        out.push(ServiceAlert {
            id: entity.id.clone(),
            header,
            description,
            severity,
            active_start,
            active_end,
            route_ids,
            stop_ids,
        });
    }
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Picks the English translation when tagged, the first entry otherwise.
fn translated_text(text: &TranslatedString) -> String {
    text.translation
        .iter()
        .find(|t| t.language.as_deref() == Some("en"))
        .or_else(|| text.translation.first())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}
