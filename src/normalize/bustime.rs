//! Normalization of the JSON upstream's raw records.

use crate::bustime::payload::{RawPrediction, RawStop, RawVehicle};
use crate::model::{BusPosition, BusStopPrediction, BusStopProfile, Direction};
use crate::time::{resolve_provider_timestamp, try_resolve_provider_timestamp};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

const MPH_TO_METERS_PER_SECOND: f32 = 0.44704;

/// Direction convention on this feed: a free-text description such as
/// "INBOUND", "OUTBOUND to Loop". Matched on whole IN/OUT/INBOUND/OUTBOUND
/// tokens, case-insensitive; compass descriptions ("Southbound") carry no
/// inbound/outbound reading and map to `None`.
pub fn direction_from_description(description: &str) -> Option<Direction> {
    let upper = description.to_ascii_uppercase();
    for token in upper.split_whitespace() {
        if token == "OUT" || token.starts_with("OUTBOUND") {
            return Some(Direction::Outbound);
        }
        if token == "IN" || token.starts_with("INBOUND") {
            return Some(Direction::Inbound);
        }
    }
    None
}

/// Maps raw stop records to profiles, sorted by code. Records without a code
/// are dropped; this source never knows the GTFS stop_id.
pub fn profiles_from_stops(raw: &[RawStop]) -> Vec<BusStopProfile> {
    let mut out: Vec<BusStopProfile> = raw
        .iter()
        .filter(|s| !s.stop_code.is_empty())
        .map(|s| BusStopProfile {
            stop_id: None,
            code: s.stop_code.clone(),
            name: s.name.clone(),
            latitude: s.lat.filter(|v| v.is_finite()),
            longitude: s.lon.filter(|v| v.is_finite()),
        })
        .collect();
    out.sort_by(|a, b| a.code.cmp(&b.code));
    out
}

/// Maps raw predictions to per-stop lists keyed by public stop code, each
/// sorted ascending by arrival. Records missing their identifiers or their
/// predicted time are dropped.
///
/// The provider's countdown field wins when it is numeric ("5") or "DUE";
/// otherwise minutes are derived from the arrival instant. Either way the
/// result is floored at zero.
pub fn predictions_by_stop(
    raw: &[RawPrediction],
    zone: Tz,
    now: DateTime<Utc>,
) -> BTreeMap<String, Vec<BusStopPrediction>> {
    let mut by_stop: BTreeMap<String, Vec<BusStopPrediction>> = BTreeMap::new();

    for prediction in raw {
        if prediction.stop_code.is_empty() || prediction.vehicle_id.is_empty() {
            continue;
        }
        let Some(arrival) = prediction
            .predicted_time
            .as_deref()
            .and_then(|t| try_resolve_provider_timestamp(t, zone))
        else {
            continue;
        };

        let minutes_away = countdown_minutes(prediction.countdown.as_deref())
            .unwrap_or_else(|| (arrival - now).num_minutes())
            .max(0) as u32;

        by_stop
            .entry(prediction.stop_code.clone())
            .or_default()
            .push(BusStopPrediction {
                vehicle_id: prediction.vehicle_id.clone(),
                trip_id: prediction.trip_id.clone(),
                arrival,
                departure: arrival, // this source reports a single predicted time
                minutes_away,
                direction: prediction
                    .direction
                    .as_deref()
                    .and_then(direction_from_description),
                distance_feet: prediction.distance_feet,
            });
    }

    for predictions in by_stop.values_mut() {
        predictions.sort_by_key(|p| p.arrival);
    }
    by_stop
}

fn countdown_minutes(countdown: Option<&str>) -> Option<i64> {
    let countdown = countdown?.trim();
    if countdown.eq_ignore_ascii_case("DUE") {
        return Some(0);
    }
    countdown.parse().ok()
}

/// Maps raw vehicle records to positions, sorted by vehicle id. String
/// coordinates that fail to parse to finite floats drop the record; speed is
/// normalized from miles per hour to meters/second.
pub fn positions_from_vehicles(raw: &[RawVehicle], zone: Tz) -> Vec<BusPosition> {
    let mut out = Vec::new();
    for vehicle in raw {
        if vehicle.vehicle_id.is_empty() {
            continue;
        }
        let Some(route_id) = vehicle.route_id.clone().filter(|r| !r.is_empty()) else {
            continue;
        };
        let Some(latitude) = parse_finite(vehicle.lat.as_deref()) else {
            continue;
        };
        let Some(longitude) = parse_finite(vehicle.lon.as_deref()) else {
            continue;
        };

        let timestamp = vehicle
            .timestamp
            .as_deref()
            .map(|t| resolve_provider_timestamp(t, zone))
            .unwrap_or_else(Utc::now);

        out.push(BusPosition {
            vehicle_id: vehicle.vehicle_id.clone(),
            route_id,
            latitude,
            longitude,
            heading: vehicle.heading.as_deref().and_then(|h| h.parse().ok()),
            speed_ms: vehicle.speed_mph.map(|mph| mph * MPH_TO_METERS_PER_SECOND),
            timestamp,
            trip_id: vehicle.trip_id.clone(),
            stop_sequence: None,
        });
    }
    out.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
    out
}

fn parse_finite(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
