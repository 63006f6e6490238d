//! Canonical domain entities produced by the normalizers.
//!
//! Both upstream sources are mapped into these shapes; once constructed they
//! are immutable. Records that cannot satisfy the required fields are dropped
//! by the normalizers rather than emitted with placeholder values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Travel direction of a trip, derived per source: from the GTFS `direction_id`
/// integer on the binary feed, from a free-text description on the JSON feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Three-level alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Severe,
}

/// A live vehicle position. `speed_ms` is unit-normalized to meters/second
/// regardless of which upstream reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPosition {
    pub vehicle_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f32>,
    pub speed_ms: Option<f32>,
    pub timestamp: DateTime<Utc>,
    pub trip_id: Option<String>,
    pub stop_sequence: Option<u32>,
}

/// A stop as the public knows it.
///
/// Two identifier spaces exist for the same physical stop: the GTFS-internal
/// sequential `stop_id` and the public 5-digit `code` printed on signage.
/// `code` is the caller-supplied lookup key and is always populated; the other
/// fields may be resolved lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusStopProfile {
    pub stop_id: Option<String>,
    pub code: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A predicted arrival at a stop. `minutes_away` is floored at zero on
/// construction; clock skew near arrival never produces a negative countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusStopPrediction {
    pub vehicle_id: String,
    pub trip_id: Option<String>,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    pub minutes_away: u32,
    pub direction: Option<Direction>,
    pub distance_feet: Option<u32>,
}

/// A rider-facing service alert. Text is English-only: multilingual source
/// text is cut at the translation separator. Affected identifier sets are
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAlert {
    pub id: String,
    pub header: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub active_start: Option<DateTime<Utc>>,
    pub active_end: Option<DateTime<Utc>>,
    pub route_ids: BTreeSet<String>,
    pub stop_ids: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Severe);
    }
}
