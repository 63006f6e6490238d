//! Resolution of provider-local timestamp strings into absolute instants.
//!
//! The JSON upstream reports times as `YYYYMMDD HH:MM` with no timezone
//! marker; they are wall-clock times in the transit operator's home zone, not
//! in whatever zone the process happens to run in.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Fixed local pattern used by the JSON upstream.
pub const PROVIDER_TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M";

/// Interprets `raw` as wall-clock time in `zone` and returns the absolute
/// instant, or `None` when the string does not parse or a field is out of
/// range.
///
/// DST handling: an ambiguous wall-clock time (fall-back hour) resolves to the
/// earlier of the two candidate instants; a nonexistent one (spring-forward
/// gap) is re-resolved against the corrected wall clock one hour later.
pub fn try_resolve_provider_timestamp(raw: &str, zone: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), PROVIDER_TIMESTAMP_FORMAT).ok()?;
    resolve_local(naive, zone)
}

/// Fail-soft variant: malformed input degrades to the current instant with a
/// warning, never an error. Suitable for cosmetic fields only; load-bearing
/// times (system time) must go through the strict path.
pub fn resolve_provider_timestamp(raw: &str, zone: Tz) -> DateTime<Utc> {
    match try_resolve_provider_timestamp(raw, zone) {
        Some(instant) => instant,
        None => {
            warn!(raw, %zone, "malformed provider timestamp, substituting current time");
            Utc::now()
        }
    }
}

fn resolve_local(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Inside a spring-forward gap; the corrected instant is one hour on.
            let shifted = naive + Duration::hours(1);
            zone.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::America::Chicago;

    #[test]
    fn test_plain_timestamp_resolves_in_home_zone() {
        // CST is UTC-6 in January.
        let instant = try_resolve_provider_timestamp("20250115 08:30", Chicago).unwrap();
        assert_eq!(instant.hour(), 14);
        assert_eq!(instant.minute(), 30);
    }

    #[test]
    fn test_spring_forward_week_resolves_unambiguously() {
        // US spring-forward in 2025 was March 9; the following Saturday is CDT.
        let instant = try_resolve_provider_timestamp("20250315 01:30", Chicago).unwrap();
        assert_eq!(instant, instant.with_timezone(&Chicago).with_timezone(&Utc));
        assert_eq!(instant.hour(), 6); // 01:30 CDT == 06:30 UTC
    }

    #[test]
    fn test_fall_back_ambiguity_takes_earlier_instant() {
        // 01:30 on 2025-11-02 occurs twice in Chicago; the CDT reading wins.
        let instant = try_resolve_provider_timestamp("20251102 01:30", Chicago).unwrap();
        assert_eq!(instant.hour(), 6); // 01:30 CDT == 06:30 UTC
    }

    #[test]
    fn test_spring_forward_gap_shifts_forward() {
        // 02:30 on 2025-03-09 does not exist in Chicago.
        let instant = try_resolve_provider_timestamp("20250309 02:30", Chicago).unwrap();
        let local = instant.with_timezone(&Chicago);
        assert_eq!(local.hour(), 3);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn test_garbage_input_is_none_strict_and_now_soft() {
        assert!(try_resolve_provider_timestamp("notadate", Chicago).is_none());

        let before = Utc::now();
        let fallback = resolve_provider_timestamp("notadate", Chicago);
        let after = Utc::now();
        assert!(fallback >= before && fallback <= after);
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        assert!(try_resolve_provider_timestamp("20251301 10:00", Chicago).is_none()); // month 13
        assert!(try_resolve_provider_timestamp("20250232 10:00", Chicago).is_none()); // day 32
        assert!(try_resolve_provider_timestamp("20250601 24:00", Chicago).is_none()); // hour 24
        assert!(try_resolve_provider_timestamp("20250601 10:61", Chicago).is_none()); // minute 61
    }
}
