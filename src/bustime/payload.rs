//! Raw wire shapes for the JSON upstream, validated at the deserialization
//! boundary instead of poked at defensively downstream.
//!
//! Every operation's payload arrives inside a `bustime-response` wrapper
//! object; an absent payload array means "no data", so all arrays default to
//! empty.

use serde::Deserialize;

/// Top-level response wrapper common to all four operations.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "bustime-response")]
    pub body: T,
}

/// Per-identifier error entries the upstream mixes into otherwise-successful
/// responses ("No service scheduled", "No data found for parameter").
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedError {
    #[serde(default, rename = "stpid")]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopsBody {
    #[serde(default)]
    pub stops: Vec<RawStop>,
    #[serde(default)]
    pub error: Vec<RawFeedError>,
}

/// A stop record. The upstream labels the field `stpid`, but it carries the
/// public 5-digit stop_code, not the GTFS stop_id. Keyed accordingly.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStop {
    #[serde(rename = "stpid")]
    pub stop_code: String,
    #[serde(default, rename = "stpnm")]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionsBody {
    #[serde(default, rename = "prd")]
    pub predictions: Vec<RawPrediction>,
    #[serde(default)]
    pub error: Vec<RawFeedError>,
}

/// A single arrival prediction. Times are local wall-clock strings in the
/// operator's home zone (`YYYYMMDD HH:MM`), resolved by the normalizer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    #[serde(rename = "stpid")]
    pub stop_code: String,
    #[serde(rename = "vid")]
    pub vehicle_id: String,
    #[serde(default, rename = "rt")]
    pub route_id: Option<String>,
    #[serde(default, rename = "tatripid")]
    pub trip_id: Option<String>,
    #[serde(default, rename = "prdtm")]
    pub predicted_time: Option<String>,
    /// Countdown as the provider displays it: minutes as digits, or "DUE"/"DLY".
    #[serde(default, rename = "prdctdn")]
    pub countdown: Option<String>,
    /// Free-text direction description, e.g. "Northbound" or "INBOUND".
    #[serde(default, rename = "rtdir")]
    pub direction: Option<String>,
    /// Distance from the vehicle to the stop, in feet.
    #[serde(default, rename = "dstp")]
    pub distance_feet: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VehiclesBody {
    #[serde(default, rename = "vehicle")]
    pub vehicles: Vec<RawVehicle>,
    #[serde(default)]
    pub error: Vec<RawFeedError>,
}

/// A live vehicle record. Coordinates and heading arrive as decimal strings;
/// speed is reported in miles per hour.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVehicle {
    #[serde(rename = "vid")]
    pub vehicle_id: String,
    #[serde(default, rename = "rt")]
    pub route_id: Option<String>,
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default, rename = "hdg")]
    pub heading: Option<String>,
    #[serde(default, rename = "spd")]
    pub speed_mph: Option<f32>,
    #[serde(default, rename = "tmstmp")]
    pub timestamp: Option<String>,
    #[serde(default, rename = "tatripid")]
    pub trip_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeBody {
    /// Epoch milliseconds as a numeric string when `unixTime=true` is sent.
    #[serde(default, rename = "tm")]
    pub time_millis: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_envelope_parses() {
        let raw = r#"{"bustime-response": {"stops": [
            {"stpid": "17076", "stpnm": "Clark & Addison", "lat": 41.947, "lon": -87.656}
        ]}}"#;
        let env: Envelope<StopsBody> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.body.stops.len(), 1);
        assert_eq!(env.body.stops[0].stop_code, "17076");
        assert_eq!(env.body.stops[0].lat, Some(41.947));
    }

    #[test]
    fn test_missing_payload_array_reads_as_empty() {
        let raw = r#"{"bustime-response": {"error": [{"stpid": "99999", "msg": "No data found for parameter"}]}}"#;
        let env: Envelope<PredictionsBody> = serde_json::from_str(raw).unwrap();
        assert!(env.body.predictions.is_empty());
        assert_eq!(env.body.error.len(), 1);
    }

    #[test]
    fn test_vehicle_fields_arrive_as_strings() {
        let raw = r#"{"bustime-response": {"vehicle": [
            {"vid": "4391", "rt": "22", "lat": "41.9100", "lon": "-87.6340",
             "hdg": "359", "spd": 25, "tmstmp": "20250830 09:15", "tatripid": "1007700"}
        ]}}"#;
        let env: Envelope<VehiclesBody> = serde_json::from_str(raw).unwrap();
        let v = &env.body.vehicles[0];
        assert_eq!(v.lat.as_deref(), Some("41.9100"));
        assert_eq!(v.speed_mph, Some(25.0));
    }

    #[test]
    fn test_time_body_keeps_numeric_string() {
        let raw = r#"{"bustime-response": {"tm": "1756541700000"}}"#;
        let env: Envelope<TimeBody> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.body.time_millis.as_deref(), Some("1756541700000"));
    }
}
