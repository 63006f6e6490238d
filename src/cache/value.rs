//! Closed tagged union of every value shape the cache round-trips.
//!
//! One tag per supported shape keeps the serializer/deserializer pair
//! exhaustive and statically checkable; there is no runtime type inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A cacheable value. `Absent` is "we looked, there was nothing" and is
/// distinct from a cache miss: an empty upstream result can be cached so that
/// repeat lookups do not re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Absent,
    Str(String),
    Num(f64),
    Bool(bool),
    Instant(DateTime<Utc>),
    /// Ordered key/value pairs; insertion order survives the round trip.
    Entries(Vec<(String, serde_json::Value)>),
    /// Deduplicated string collection.
    Set(BTreeSet<String>),
    Bytes(Vec<u8>),
    /// Arbitrary structured (record/array) data.
    Json(serde_json::Value),
}

impl CacheValue {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Wraps any serializable value as [`CacheValue::Json`].
    pub fn from_serialize<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(CacheValue::Json(serde_json::to_value(value)?))
    }

    /// Unwraps a [`CacheValue::Json`] back into a typed value. Any other
    /// variant (including `Absent`) yields `None`.
    pub fn into_deserialize<T: serde::de::DeserializeOwned>(self) -> Option<T> {
        match self {
            CacheValue::Json(v) => serde_json::from_value(v).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn roundtrip(v: CacheValue) {
        let encoded = v.encode().unwrap();
        assert_eq!(CacheValue::decode(&encoded).unwrap(), v);
    }

    #[test]
    fn test_every_shape_roundtrips() {
        roundtrip(CacheValue::Absent);
        roundtrip(CacheValue::Str("17076".into()));
        roundtrip(CacheValue::Num(41.8781));
        roundtrip(CacheValue::Bool(true));
        roundtrip(CacheValue::Instant(
            Utc.with_ymd_and_hms(2025, 3, 15, 6, 30, 0).unwrap(),
        ));
        roundtrip(CacheValue::Entries(vec![
            ("22".into(), serde_json::json!({"name": "Clark"})),
            ("8".into(), serde_json::json!({"name": "Halsted"})),
        ]));
        roundtrip(CacheValue::Set(BTreeSet::from([
            "17076".to_string(),
            "1426".to_string(),
        ])));
        roundtrip(CacheValue::Bytes(vec![0x0a, 0x00, 0xff]));
        roundtrip(CacheValue::Json(serde_json::json!({"prd": [1, 2, 3]})));
    }

    #[test]
    fn test_absent_is_not_a_missing_entry() {
        let encoded = CacheValue::Absent.encode().unwrap();
        let decoded = CacheValue::decode(&encoded).unwrap();
        assert_eq!(decoded, CacheValue::Absent);
        assert_ne!(encoded, "null");
    }

    #[test]
    fn test_entries_preserve_order() {
        let entries = CacheValue::Entries(vec![
            ("z".into(), serde_json::json!(1)),
            ("a".into(), serde_json::json!(2)),
        ]);
        let decoded = CacheValue::decode(&entries.encode().unwrap()).unwrap();
        match decoded {
            CacheValue::Entries(pairs) => {
                assert_eq!(pairs[0].0, "z");
                assert_eq!(pairs[1].0, "a");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_typed_wrapper_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Chunk {
            codes: Vec<String>,
        }
        let chunk = Chunk {
            codes: vec!["1426".into(), "17076".into()],
        };
        let value = CacheValue::from_serialize(&chunk).unwrap();
        assert_eq!(value.into_deserialize::<Chunk>().unwrap(), chunk);
    }
}
