//! Client for the JSON upstream's REST API.
//!
//! Four operations: stop profiles, arrival predictions, vehicle positions,
//! and system time. Profile and prediction lookups accept at most
//! [`MAX_STOPS_PER_REQUEST`] comma-joined identifiers per call; exceeding that
//! is a caller contract violation and fails before any network traffic.
//!
//! A 404 means "no data for these identifiers" and comes back as an empty
//! body; any other non-success status is a hard error.

pub mod payload;

pub use crate::error::MAX_STOPS_PER_REQUEST;
pub use payload::{RawPrediction, RawStop, RawVehicle};

use crate::error::FeedError;
use crate::fetch::{HttpClient, execute_get};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payload::{Envelope, PredictionsBody, StopsBody, TimeBody, VehiclesBody};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Seam the batching and streaming layers are written against, so tests can
/// substitute a fake upstream.
#[async_trait]
pub trait BusTimeApi: Send + Sync {
    /// Stop profile lookup for up to 10 public stop codes.
    async fn stops(&self, codes: &[String]) -> Result<Vec<RawStop>, FeedError>;

    /// Arrival prediction lookup for up to 10 public stop codes.
    async fn predictions(&self, codes: &[String]) -> Result<Vec<RawPrediction>, FeedError>;

    /// Live vehicle lookup for one route.
    async fn vehicles(&self, route: &str) -> Result<Vec<RawVehicle>, FeedError>;

    /// The provider's own clock, load-bearing for rider-facing countdowns.
    /// A missing or non-numeric field is a hard error, never silently defaulted.
    async fn system_time(&self) -> Result<DateTime<Utc>, FeedError>;
}

pub struct BusTimeClient<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> BusTimeClient<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        BusTimeClient { client, base_url }
    }

    fn ensure_batch(codes: &[String]) -> Result<(), FeedError> {
        if codes.len() > MAX_STOPS_PER_REQUEST {
            return Err(FeedError::batch_too_large(codes.len()));
        }
        Ok(())
    }

    async fn get_body<T>(&self, operation: &str, query: &str) -> Result<T, FeedError>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}/{}?format=json{}", self.base_url, operation, query);
        let resp = execute_get(&self.client, &url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            warn!(operation, "upstream returned 404, treating as empty result");
            return Ok(T::default());
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp.json::<Envelope<T>>().await?.body)
    }
}

#[async_trait]
impl<C: HttpClient> BusTimeApi for BusTimeClient<C> {
    async fn stops(&self, codes: &[String]) -> Result<Vec<RawStop>, FeedError> {
        Self::ensure_batch(codes)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let body: StopsBody = self
            .get_body("getstops", &format!("&stpid={}", codes.join(",")))
            .await?;
        for err in &body.error {
            warn!(stop_code = ?err.stop_code, msg = ?err.msg, "stop lookup reported an error entry");
        }
        Ok(body.stops)
    }

    async fn predictions(&self, codes: &[String]) -> Result<Vec<RawPrediction>, FeedError> {
        Self::ensure_batch(codes)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let body: PredictionsBody = self
            .get_body("getpredictions", &format!("&stpid={}", codes.join(",")))
            .await?;
        for err in &body.error {
            warn!(stop_code = ?err.stop_code, msg = ?err.msg, "prediction lookup reported an error entry");
        }
        Ok(body.predictions)
    }

    async fn vehicles(&self, route: &str) -> Result<Vec<RawVehicle>, FeedError> {
        let body: VehiclesBody = self
            .get_body("getvehicles", &format!("&rt={route}"))
            .await?;
        Ok(body.vehicles)
    }

    async fn system_time(&self) -> Result<DateTime<Utc>, FeedError> {
        let body: TimeBody = self.get_body("gettime", "&unixTime=true").await?;
        let raw = body
            .time_millis
            .ok_or_else(|| FeedError::Malformed("system time response missing tm field".into()))?;
        let millis: i64 = raw
            .parse()
            .map_err(|_| FeedError::Malformed(format!("non-numeric system time: {raw}")))?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| FeedError::Malformed(format!("system time out of range: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    fn client() -> BusTimeClient<BasicClient> {
        // Never reaches the network in these tests; the batch guard fires first.
        BusTimeClient::new(BasicClient::new(), "http://127.0.0.1:9/api/v3/")
    }

    fn codes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:05}", 10000 + i)).collect()
    }

    #[tokio::test]
    async fn test_oversized_batch_fails_before_any_network_call() {
        let err = client().stops(&codes(11)).await.unwrap_err();
        match err {
            FeedError::BatchTooLarge { requested, limit } => {
                assert_eq!(requested, 11);
                assert_eq!(limit, MAX_STOPS_PER_REQUEST);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = client().predictions(&codes(25)).await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_identifier_list_short_circuits() {
        // An unreachable base URL proves no request was issued.
        assert!(client().stops(&[]).await.unwrap().is_empty());
        assert!(client().predictions(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let c = client();
        assert!(!c.base_url.ends_with('/'));
    }

    /// Returns a fixed status and body regardless of the request.
    struct CannedClient {
        status: StatusCode,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body.to_string())
                .expect("static response must build");
            Ok(reqwest::Response::from(resp))
        }
    }

    fn canned(status: StatusCode, body: &'static str) -> BusTimeClient<CannedClient> {
        BusTimeClient::new(CannedClient { status, body }, "http://canned.test/api/v3")
    }

    #[tokio::test]
    async fn test_404_reads_as_empty_result() {
        let client = canned(StatusCode::NOT_FOUND, "");
        assert!(client.stops(&codes(2)).await.unwrap().is_empty());
        assert!(client.predictions(&codes(2)).await.unwrap().is_empty());
        assert!(client.vehicles("22").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_hard_error() {
        let client = canned(StatusCode::INTERNAL_SERVER_ERROR, "");
        match client.vehicles("22").await.unwrap_err() {
            FeedError::Status { status } => assert_eq!(status, 500),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_body_parses_through_envelope() {
        let client = canned(
            StatusCode::OK,
            r#"{"bustime-response": {"stops": [{"stpid": "17076", "stpnm": "Clark & Addison"}]}}"#,
        );
        let stops = client.stops(&codes(1)).await.unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].stop_code, "17076");
    }

    #[tokio::test]
    async fn test_system_time_missing_tm_is_a_hard_error() {
        let client = canned(StatusCode::OK, r#"{"bustime-response": {}}"#);
        assert!(matches!(
            client.system_time().await.unwrap_err(),
            FeedError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_system_time_non_numeric_tm_is_a_hard_error() {
        let client = canned(StatusCode::OK, r#"{"bustime-response": {"tm": "soon"}}"#);
        assert!(matches!(
            client.system_time().await.unwrap_err(),
            FeedError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_system_time_parses_epoch_millis() {
        let client = canned(StatusCode::OK, r#"{"bustime-response": {"tm": "1756541700000"}}"#);
        let t = client.system_time().await.unwrap();
        assert_eq!(t.timestamp(), 1756541700);
    }
}
