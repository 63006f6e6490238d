//! Client for the binary GTFS-Realtime upstream.
//!
//! One authenticated GET returns a protobuf-encoded `FeedMessage`:
//! a header plus entities, each optionally carrying a vehicle position, a
//! trip update, or an alert. The feed comes back unfiltered; transport and
//! status failures propagate to the caller without internal retries.

use crate::error::FeedError;
use crate::fetch::{HttpClient, fetch_bytes};
use async_trait::async_trait;
use gtfs_realtime::FeedMessage;
use prost::Message;
use tracing::debug;

/// Seam for substituting a synthetic feed in tests.
#[async_trait]
pub trait RealtimeFeed: Send + Sync {
    async fn fetch_feed(&self) -> Result<FeedMessage, FeedError>;
}

pub struct RealtimeFeedClient<C> {
    client: C,
    feed_url: String,
}

impl<C: HttpClient> RealtimeFeedClient<C> {
    pub fn new(client: C, feed_url: impl Into<String>) -> Self {
        RealtimeFeedClient {
            client,
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> RealtimeFeed for RealtimeFeedClient<C> {
    async fn fetch_feed(&self) -> Result<FeedMessage, FeedError> {
        let bytes = fetch_bytes(&self.client, &self.feed_url).await?;
        let feed = decode_feed(&bytes)?;
        debug!(entity_count = feed.entity.len(), "realtime feed decoded");
        Ok(feed)
    }
}

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
pub fn decode_feed(bytes: &[u8]) -> Result<FeedMessage, FeedError> {
    Ok(FeedMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_realtime::FeedHeader;

    #[test]
    fn test_decode_empty_bytes_yields_default_feed() {
        // An empty byte array is valid protobuf for an all-default message.
        let feed = decode_feed(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_decode_invalid_bytes_errors() {
        let result = decode_feed(&[0xff, 0xfe, 0x00, 0x01]);
        assert!(matches!(result, Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_decode_roundtrips_minimal_feed() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1756541700),
                ..Default::default()
            },
            entity: vec![],
        };
        let decoded = decode_feed(&feed.encode_to_vec()).unwrap();
        assert_eq!(decoded.header.gtfs_realtime_version, "2.0");
        assert_eq!(decoded.header.timestamp, Some(1756541700));
    }
}
