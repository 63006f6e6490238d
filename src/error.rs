//! Error taxonomy for the ingestion core.
//!
//! The split that matters downstream is [`FeedError::is_terminal`]: failures
//! about *this request's parameters* end a polling stream, failures about
//! *upstream availability* do not.

use thiserror::Error;

/// Maximum identifiers the JSON upstream accepts in a single request.
pub const MAX_STOPS_PER_REQUEST: usize = 10;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level failure (DNS, connect, body read, JSON body decode).
    #[error("http transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success, non-404 status.
    #[error("upstream responded with status {status}")]
    Status { status: u16 },

    /// The binary feed body was not a valid protobuf FeedMessage.
    #[error("binary feed decode failure: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A load-bearing field was missing or unparseable.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    /// Caller passed more identifiers than the upstream permits per request.
    /// Raised before any network call is made.
    #[error("requested {requested} identifiers, provider limit is {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    /// None of the caller-supplied identifiers resolve upstream.
    #[error("unknown identifier(s): {0}")]
    UnknownIdentifier(String),

    /// A cache payload failed to encode or decode.
    #[error("cache payload codec failure: {0}")]
    CacheCodec(#[from] serde_json::Error),
}

impl FeedError {
    /// Configuration-class errors indicate a programming or caller mistake and
    /// terminate long-lived subscriptions; everything else is transient.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FeedError::BatchTooLarge { .. } | FeedError::UnknownIdentifier(_)
        )
    }

    pub(crate) fn batch_too_large(requested: usize) -> Self {
        FeedError::BatchTooLarge {
            requested,
            limit: MAX_STOPS_PER_REQUEST,
        }
    }
}
