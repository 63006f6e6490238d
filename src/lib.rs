//! Real-time bus data aggregation core.
//!
//! Ingests two upstream feeds describing the same physical buses (a binary
//! GTFS-Realtime feed and a batch-limited JSON REST API) and exposes one
//! cached, continuously-updating domain model: positions, stop profiles,
//! arrival predictions, and service alerts.

pub mod batch;
pub mod bustime;
pub mod cache;
pub mod context;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod realtime;
pub mod service;
pub mod stream;
pub mod time;

pub use context::{AppContext, ContextConfig, TtlConfig};
pub use error::FeedError;
pub use model::{BusPosition, BusStopPrediction, BusStopProfile, Direction, ServiceAlert, Severity};
