//! Explicit dependency wiring.
//!
//! Each client and the cache are constructed once at process start and passed
//! by reference through [`AppContext`]; there are no module-level singletons,
//! and tests swap in substitute instances through the trait seams.

use crate::batch::BatchCoordinator;
use crate::bustime::{BusTimeApi, BusTimeClient};
use crate::cache::{DEFAULT_SWEEP_THRESHOLD, HybridCache};
use crate::fetch::{BasicClient, UrlParam};
use crate::realtime::{RealtimeFeed, RealtimeFeedClient};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;

/// Default TTLs per cache category, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    pub positions_secs: u64,
    pub predictions_secs: u64,
    pub alerts_secs: u64,
    pub profiles_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        TtlConfig {
            positions_secs: 10,
            predictions_secs: 15,
            alerts_secs: 300,
            profiles_secs: 86400,
        }
    }
}

pub struct ContextConfig {
    pub bustime_base_url: String,
    pub bustime_api_key: String,
    pub realtime_feed_url: String,
    pub realtime_api_key: String,
    pub redis_url: Option<String>,
    /// The transit operator's home timezone; provider-local timestamps are
    /// wall-clock times in this zone.
    pub home_zone: Tz,
    pub ttl: TtlConfig,
    pub poll_interval: Duration,
    pub fallback_sweep_threshold: usize,
}

pub struct AppContext {
    pub cache: Arc<HybridCache>,
    pub bustime: Arc<dyn BusTimeApi>,
    pub realtime: Arc<dyn RealtimeFeed>,
    pub home_zone: Tz,
    pub ttl: TtlConfig,
    pub poll_interval: Duration,
}

impl AppContext {
    /// Production wiring: real HTTP clients authenticated with URL tokens and
    /// a hybrid cache backed by the configured distributed store.
    pub async fn from_config(config: ContextConfig) -> Self {
        let cache = Arc::new(
            HybridCache::connect(config.redis_url.as_deref(), config.fallback_sweep_threshold)
                .await,
        );
        let bustime = Arc::new(BusTimeClient::new(
            UrlParam::new(BasicClient::new(), "key", config.bustime_api_key),
            config.bustime_base_url,
        ));
        let realtime = Arc::new(RealtimeFeedClient::new(
            UrlParam::new(BasicClient::new(), "key", config.realtime_api_key),
            config.realtime_feed_url,
        ));

        AppContext {
            cache,
            bustime,
            realtime,
            home_zone: config.home_zone,
            ttl: config.ttl,
            poll_interval: config.poll_interval,
        }
    }

    /// Wiring from pre-built parts; how tests inject fakes.
    pub fn with_parts(
        cache: Arc<HybridCache>,
        bustime: Arc<dyn BusTimeApi>,
        realtime: Arc<dyn RealtimeFeed>,
        home_zone: Tz,
        poll_interval: Duration,
    ) -> Self {
        AppContext {
            cache,
            bustime,
            realtime,
            home_zone,
            ttl: TtlConfig::default(),
            poll_interval,
        }
    }

    /// A batching coordinator over this context's cache and JSON client.
    pub fn coordinator(&self) -> BatchCoordinator {
        BatchCoordinator::new(
            self.cache.clone(),
            self.bustime.clone(),
            self.home_zone,
            self.ttl.profiles_secs,
            self.ttl.predictions_secs,
        )
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            bustime_base_url: String::new(),
            bustime_api_key: String::new(),
            realtime_feed_url: String::new(),
            realtime_api_key: String::new(),
            redis_url: None,
            home_zone: chrono_tz::America::Chicago,
            ttl: TtlConfig::default(),
            poll_interval: Duration::from_secs(15),
            fallback_sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}
