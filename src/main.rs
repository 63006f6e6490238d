//! Diagnostic CLI around the aggregation core.
//!
//! Provides subcommands for one-shot snapshots (positions, predictions,
//! alerts) and a live watch that follows a set of stops until interrupted.

use anyhow::{Context, Result};
use buswatch::service;
use buswatch::{AppContext, ContextConfig, TtlConfig};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "buswatch")]
#[command(about = "Aggregated real-time bus data from two upstream feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print current vehicle positions, fleet-wide or for one route
    Positions {
        /// Route identifier; omit for the whole fleet
        #[arg(short, long)]
        route: Option<String>,
    },
    /// Print current arrival predictions for the given stop codes
    Predictions {
        /// Public 5-digit stop codes
        #[arg(value_name = "STOP_CODE", required = true)]
        stops: Vec<String>,
    },
    /// Print current service alerts
    Alerts,
    /// Follow arrival predictions for the given stop codes until interrupted
    Watch {
        /// Public 5-digit stop codes
        #[arg(value_name = "STOP_CODE", required = true)]
        stops: Vec<String>,

        /// Polling interval in seconds
        #[arg(short, long, default_value_t = 15)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/buswatch.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("buswatch.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Positions { route } => {
            let ctx = AppContext::from_config(config_from_env(None)?).await;
            let positions = service::position_snapshot(&ctx, route.as_deref()).await?;
            info!(count = positions.len(), "position snapshot");
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
        Commands::Predictions { stops } => {
            let ctx = AppContext::from_config(config_from_env(None)?).await;
            let predictions = service::stop_predictions(&ctx, &stops).await;
            // Countdowns are relative to the provider's clock, not ours.
            match service::provider_now(&ctx).await {
                Ok(as_of) => info!(%as_of, stops = stops.len(), resolved = predictions.len(), "prediction snapshot"),
                Err(e) => {
                    warn!(error = %e, "provider clock unavailable");
                    info!(stops = stops.len(), resolved = predictions.len(), "prediction snapshot");
                }
            }
            println!("{}", serde_json::to_string_pretty(&predictions)?);
        }
        Commands::Alerts => {
            let ctx = AppContext::from_config(config_from_env(None)?).await;
            let alerts = service::alert_snapshot(&ctx).await?;
            info!(count = alerts.len(), "alert snapshot");
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
        Commands::Watch { stops, interval } => {
            let ctx = Arc::new(
                AppContext::from_config(config_from_env(Some(Duration::from_secs(interval)))?)
                    .await,
            );
            info!(stops = ?stops, interval, "watching stops");

            let mut stream = service::watch_stop_predictions(ctx, stops);
            while let Some(snapshot) = stream.recv().await {
                match snapshot {
                    Ok(predictions) => {
                        println!("{}", serde_json::to_string_pretty(&predictions)?);
                    }
                    Err(e) => {
                        error!(error = %e, terminal = e.is_terminal(), "watch error");
                    }
                }
            }
            info!("watch stream ended");
        }
    }

    Ok(())
}

/// Builds the context configuration from the environment. The two upstream
/// endpoints and their tokens are required; the cache and timezone settings
/// have workable defaults.
fn config_from_env(poll_interval: Option<Duration>) -> Result<ContextConfig> {
    let home_zone = match std::env::var("HOME_TIMEZONE") {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid HOME_TIMEZONE {raw}: {e}"))?,
        Err(_) => chrono_tz::America::Chicago,
    };

    let defaults = ContextConfig::default();
    Ok(ContextConfig {
        bustime_base_url: std::env::var("BUSTIME_BASE_URL")
            .context("BUSTIME_BASE_URL must be set")?,
        bustime_api_key: std::env::var("BUSTIME_API_KEY")
            .context("BUSTIME_API_KEY must be set")?,
        realtime_feed_url: std::env::var("GTFS_RT_URL").context("GTFS_RT_URL must be set")?,
        realtime_api_key: std::env::var("GTFS_RT_API_KEY")
            .context("GTFS_RT_API_KEY must be set")?,
        redis_url: std::env::var("REDIS_URL").ok(),
        home_zone,
        ttl: TtlConfig::default(),
        poll_interval: poll_interval.unwrap_or(defaults.poll_interval),
        fallback_sweep_threshold: defaults.fallback_sweep_threshold,
    })
}
