//! SST dashboard API service.
//!
//! For a selected date this service fetches the observed sea-surface
//! temperature field over the Korea / East China Sea window, computes the
//! 1991-2020 climatological baseline for the same calendar day, derives
//! the anomaly, and serves both as JSON summaries and rendered PNG maps.

mod config;
mod handlers;
mod pipeline;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Extension, routing::get, Router};
use clap::Parser;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ServiceConfig;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "dashboard-api")]
#[command(about = "Daily SST, climatology baseline and anomaly map service")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Configuration file (YAML); defaults apply when omitted
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    info!("Starting SST dashboard API");

    let config = ServiceConfig::load(args.config.as_deref())?;
    let state = Arc::new(AppState::new(config)?);

    let app = Router::new()
        // Data summaries
        .route("/api/sst/:date", get(handlers::sst_summary_handler))
        .route("/api/anomaly/:date", get(handlers::anomaly_summary_handler))
        // Rendered maps
        .route("/maps/sst/:date", get(handlers::sst_map_handler))
        .route("/maps/anomaly/:date", get(handlers::anomaly_map_handler))
        // Operational endpoints
        .route("/api/cache/stats", get(handlers::cache_stats_handler))
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
