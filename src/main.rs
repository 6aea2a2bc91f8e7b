//! Batch scoring service.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   BATCH SCORER                        │
//!   POST /api/score   │  ┌────────┐    ┌──────────────┐    ┌──────────────┐  │
//!   ──────────────────┼─▶│  http  │───▶│ orchestrator │───▶│ result cache │  │
//!                     │  │ server │    │  (chunks)    │    └──────────────┘  │
//!                     │  └────────┘    └──────┬───────┘                      │
//!                     │                       │ miss                         │
//!                     │                       ▼                              │
//!                     │                ┌──────────────┐    ┌──────────────┐  │
//!                     │                │   circuit    │───▶│ http scorer  │──┼──▶ External
//!                     │                │   breaker    │    │  (retries)   │  │    Scorer
//!                     │                └──────────────┘    └──────────────┘  │
//!                     │                       │ successes (detached)         │
//!                     │                       ▼                              │
//!                     │                ┌──────────────┐                      │
//!                     │                │ persistence  │                      │
//!                     │                │    sink      │                      │
//!                     │                └──────────────┘                      │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use batch_scorer::config::loader::{apply_env_overrides, load_config};
use batch_scorer::config::validation::validate_config;
use batch_scorer::config::ServiceConfig;
use batch_scorer::lifecycle::signals::shutdown_on_signal;
use batch_scorer::observability::{logging, metrics};
use batch_scorer::scoring::{BatchOrchestrator, HttpScorer, JsonFileSink, NoopSink, PersistenceSink};
use batch_scorer::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "batch-scorer")]
#[command(about = "Resilient batch scoring service", long_about = None)]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long, env = "BATCH_SCORER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = ServiceConfig::default();
            apply_env_overrides(&mut config);
            validate_config(&config).map_err(|issues| {
                issues.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            })?;
            config
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "batch-scorer starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        failure_threshold = config.breaker.failure_threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        max_batch_size = config.orchestrator.max_batch_size,
        chunk_timeout_ms = config.orchestrator.chunk_timeout_ms,
        cache_ttl_secs = config.cache.ttl_secs,
        scorer_endpoint = %config.scorer.endpoint,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let scorer = Arc::new(HttpScorer::new(&config.scorer)?);
    let sink: Arc<dyn PersistenceSink> = match config.persistence.path.as_deref() {
        Some(path) if config.persistence.enabled => Arc::new(JsonFileSink::open(path)?),
        _ => Arc::new(NoopSink),
    };
    let orchestrator = Arc::new(BatchOrchestrator::from_config(&config, scorer, sink)?);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, orchestrator);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_on_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
