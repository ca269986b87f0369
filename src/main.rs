//! record-cache-tier server binary.
//!
//! Loads configuration and the seed record set, constructs the cache
//! coordinator with an injected generator, and serves the HTTP API.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use record_cache_tier::cache::coordinator::CacheCoordinator;
use record_cache_tier::config::{Cli, Config};
use record_cache_tier::generate::SyntheticGenerator;
use record_cache_tier::loader::{BulkLoader, JsonSeedLoader, LoaderError};
use record_cache_tier::server::api::{build_router, AppState};
use record_cache_tier::server::metrics::CacheMetrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "record_cache_tier=debug,tower_http=debug"
    } else {
        "record_cache_tier=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("record-cache-tier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;
    config.validate()?;
    let config = Arc::new(config);

    info!(
        tier1_budget = config.cache.tier1_budget_bytes,
        tier3_budget = config.cache.tier3_budget_bytes,
        promotion_threshold = config.cache.promotion_threshold,
        promotion_cooldown_secs = config.cache.promotion_cooldown_secs,
        generation_timeout_secs = config.cache.generation_timeout_secs,
        "Configuration loaded"
    );

    // The generator is injected here; deployments swap in an implementation
    // backed by their upstream data source.
    let generator = Arc::new(SyntheticGenerator::new());
    let coordinator = Arc::new(CacheCoordinator::new(config.clone(), generator));

    // Populate tier 1 from the seed file. A missing file starts the server
    // empty; a budget that cannot hold a single record aborts startup.
    let loader = JsonSeedLoader::new(&cli.seed);
    match loader.load().await {
        Ok(records) => {
            let report = coordinator.load(records).await?;
            if report.is_partial() {
                warn!(
                    loaded = report.loaded,
                    dropped = report.dropped,
                    "seed set did not fully fit into the tier 1 budget"
                );
            }
        }
        Err(LoaderError::FileNotFound(path)) => {
            warn!(path, "no seed file, starting with an empty tier 1");
        }
        Err(err) => return Err(err.into()),
    }

    // Build application state.
    let state = Arc::new(AppState {
        coordinator,
        config: config.clone(),
        metrics: CacheMetrics::new()?,
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen;
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
