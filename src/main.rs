//! Progressive Gallery - image import and two-tier retrieval server.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use progressive_gallery::{
    config::Config,
    ingest::ImportService,
    retrieval::RetrievalService,
    server::{create_router, RouterConfig},
    store::{FsStore, ImageStore, MemoryStore},
    transcode::{TranscodePool, Transcoder},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Progressive Gallery v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Transcode: {}px preview at q{}, full resolution at q{}, {} workers, queue depth {}",
        config.thumbnail_size,
        config.thumbnail_quality,
        config.full_quality,
        config.workers,
        config.queue_depth
    );
    info!(
        "  Limits: {}MB uploads, {} MP images",
        config.max_upload_bytes / (1024 * 1024),
        config.max_megapixels()
    );
    info!("  Cache: {}MB tiers", config.cache_bytes / (1024 * 1024));

    match &config.data_dir {
        Some(dir) => {
            info!("  Storage: {}", dir.display());
            match FsStore::open(dir).await {
                Ok(store) => serve(Arc::new(store), &config).await,
                Err(e) => {
                    error!("Failed to open data directory {}: {}", dir.display(), e);
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            warn!("  Storage: in-memory, images are lost on restart");
            warn!("          Persist them with --data-dir=<path>");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: ImageStore + 'static>(store: Arc<S>, config: &Config) -> ExitCode {
    match store.len().await {
        Ok(count) => info!("  Found {} stored image(s)", count),
        Err(e) => {
            error!("Failed to read image store: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let pool = TranscodePool::new(
        Transcoder::new(config.transcode_options()),
        config.workers,
        config.queue_depth,
    );
    let retrieval = RetrievalService::with_cache_capacity(Arc::clone(&store), config.cache_bytes);
    let import = ImportService::new(pool, store);

    let router = create_router(retrieval, import, build_router_config(config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl -F images=@photo.jpg http://{}/api/import", addr);
    info!("    curl http://{}/api/import", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining requests");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "progressive_gallery=debug,tower_http=debug"
    } else {
        "progressive_gallery=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
