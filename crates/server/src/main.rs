use anyhow::{Context, Result};
use clap::Parser;
use routegate_core::{HttpUpstream, TtlCache};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod api;
mod config;
mod registry;
mod router;

use config::{AppState, Args, ServerConfig};
use registry::SessionRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    tracing::info!("Starting routegate {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load(&args.config)?;
    let upstream_config = config.upstream_config(&args)?;
    if upstream_config.api_key.is_none() {
        tracing::warn!("No upstream API key configured; upstream calls may be rejected");
    }
    tracing::info!(base_url = %upstream_config.base_url, "Upstream configured");

    let upstream = HttpUpstream::new(upstream_config).context("Failed to build upstream client")?;
    let state = AppState::new(Arc::new(upstream), config.cache_policy());

    // No partial service: the chain list must load before we listen
    let chains = state
        .adapter
        .prefetch_chains()
        .await
        .context("Failed to fetch the chain list from the upstream")?;
    tracing::info!(chains, "Chain list loaded");

    let shutdown = CancellationToken::new();

    SessionRegistry::spawn_idle_sweeper(
        &state.registry,
        config.idle_timeout(),
        config.session_sweep_interval(),
        shutdown.clone(),
    );
    if let Some(interval) = config.cache_sweep_interval() {
        tracing::info!(interval_secs = interval.as_secs(), "Background cache purge enabled");
        TtlCache::spawn_sweeper(state.adapter.cache(), interval);
    }

    tokio::spawn({
        let registry = state.registry.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutting down");
            registry.close_all();
            shutdown.cancel();
        }
    });

    // Start API server
    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Starting API server on {}", addr);

    api::serve(&addr, state, shutdown).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "routegate=info,tower_http=debug".into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
