// Service entry point.
// Wires configuration, store, builder, coordinator, scheduler, and the HTTP server.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dashboard_cache::cache::CacheStore;
use dashboard_cache::config::Config;
use dashboard_cache::github::GitHubClient;
use dashboard_cache::logging;
use dashboard_cache::refresh::{
    FallbackLoader, GitHubSnapshotBuilder, RefreshCoordinator, RefreshScheduler,
};
use dashboard_cache::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    logging::init(config.log_format)?;
    config.validate()?;

    let store = CacheStore::open(config.store_url(), config.upstream_timeout())?;
    let client = GitHubClient::new(
        &config.github_api_url,
        config.github_token(),
        config.upstream_timeout(),
    )?;
    let builder = GitHubSnapshotBuilder::new(client, config.max_repos, config.activity_repos);
    let fallback = FallbackLoader::new(config.fallback_path());

    tracing::info!(
        identity = config.identity(),
        ttl_minutes = config.ttl_minutes,
        backend = store.backend_name(),
        fallback = %fallback.path().display(),
        authenticated = config.github_token().is_some(),
        "starting dashboard cache"
    );
    if config.refresh_secret().is_none() {
        tracing::warn!("no refresh secret configured, manual refresh is open to anyone");
    }

    let coordinator = RefreshCoordinator::new(
        config.identity(),
        config.ttl_minutes,
        store,
        Arc::new(builder),
        fallback,
    );
    let scheduler = RefreshScheduler::spawn(coordinator.clone(), config.refresh_interval());

    let state = AppState::new(coordinator, config.refresh_secret().map(str::to_string));
    let listener = TcpListener::bind(config.listen).await?;
    server::serve(listener, state, shutdown_signal()).await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
