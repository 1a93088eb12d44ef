//! Server startup: collaborator wiring, HTTP serving and graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use herald_core::config::{DeliveryConfig, PostgresConfig};
use herald_core::Config;
use herald_dispatch::{
    ClientTimeouts, DeliveryClient, DeliveryUnit, HttpDeliveryClient, Scheduler, SchedulerSettings,
};
use herald_storage::{CacheSink, MessageStore, PgMessageStore, RedisCache};

use crate::router;
use crate::state::AppState;

/// Wire the scheduler and shared state from already-connected collaborators.
pub fn build_app_state(
    store: Arc<dyn MessageStore>,
    cache: Arc<dyn CacheSink>,
    client: Arc<dyn DeliveryClient>,
    delivery: &DeliveryConfig,
) -> Arc<AppState> {
    let unit = DeliveryUnit::new(store.clone(), cache.clone(), client, delivery);
    let scheduler = Scheduler::new(store.clone(), unit, SchedulerSettings::from(delivery));
    Arc::new(AppState {
        store,
        cache,
        scheduler,
    })
}

/// `herald migrate`: apply migrations and exit.
pub async fn migrate(config: &PostgresConfig) -> anyhow::Result<()> {
    let store = PgMessageStore::connect(config)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.migrate().await?;
    store.close().await;
    Ok(())
}

/// `herald serve`: connect collaborators, start the scheduler and serve the
/// control API until SIGINT/SIGTERM.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    config.log_summary();

    let store = PgMessageStore::connect(&config.postgres)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.migrate().await?;

    let cache = RedisCache::connect(&config.redis.url())
        .await
        .context("failed to connect to Redis")?;

    let client = HttpDeliveryClient::new(
        &config.delivery.webhook_url,
        ClientTimeouts::for_interval(config.delivery.send_interval),
    )?;
    info!(url = client.url(), "delivery client ready");

    let pg = Arc::new(store);
    let state = build_app_state(pg.clone(), Arc::new(cache), Arc::new(client), &config.delivery);
    state.scheduler.start();

    let app = router::build_router(state.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{addr}");

    let scheduler = state.scheduler.clone();
    let drain = config.server.shutdown_timeout;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping scheduler");
            if !scheduler.shutdown(drain).await {
                warn!("in-flight deliveries abandoned at shutdown");
            }
        })
        .await?;

    pg.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
