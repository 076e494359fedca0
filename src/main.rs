// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod config;
mod connectivity;
mod error;
mod lifecycle;
mod logging;
mod notifications;
mod outbox;
mod platform;
mod session;
mod subscription;
mod sync;
mod ui;
mod utils;

#[cfg(test)]
mod test_helpers;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use api::{ApiHandlers, HttpServer};
use config::Config;
use logging::setup_logging;
use notifications::NotificationGate;
use outbox::{Outbox, SqliteOutbox};
use platform::{
    AssetCache, ConfiguredPermissions, EventHub, HttpWorkerHost, ReachabilityProbe,
    SessionReloader,
};
use session::{AppSession, SessionContext};
use sync::{HttpUploader, OutboxFlusher, SyncDispatcher, Uploader};
use utils::FixedWindowRateLimiter;

/// Upper bound on distinct clients tracked by the manual-check limiter
const RATE_LIMIT_MAX_CLIENTS: usize = 1024;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_format)?;

    info!("Starting meal-sync-agent v{}", env!("CARGO_PKG_VERSION"));

    let client = reqwest::Client::builder()
        .user_agent(concat!("meal-sync-agent/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    // Initialize outbox
    let outbox: Arc<dyn Outbox> = Arc::new(SqliteOutbox::new(&config.outbox_db_path).await?);
    info!("Outbox initialized at {}", config.outbox_db_path.display());

    let uploader: Arc<dyn Uploader> = Arc::new(HttpUploader::new(
        client.clone(),
        config.upload_endpoint.clone(),
        config.upload_api_key.clone(),
    ));
    let flusher = Arc::new(
        OutboxFlusher::new(Arc::clone(&outbox), uploader).with_batch_size(config.upload_batch_size),
    );

    // Worker host and its background-sync facility
    let hub = Arc::new(EventHub::new());
    let (dispatcher, dispatcher_task) = if config.background_sync {
        let (dispatcher, task) =
            SyncDispatcher::spawn(Arc::clone(&flusher), Arc::clone(&hub), config.retry_policy());
        (Some(dispatcher), Some(task))
    } else {
        info!("Background sync disabled");
        (None, None)
    };

    tokio::fs::create_dir_all(&config.cache_dir).await?;
    let host = Arc::new(HttpWorkerHost::new(
        client.clone(),
        config.origin_url()?,
        AssetCache::new(client.clone(), config.cache_dir.clone()),
        hub,
        dispatcher,
    ));

    // Reachability
    let probe = ReachabilityProbe::new(client.clone(), config.probe_url()?).await;
    let probe_task = probe.spawn_polling(Duration::from_secs(config.connectivity_poll_secs));

    let notifications = Arc::new(NotificationGate::new(Arc::new(ConfiguredPermissions::new(
        config.notification_permission,
    ))));

    let (reloader, mut reloads) = SessionReloader::new();
    let ctx = SessionContext {
        container: host,
        connectivity: probe,
        reloader: Arc::new(reloader),
        flusher: Arc::clone(&flusher),
        settings: config.lifecycle_settings(),
    };

    // Start HTTP server
    let (session_tx, session_rx) = watch::channel(None);
    let limiter = Arc::new(FixedWindowRateLimiter::new(
        config.manual_check_limit,
        Duration::from_secs(config.manual_check_window_secs),
        RATE_LIMIT_MAX_CLIENTS,
    ));
    let handlers = ApiHandlers::new(
        session_rx,
        Arc::clone(&notifications),
        Arc::clone(&outbox),
        flusher,
        limiter,
    );
    let http_server = HttpServer::new(handlers, config.local_api_bind);
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!(error = %e, "HTTP server error");
        }
    });

    let mut session = AppSession::start(&ctx).await;
    session_tx.send_replace(Some(Arc::clone(&session)));

    info!("All services started. Waiting for shutdown signal...");

    loop {
        tokio::select! {
            request = reloads.recv() => {
                if request.is_none() {
                    warn!("Reload channel closed");
                    break;
                }
                info!(session = %session.id(), "Reloading application session");
                session.teardown();
                session = AppSession::start(&ctx).await;
                session_tx.send_replace(Some(Arc::clone(&session)));
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
                    Err(err) => error!(error = %err, "Unable to listen for shutdown signal"),
                }
                break;
            }
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown...");

    session.teardown();
    session_tx.send_replace(None);
    probe_task.unsubscribe();
    if let Some(task) = dispatcher_task {
        task.unsubscribe();
    }
    http_task.abort();

    match outbox.count_pending().await {
        Ok(0) => {}
        Ok(pending) => info!(pending, "Meal logs left queued for the next run"),
        Err(e) => warn!(error = %e, "Failed to count queued meal logs"),
    }

    info!("Shutdown complete");
    Ok(())
}
