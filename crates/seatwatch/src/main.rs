use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use seatwatch::broadcast::Broadcaster;
use seatwatch::config::AppConfig;
use seatwatch::feed::HttpFeedSource;
use seatwatch::jobs::{join_timer, spawn_reminder_timer, spawn_sync_timer};
use seatwatch::notify::mail::{MailConfig, Mailer, SmtpMailer, UnconfiguredMailer};
use seatwatch::notify::Notifier;
use seatwatch::server::create_router;
use seatwatch::stats::StatsAggregator;
use seatwatch::store::SeatStore;
use seatwatch::sync::Synchronizer;
use seatwatch::tracking::TrackingService;
use seatwatch::types::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = AppConfig::resolve_path(std::env::args().nth(1));
    let config = AppConfig::load(&config_path)?;

    let store = Arc::new(
        SeatStore::open(&config.database_path)
            .with_context(|| format!("Failed to open database {}", config.database_path))?,
    );
    info!("Database ready at {}", config.database_path);

    let mailer: Arc<dyn Mailer> = match MailConfig::from_env() {
        Some(mail_config) => Arc::new(SmtpMailer::new(&mail_config)?),
        None => {
            info!("SMTP_HOST not set, email delivery disabled");
            Arc::new(UnconfiguredMailer)
        }
    };

    let notifier = Notifier::new(Arc::clone(&store), mailer, config.reactive_cooldown());
    let broadcaster = Broadcaster::new(config.broadcast_capacity);
    let stats = StatsAggregator::new(Arc::clone(&store));
    let feed = Arc::new(HttpFeedSource::new(config.feed_url.clone(), config.feed_timeout())?);

    let sync = Arc::new(
        Synchronizer::new(
            feed,
            Arc::clone(&store),
            notifier.clone(),
            broadcaster.clone(),
            stats.clone(),
        )?
        .with_chunk_size(config.write_chunk_size),
    );

    let cancel = CancellationToken::new();
    let sync_handle = spawn_sync_timer(Arc::clone(&sync), config.sync_interval(), cancel.clone());
    let reminder_handle =
        spawn_reminder_timer(notifier.clone(), config.reminder_interval(), cancel.clone());

    let addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        store: Arc::clone(&store),
        sync,
        tracking: TrackingService::new(store, notifier.clone()),
        stats,
        broadcaster,
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for background work");
    cancel.cancel();
    join_timer("sync", sync_handle).await;
    join_timer("reminder", reminder_handle).await;
    notifier.wait_idle().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
    }
}
