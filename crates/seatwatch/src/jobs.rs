/// The two periodic timers: feed sync and reminder sweep
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notify::Notifier;
use crate::sync::{SyncOutcome, Synchronizer};

/// Runs [`Synchronizer::run_sync`] every `period` until cancelled.
///
/// The first tick fires immediately and acts as the startup sync.
pub fn spawn_sync_timer(
    sync: Arc<Synchronizer>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Sync timer started (every {period:?})");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sync timer cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    match sync.run_sync().await {
                        Ok(SyncOutcome::Completed(summary)) => debug!(
                            "Timer sync done: {} deltas over {} sections",
                            summary.updated_sections, summary.total_sections
                        ),
                        Ok(SyncOutcome::Skipped) => {}
                        // Already logged by the synchronizer.
                        Err(_) => {}
                    }
                }
            }
        }
    })
}

/// Runs the reminder sweep every `period` until cancelled.
pub fn spawn_reminder_timer(
    notifier: Notifier,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The immediate first tick would race the startup sync.
        ticker.tick().await;
        info!("Reminder timer started (every {period:?})");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reminder timer cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    match notifier.run_reminder_sweep() {
                        Ok(report) if report.dispatched > 0 => info!(
                            "Reminder sweep: {} of {} trackings notified",
                            report.dispatched, report.checked
                        ),
                        Ok(_) => {}
                        Err(e) => error!("Reminder sweep failed: {e}"),
                    }
                }
            }
        }
    })
}

/// Waits for a timer task to finish after cancellation.
///
/// Returns false, after logging, if the task panicked or was aborted.
pub async fn join_timer(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) if e.is_panic() => {
            error!("The {name} timer panicked: {e}");
            false
        }
        Err(e) => {
            warn!("The {name} timer did not stop cleanly: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::stats::StatsAggregator;
    use crate::store::SeatStore;
    use crate::testing::{feed_section, RecordingMailer, ScriptedFeed};

    #[tokio::test]
    async fn test_sync_timer_runs_immediately_and_stops() {
        let store = Arc::new(SeatStore::open_in_memory().unwrap());
        let notifier = Notifier::new(
            Arc::clone(&store),
            Arc::new(RecordingMailer::default()),
            Duration::from_secs(270),
        );
        let sync = Arc::new(
            Synchronizer::new(
                Arc::new(ScriptedFeed::new(vec![feed_section("CSE110", 501, 40, 40)])),
                Arc::clone(&store),
                notifier,
                Broadcaster::new(4),
                StatsAggregator::new(Arc::clone(&store)),
            )
            .unwrap(),
        );

        let cancel = CancellationToken::new();
        let handle = spawn_sync_timer(sync, Duration::from_secs(3600), cancel.clone());

        for _ in 0..100 {
            if store.get_section("501").unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.get_section("501").unwrap().is_some());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_join_timer_reports_panics() {
        let clean = tokio::spawn(async {});
        assert!(join_timer("clean", clean).await);

        let panicked = tokio::spawn(async { panic!("timer failure") });
        assert!(!join_timer("panicked", panicked).await);
    }
}
