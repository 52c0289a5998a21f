//! Seat availability notifications.
//!
//! Three entry points share one suppression rule (seats available, user has
//! an email, enough time since `last_notified_at`):
//! - [`Notifier::notify_seat_opening`]: reactive, called by the synchronizer
//!   for every delta with free seats; gated by the fixed reactive cooldown.
//! - [`Notifier::run_reminder_sweep`]: periodic, reads the stored section
//!   state and applies each tracking's own interval.
//! - [`Notifier::dispatch`]: unconditional single send, used right after a
//!   tracking is created.
//!
//! Sends run as detached tasks on a [`TaskTracker`]; nothing waits for them
//! except [`Notifier::wait_idle`].

pub mod mail;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::store::{EmailStatus, EmailType, NewEmailLog, SeatStore, Tracker};
use mail::{seat_available_subject, Mailer};

/// Interval used when a tracking carries none.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// A section that just reported free seats.
#[derive(Debug, Clone)]
pub struct SeatOpening {
    pub section_id: String,
    pub course_code: String,
    pub section_number: String,
    pub available: i64,
}

/// One email to send on behalf of one tracking.
#[derive(Debug, Clone)]
pub struct MailJob {
    pub tracking_id: i64,
    pub to: String,
    pub course_code: String,
    pub section_number: String,
    pub available: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Active trackings examined
    pub checked: usize,
    /// Emails dispatched
    pub dispatched: usize,
}

/// True if at least `min_gap` has passed since `last_notified_at`, or if
/// the tracking was never notified.
pub fn is_due(last_notified_at: Option<DateTime<Utc>>, min_gap: Duration, now: DateTime<Utc>) -> bool {
    match last_notified_at {
        None => true,
        Some(last) => now.signed_duration_since(last) >= min_gap,
    }
}

pub(crate) fn deliverable_email(email: Option<&str>) -> Option<&str> {
    email.map(str::trim).filter(|e| !e.is_empty())
}

#[derive(Clone)]
pub struct Notifier {
    store: Arc<SeatStore>,
    mailer: Arc<dyn Mailer>,
    tasks: TaskTracker,
    reactive_cooldown: Duration,
}

impl Notifier {
    pub fn new(store: Arc<SeatStore>, mailer: Arc<dyn Mailer>, reactive_cooldown: std::time::Duration) -> Self {
        Self {
            store,
            mailer,
            tasks: TaskTracker::new(),
            reactive_cooldown: Duration::from_std(reactive_cooldown)
                .unwrap_or_else(|_| Duration::seconds(270)),
        }
    }

    /// Notifies the trackers of a section that now has free seats.
    ///
    /// Returns immediately; tracker lookup and sends happen in the background.
    pub fn notify_seat_opening(&self, opening: SeatOpening) {
        let this = self.clone();
        self.tasks.spawn(async move {
            this.handle_seat_opening(&opening, Utc::now());
        });
    }

    fn handle_seat_opening(&self, opening: &SeatOpening, now: DateTime<Utc>) -> usize {
        if opening.available <= 0 {
            return 0;
        }

        let trackers = match self.store.trackers_for_section(&opening.section_id) {
            Ok(trackers) => trackers,
            Err(e) => {
                error!(
                    "Failed to load trackers for section {}: {e}",
                    opening.section_id
                );
                return 0;
            }
        };
        if trackers.is_empty() {
            return 0;
        }

        info!(
            "Notifying {} trackers for {} Sec {}",
            trackers.len(),
            opening.course_code,
            opening.section_number
        );

        let mut dispatched = 0;
        for tracker in trackers {
            let Some(email) = deliverable_email(tracker.email.as_deref()) else {
                continue;
            };
            if !is_due(tracker.last_notified_at, self.reactive_cooldown, now) {
                debug!(
                    "Cooldown active for {email} ({}), skipping",
                    opening.course_code
                );
                continue;
            }

            let job = MailJob {
                tracking_id: tracker.tracking_id,
                to: email.to_string(),
                course_code: opening.course_code.clone(),
                section_number: opening.section_number.clone(),
                available: opening.available,
            };
            if self.dispatch(job) {
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Periodic reminder pass over all active trackings.
    pub fn run_reminder_sweep(&self) -> rusqlite::Result<SweepReport> {
        self.run_reminder_sweep_at(Utc::now())
    }

    pub fn run_reminder_sweep_at(&self, now: DateTime<Utc>) -> rusqlite::Result<SweepReport> {
        let candidates = self.store.reminder_candidates()?;
        let mut report = SweepReport {
            checked: candidates.len(),
            dispatched: 0,
        };

        for candidate in candidates {
            let Tracker {
                tracking_id,
                email,
                notify_interval_minutes,
                last_notified_at,
                ..
            } = &candidate.tracker;

            let minutes = match *notify_interval_minutes {
                0 => DEFAULT_INTERVAL_MINUTES,
                m => m,
            };
            if !is_due(*last_notified_at, Duration::minutes(i64::from(minutes)), now) {
                continue;
            }

            let available = candidate.available();
            let Some(email) = deliverable_email(email.as_deref()) else {
                continue;
            };
            if available <= 0 {
                continue;
            }

            debug!(
                "Reminder for {email}: {} Sec {} (interval {minutes}min)",
                candidate.course_code, candidate.section_number
            );
            let job = MailJob {
                tracking_id: *tracking_id,
                to: email.to_string(),
                course_code: candidate.course_code.clone(),
                section_number: candidate.section_number.clone(),
                available,
            };
            if self.dispatch(job) {
                report.dispatched += 1;
            }
        }

        Ok(report)
    }

    /// Sends one email in the background without any cooldown check.
    ///
    /// Returns false, sending nothing, if there are no free seats or no
    /// recipient.
    pub fn dispatch(&self, mut job: MailJob) -> bool {
        if job.available <= 0 {
            return false;
        }
        match deliverable_email(Some(job.to.as_str())) {
            Some(to) => job.to = to.to_string(),
            None => return false,
        }

        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);
        self.tasks.spawn(deliver(store, mailer, job));
        true
    }

    /// Waits until every background send spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

async fn deliver(store: Arc<SeatStore>, mailer: Arc<dyn Mailer>, job: MailJob) {
    let result = mailer
        .send_seat_available_email(&job.to, &job.course_code, &job.section_number, job.available)
        .await;

    let (status, error) = match &result {
        Ok(()) => {
            info!(
                "Email sent to {} for {} Sec {}",
                job.to, job.course_code, job.section_number
            );
            (EmailStatus::Sent, None)
        }
        Err(e) => {
            error!(
                "Failed to send email to {} for {} Sec {}: {e}",
                job.to, job.course_code, job.section_number
            );
            (EmailStatus::Failed, Some(e.to_string()))
        }
    };

    let log = NewEmailLog {
        recipient: job.to.clone(),
        subject: seat_available_subject(&job.course_code, &job.section_number),
        email_type: EmailType::SeatAvailable,
        status,
        course_code: Some(job.course_code.clone()),
        section_number: Some(job.section_number.clone()),
        error,
    };
    if let Err(e) = store.insert_email_log(&log) {
        warn!("Failed to record email log for {}: {e}", job.to);
    }

    if status != EmailStatus::Sent {
        return;
    }
    match store.touch_last_notified(job.tracking_id, Utc::now()) {
        Ok(true) => {}
        Ok(false) => debug!(
            "Tracking {} was removed before its notification time was recorded",
            job.tracking_id
        ),
        Err(e) => error!(
            "Failed to update last notification time for tracking {}: {e}",
            job.tracking_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_store, RecordingMailer};

    fn notifier(store: &Arc<SeatStore>, mailer: &Arc<RecordingMailer>) -> Notifier {
        Notifier::new(
            Arc::clone(store),
            mailer.clone(),
            std::time::Duration::from_secs(270),
        )
    }

    fn opening(available: i64) -> SeatOpening {
        SeatOpening {
            section_id: "501".to_string(),
            course_code: "CSE110".to_string(),
            section_number: "01".to_string(),
            available,
        }
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let gap = Duration::minutes(5);
        assert!(is_due(None, gap, now));
        assert!(!is_due(Some(now), gap, now));
        assert!(!is_due(Some(now - Duration::minutes(4)), gap, now));
        assert!(is_due(Some(now - Duration::minutes(5)), gap, now));
        assert!(is_due(Some(now - Duration::hours(1)), gap, now));
    }

    #[tokio::test]
    async fn test_reactive_respects_cooldown() {
        let store = seeded_store(&[("501", 40, 39)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        store.upsert_user("u2", Some("two@example.com")).unwrap();
        let recent = store.upsert_tracking("u1", "501", 5).unwrap();
        store.upsert_tracking("u2", "501", 5).unwrap();
        store
            .touch_last_notified(recent.tracking_id, Utc::now() - Duration::minutes(2))
            .unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(&store, &mailer);

        assert_eq!(notifier.handle_seat_opening(&opening(1), Utc::now()), 1);
        notifier.wait_idle().await;
        assert_eq!(mailer.recipients(), vec!["two@example.com".to_string()]);

        // u2 was just notified, u1 is still cooling down.
        notifier.notify_seat_opening(opening(1));
        notifier.wait_idle().await;
        assert_eq!(mailer.sent_count(), 1);

        // 4.5 minutes later only u1 is due again.
        let later = Utc::now() + Duration::seconds(160);
        assert_eq!(notifier.handle_seat_opening(&opening(1), later), 1);
        notifier.wait_idle().await;
        assert_eq!(mailer.sent_count(), 2);
        assert_eq!(mailer.recipients()[1], "one@example.com");
    }

    #[tokio::test]
    async fn test_reactive_skips_users_without_email() {
        let store = seeded_store(&[("501", 40, 39)]);
        store.upsert_user("u1", None).unwrap();
        store.upsert_user("u2", Some("  ")).unwrap();
        store.upsert_tracking("u1", "501", 5).unwrap();
        store.upsert_tracking("u2", "501", 5).unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(&store, &mailer);

        assert_eq!(notifier.handle_seat_opening(&opening(1), Utc::now()), 0);
        assert_eq!(notifier.handle_seat_opening(&opening(0), Utc::now()), 0);
        notifier.wait_idle().await;
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_cooldown_property() {
        let store = seeded_store(&[("501", 40, 38)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        let tracking = store.upsert_tracking("u1", "501", 5).unwrap();
        store.set_notify_interval("u1", "501", 10).unwrap();

        let notified_at = Utc::now();
        store
            .touch_last_notified(tracking.tracking_id, notified_at)
            .unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(&store, &mailer);

        let report = notifier
            .run_reminder_sweep_at(notified_at + Duration::minutes(9))
            .unwrap();
        notifier.wait_idle().await;
        assert_eq!(report, SweepReport { checked: 1, dispatched: 0 });
        assert_eq!(mailer.sent_count(), 0);

        let report = notifier
            .run_reminder_sweep_at(notified_at + Duration::minutes(10))
            .unwrap();
        notifier.wait_idle().await;
        assert_eq!(report.dispatched, 1);
        assert_eq!(mailer.sent_count(), 1);
        assert_eq!(mailer.sent()[0].available, 2);

        let updated = store.get_tracking("u1", "501").unwrap().unwrap();
        assert!(updated.last_notified_at.unwrap() > notified_at);
    }

    #[tokio::test]
    async fn test_sweep_skips_full_sections() {
        let store = seeded_store(&[("501", 40, 40)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        store.upsert_tracking("u1", "501", 5).unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(&store, &mailer);

        let report = notifier.run_reminder_sweep().unwrap();
        notifier.wait_idle().await;
        assert_eq!(report.dispatched, 0);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_is_logged_and_isolated() {
        let store = seeded_store(&[("501", 40, 30)]);
        store.upsert_user("u1", Some("bounce@example.com")).unwrap();
        store.upsert_user("u2", Some("ok@example.com")).unwrap();
        store.upsert_tracking("u1", "501", 5).unwrap();
        store.upsert_tracking("u2", "501", 5).unwrap();

        let mailer = Arc::new(RecordingMailer::failing_for(&["bounce@example.com"]));
        let notifier = notifier(&store, &mailer);

        assert_eq!(notifier.handle_seat_opening(&opening(10), Utc::now()), 2);
        notifier.wait_idle().await;

        assert_eq!(mailer.recipients(), vec!["ok@example.com".to_string()]);
        let stats = store.email_stats(Utc::now() - Duration::hours(1)).unwrap();
        assert_eq!((stats.total, stats.sent, stats.failed), (2, 1, 1));

        // The failed tracking keeps no notification time and stays eligible.
        let failed = store.get_tracking("u1", "501").unwrap().unwrap();
        assert!(failed.last_notified_at.is_none());
        let sent = store.get_tracking("u2", "501").unwrap().unwrap();
        assert!(sent.last_notified_at.is_some());
    }

    #[tokio::test]
    async fn test_untrack_during_send_is_harmless() {
        let store = seeded_store(&[("501", 40, 30)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        let tracking = store.upsert_tracking("u1", "501", 5).unwrap();
        store.delete_tracking("u1", "501").unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(&store, &mailer);
        assert!(notifier.dispatch(MailJob {
            tracking_id: tracking.tracking_id,
            to: "one@example.com".to_string(),
            course_code: "CSE110".to_string(),
            section_number: "01".to_string(),
            available: 10,
        }));
        notifier.wait_idle().await;

        assert_eq!(mailer.sent_count(), 1);
        assert!(store.get_tracking("u1", "501").unwrap().is_none());
    }
}
