//! User subscriptions to section seat availability.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::notify::{deliverable_email, MailJob, Notifier, DEFAULT_INTERVAL_MINUTES};
use crate::store::{DbSection, DbSlot, DbTracking, SeatStore};

/// Reminder intervals a user may pick, in minutes.
pub const ALLOWED_INTERVALS: [u32; 8] = [1, 2, 3, 5, 10, 15, 30, 60];

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Section {0} not found")]
    SectionNotFound(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Tracking not found")]
    TrackingNotFound,

    #[error("Invalid interval {0} minutes. Allowed: 1, 2, 3, 5, 10, 15, 30, 60")]
    InvalidInterval(u32),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// A tracking together with what the user needs to see about its section.
#[derive(Debug, Clone)]
pub struct TrackedSection {
    pub tracking: DbTracking,
    pub section: DbSection,
    pub slots: Vec<DbSlot>,
}

#[derive(Clone)]
pub struct TrackingService {
    store: Arc<SeatStore>,
    notifier: Notifier,
}

impl TrackingService {
    pub fn new(store: Arc<SeatStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Starts (or reactivates) tracking of a section.
    ///
    /// If the section already has free seats and the user has an email, one
    /// notification is dispatched right away.
    pub fn track_section(&self, user_id: &str, section_id: &str) -> Result<DbTracking, TrackingError> {
        let section = self
            .store
            .get_section(section_id)?
            .ok_or_else(|| TrackingError::SectionNotFound(section_id.to_string()))?;
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| TrackingError::UserNotFound(user_id.to_string()))?;

        let tracking = self
            .store
            .upsert_tracking(user_id, section_id, DEFAULT_INTERVAL_MINUTES)?;
        info!(
            "User {user_id} tracking {} Sec {}",
            section.course_code, section.section_number
        );

        if let Some(email) = deliverable_email(user.email.as_deref()) {
            let sent = self.notifier.dispatch(MailJob {
                tracking_id: tracking.tracking_id,
                to: email.to_string(),
                course_code: section.course_code.clone(),
                section_number: section.section_number.clone(),
                available: section.available(),
            });
            if sent {
                info!(
                    "Immediate notification queued for {} Sec {}",
                    section.course_code, section.section_number
                );
            }
        }

        Ok(tracking)
    }

    pub fn untrack_section(&self, user_id: &str, section_id: &str) -> Result<(), TrackingError> {
        if !self.store.delete_tracking(user_id, section_id)? {
            return Err(TrackingError::TrackingNotFound);
        }
        info!("User {user_id} stopped tracking section {section_id}");
        Ok(())
    }

    pub fn update_notify_interval(
        &self,
        user_id: &str,
        section_id: &str,
        minutes: u32,
    ) -> Result<DbTracking, TrackingError> {
        if !ALLOWED_INTERVALS.contains(&minutes) {
            return Err(TrackingError::InvalidInterval(minutes));
        }
        if !self.store.set_notify_interval(user_id, section_id, minutes)? {
            return Err(TrackingError::TrackingNotFound);
        }

        self.store
            .get_tracking(user_id, section_id)?
            .ok_or(TrackingError::TrackingNotFound)
    }

    pub fn user_tracks(&self, user_id: &str) -> Result<Vec<TrackedSection>, TrackingError> {
        self.store
            .user_trackings(user_id)?
            .into_iter()
            .map(|(tracking, section)| {
                let slots = self.store.slots_for_section(&section.section_id)?;
                Ok(TrackedSection {
                    tracking,
                    section,
                    slots,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_store, RecordingMailer};

    fn service(store: &Arc<SeatStore>) -> (TrackingService, Notifier, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(
            Arc::clone(store),
            mailer.clone(),
            std::time::Duration::from_secs(270),
        );
        (
            TrackingService::new(Arc::clone(store), notifier.clone()),
            notifier,
            mailer,
        )
    }

    #[tokio::test]
    async fn test_track_open_section_notifies_immediately() {
        let store = seeded_store(&[("501", 40, 37), ("502", 40, 40)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        let (service, notifier, mailer) = service(&store);

        let tracking = service.track_section("u1", "501").unwrap();
        assert_eq!(tracking.notify_interval_minutes, DEFAULT_INTERVAL_MINUTES);
        service.track_section("u1", "502").unwrap();
        notifier.wait_idle().await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].available, 3);
        assert!(store
            .get_tracking("u1", "501")
            .unwrap()
            .unwrap()
            .last_notified_at
            .is_some());
    }

    #[tokio::test]
    async fn test_immediate_notification_uses_trimmed_address() {
        let store = seeded_store(&[("501", 40, 39)]);
        store.upsert_user("u1", Some("  one@example.com \n")).unwrap();
        let (service, notifier, mailer) = service(&store);

        service.track_section("u1", "501").unwrap();
        notifier.wait_idle().await;

        assert_eq!(mailer.recipients(), vec!["one@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_track_unknown_section_or_user() {
        let store = seeded_store(&[("501", 40, 37)]);
        store.upsert_user("u1", None).unwrap();
        let (service, notifier, mailer) = service(&store);

        assert!(matches!(
            service.track_section("u1", "999"),
            Err(TrackingError::SectionNotFound(_))
        ));
        assert!(matches!(
            service.track_section("ghost", "501"),
            Err(TrackingError::UserNotFound(_))
        ));

        // No email: tracked, but never mailed.
        service.track_section("u1", "501").unwrap();
        notifier.wait_idle().await;
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_interval_and_untrack() {
        let store = seeded_store(&[("501", 40, 40)]);
        store.upsert_user("u1", Some("one@example.com")).unwrap();
        let (service, _, _) = service(&store);
        service.track_section("u1", "501").unwrap();

        assert!(matches!(
            service.update_notify_interval("u1", "501", 7),
            Err(TrackingError::InvalidInterval(7))
        ));
        let updated = service.update_notify_interval("u1", "501", 30).unwrap();
        assert_eq!(updated.notify_interval_minutes, 30);

        let tracks = service.user_tracks("u1").unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].section.section_id, "501");

        service.untrack_section("u1", "501").unwrap();
        assert!(matches!(
            service.untrack_section("u1", "501"),
            Err(TrackingError::TrackingNotFound)
        ));
        assert!(matches!(
            service.update_notify_interval("u1", "501", 30),
            Err(TrackingError::TrackingNotFound)
        ));
        assert!(service.user_tracks("u1").unwrap().is_empty());
    }
}
