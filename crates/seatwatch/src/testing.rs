//! Test doubles shared by the unit tests of several modules.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::feed::{FeedError, FeedSection, FeedSource};
use crate::notify::mail::{MailError, Mailer};
use crate::store::{DbCourse, NewSection, SeatStore};

/// A minimal feed record with no schedule information.
pub fn feed_section(course_code: &str, section_id: u64, capacity: i64, consumed: i64) -> FeedSection {
    FeedSection {
        course_code: course_code.to_string(),
        academic_degree: Some("BSc".to_string()),
        section_id,
        section_name: "01".to_string(),
        capacity,
        consumed_seat: consumed,
        faculties: None,
        lab_faculties: None,
        room_number: None,
        room_name: None,
        lab_room_name: None,
        prerequisite_courses: None,
        pre_reg_schedule: None,
        pre_reg_lab_schedule: None,
        section_schedule: None,
        lab_schedules: None,
    }
}

/// An in-memory store holding course CSE110 with the given
/// `(section_id, capacity, enrolled)` sections, all numbered "01".
pub fn seeded_store(sections: &[(&str, i64, i64)]) -> Arc<SeatStore> {
    let store = SeatStore::open_in_memory().unwrap();
    store
        .upsert_course(&DbCourse {
            code: "CSE110".to_string(),
            title: "CSE110".to_string(),
            department: "BSc".to_string(),
        })
        .unwrap();

    let rows: Vec<NewSection> = sections
        .iter()
        .map(|(id, capacity, enrolled)| NewSection {
            section_id: id.to_string(),
            course_code: "CSE110".to_string(),
            section_number: "01".to_string(),
            capacity: *capacity,
            enrolled: *enrolled,
            faculty: None,
            lab_faculty: None,
            exam_date: None,
            prerequisites: None,
        })
        .collect();
    let results = store.upsert_sections(&rows).unwrap();
    assert!(results.iter().all(|r| r.is_ok()));

    Arc::new(store)
}

/// Returns whatever result was last scripted.
pub struct ScriptedFeed {
    next: Mutex<Result<Vec<FeedSection>, String>>,
}

impl ScriptedFeed {
    pub fn new(sections: Vec<FeedSection>) -> Self {
        Self {
            next: Mutex::new(Ok(sections)),
        }
    }

    pub fn set(&self, sections: Vec<FeedSection>) {
        *self.next.lock().unwrap() = Ok(sections);
    }

    /// Makes the next fetches fail as if the body was not an array.
    pub fn fail(&self) {
        *self.next.lock().unwrap() = Err("maintenance".to_string());
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> Result<Vec<FeedSection>, FeedError> {
        match &*self.next.lock().unwrap() {
            Ok(sections) => Ok(sections.clone()),
            Err(_) => Err(FeedError::NotAnArray { found: "an object" }),
        }
    }
}

/// A feed whose fetch blocks until released, for overlapping-cycle tests.
#[derive(Default)]
pub struct GatedFeed {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl FeedSource for GatedFeed {
    async fn fetch(&self) -> Result<Vec<FeedSection>, FeedError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub course_code: String,
    pub section_number: String,
    pub available: i64,
}

/// Records sends instead of delivering them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: HashSet<String>,
}

impl RecordingMailer {
    /// A mailer that rejects every send to one of `recipients`.
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_seat_available_email(
        &self,
        to: &str,
        course_code: &str,
        section_number: &str,
        available: i64,
    ) -> Result<(), MailError> {
        if self.failing.contains(to) {
            return Err(MailError::Build(format!("rejected recipient {to}")));
        }

        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            course_code: course_code.to_string(),
            section_number: section_number.to_string(),
            available,
        });
        Ok(())
    }
}
