/// Database types for courses, sections, slots and tracking
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::ParsedSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Open,
    Closed,
}

impl SeatStatus {
    /// `Closed` iff `enrolled >= capacity`.
    pub fn from_counts(enrolled: i64, capacity: i64) -> Self {
        if enrolled >= capacity {
            SeatStatus::Closed
        } else {
            SeatStatus::Open
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Open => "OPEN",
            SeatStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DbCourse {
    pub code: String,
    pub title: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbSection {
    pub section_id: String,
    pub course_code: String,
    pub section_number: String,
    pub capacity: i64,
    pub enrolled: i64,
    pub status: SeatStatus,
    pub faculty: Option<String>,
    pub lab_faculty: Option<String>,
    pub exam_date: Option<String>,
    pub prerequisites: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl DbSection {
    pub fn available(&self) -> i64 {
        self.capacity.saturating_sub(self.enrolled).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DbSlot {
    pub slot_id: i64,
    pub section_id: String,
    pub day: String,
    pub start_time: i64,
    pub end_time: i64,
    pub room: String,
    pub building: String,
    pub slot_type: String,
}

/// Section row as written by the synchronizer.
#[derive(Debug, Clone)]
pub struct NewSection {
    pub section_id: String,
    pub course_code: String,
    pub section_number: String,
    pub capacity: i64,
    pub enrolled: i64,
    pub faculty: Option<String>,
    pub lab_faculty: Option<String>,
    pub exam_date: Option<String>,
    pub prerequisites: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub section_id: String,
    pub slot: ParsedSlot,
}

/// Seat counts and slot count of one stored section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRecord {
    pub section_id: String,
    pub enrolled: i64,
    pub capacity: i64,
    pub slot_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbTracking {
    pub tracking_id: i64,
    pub user_id: String,
    pub section_id: String,
    pub active: bool,
    pub notify_interval_minutes: u32,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An active tracking of one section, joined with its user's email.
#[derive(Debug, Clone)]
pub struct Tracker {
    pub tracking_id: i64,
    pub user_id: String,
    pub email: Option<String>,
    pub notify_interval_minutes: u32,
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// An active tracking joined with its user and the stored section state.
#[derive(Debug, Clone)]
pub struct ReminderCandidate {
    pub tracker: Tracker,
    pub course_code: String,
    pub section_number: String,
    pub capacity: i64,
    pub enrolled: i64,
}

impl ReminderCandidate {
    pub fn available(&self) -> i64 {
        self.capacity.saturating_sub(self.enrolled).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailType {
    SeatAvailable,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::SeatAvailable => "SEAT_AVAILABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmailStatus {
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Sent => "SENT",
            EmailStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub recipient: String,
    pub subject: String,
    pub email_type: EmailType,
    pub status: EmailStatus,
    pub course_code: Option<String>,
    pub section_number: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub today: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub total_courses: i64,
    pub total_sections: i64,
    pub total_available_seats: i64,
    pub last_updated: DateTime<Utc>,
}
