/// Results of one synchronization cycle
use serde::Serialize;

use crate::feed::FeedSection;
use crate::store::SeatStatus;

/// A section whose seat state changed since the previous cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatDelta {
    pub section_id: String,
    pub course_code: String,
    pub section_number: String,
    pub enrolled: i64,
    pub capacity: i64,
    pub available: i64,
    pub status: SeatStatus,
}

impl SeatDelta {
    pub fn from_feed(section: &FeedSection) -> Self {
        Self {
            section_id: section.key(),
            course_code: section.course_code.clone(),
            section_number: section.section_name.clone(),
            enrolled: section.consumed_seat,
            capacity: section.capacity,
            available: section.available(),
            status: SeatStatus::from_counts(section.consumed_seat, section.capacity),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Sections in the feed
    pub total_sections: usize,
    /// Sections reported as deltas
    pub updated_sections: usize,
    pub courses_upserted: usize,
    pub sections_written: usize,
    pub slots_deleted: usize,
    pub slots_inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    /// Another cycle was already running; nothing was done.
    Skipped,
}
