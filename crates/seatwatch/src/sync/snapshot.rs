//! Process-local state carried between sync cycles.

use std::collections::{HashMap, HashSet};

use crate::feed::FeedSection;
use crate::store::SeatRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatState {
    pub enrolled: i64,
    pub capacity: i64,
    pub slot_count: usize,
}

/// Last observed seat state per section ID.
#[derive(Debug, Default)]
pub struct SeatSnapshot {
    entries: HashMap<String, SeatState>,
}

impl SeatSnapshot {
    pub fn from_records(records: Vec<SeatRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|r| {
                (
                    r.section_id,
                    SeatState {
                        enrolled: r.enrolled,
                        capacity: r.capacity,
                        slot_count: r.slot_count,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// True if the section is unseen, has no slots yet, or reports
    /// different seat counts than last time.
    pub fn is_stale(&self, section: &FeedSection) -> bool {
        match self.entries.get(&section.key()) {
            None => true,
            Some(prev) => {
                prev.slot_count == 0
                    || prev.enrolled != section.consumed_seat
                    || prev.capacity != section.capacity
            }
        }
    }

    pub fn insert(&mut self, section_id: String, state: SeatState) {
        self.entries.insert(section_id, state);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Caches owned by the synchronizer for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SyncCaches {
    pub snapshot: SeatSnapshot,
    /// Course codes already upserted by this process
    pub upserted_courses: HashSet<String>,
}

impl SyncCaches {
    pub fn seeded(records: Vec<SeatRecord>) -> Self {
        Self {
            snapshot: SeatSnapshot::from_records(records),
            upserted_courses: HashSet::new(),
        }
    }
}
