//! The poll, diff, write and notify cycle.
//!
//! [`Synchronizer::run_sync`] fetches the whole feed, writes only the
//! sections whose seat counts moved (or that have no slots yet), and
//! reports those sections as deltas to the broadcaster and the notifier.
//! Cycles never overlap: a call made while one is in flight returns
//! [`SyncOutcome::Skipped`] at once.

mod snapshot;
mod types;

pub use snapshot::{SeatSnapshot, SeatState, SyncCaches};
pub use types::{SeatDelta, SyncOutcome, SyncSummary};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::feed::{FeedError, FeedSection, FeedSource};
use crate::notify::{Notifier, SeatOpening};
use crate::schedule::section_slots;
use crate::stats::StatsAggregator;
use crate::store::{DbCourse, NewSection, NewSlot, SeatStore};

/// Sections written per store transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Holds the in-flight flag for the duration of one cycle.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Synchronizer {
    feed: Arc<dyn FeedSource>,
    store: Arc<SeatStore>,
    notifier: Notifier,
    broadcaster: Broadcaster,
    stats: StatsAggregator,
    chunk_size: usize,
    running: AtomicBool,
    caches: Mutex<SyncCaches>,
}

impl Synchronizer {
    /// Creates a synchronizer whose seat snapshot is seeded from the store.
    pub fn new(
        feed: Arc<dyn FeedSource>,
        store: Arc<SeatStore>,
        notifier: Notifier,
        broadcaster: Broadcaster,
        stats: StatsAggregator,
    ) -> rusqlite::Result<Self> {
        let caches = SyncCaches::seeded(store.seat_records()?);
        info!(
            "Seeded seat snapshot with {} sections",
            caches.snapshot.len()
        );

        Ok(Self {
            feed,
            store,
            notifier,
            broadcaster,
            stats,
            chunk_size: DEFAULT_CHUNK_SIZE,
            running: AtomicBool::new(false),
            caches: Mutex::new(caches),
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one full cycle, unless one is already running.
    pub async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            info!("Sync already in progress, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        let started = Instant::now();
        info!("Starting seat synchronization");

        let sections = match self.feed.fetch().await {
            Ok(sections) => sections,
            Err(e) => {
                error!("Synchronization failed: {e}");
                return Err(e.into());
            }
        };
        info!("Fetched {} sections. Processing...", sections.len());

        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let summary = match self.reconcile(&mut caches, &sections) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Synchronization failed: {e}");
                return Err(e);
            }
        };

        info!(
            "Synchronization complete in {:.2?}: {} sections, {} written, {} deltas",
            started.elapsed(),
            summary.total_sections,
            summary.sections_written,
            summary.updated_sections
        );
        Ok(SyncOutcome::Completed(summary))
    }

    fn reconcile(&self, caches: &mut SyncCaches, sections: &[FeedSection]) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary {
            total_sections: sections.len(),
            ..SyncSummary::default()
        };

        summary.courses_upserted = self.upsert_courses(&mut caches.upserted_courses, sections);

        let stale: Vec<&FeedSection> = sections
            .iter()
            .filter(|s| caches.snapshot.is_stale(s))
            .collect();

        if !stale.is_empty() {
            let ids: Vec<String> = stale.iter().map(|s| s.key()).collect();
            summary.slots_deleted = self.store.delete_slots_for_sections(&ids)?;
            info!(
                "Bulk deleted {} slots for {} sections",
                summary.slots_deleted,
                stale.len()
            );
        }

        let written = self.write_sections(&caches.upserted_courses, &stale, &mut summary)?;

        let deltas = detect_deltas(&mut caches.snapshot, sections, &written);
        summary.updated_sections = deltas.len();

        for delta in deltas.iter().filter(|d| d.available > 0) {
            self.notifier.notify_seat_opening(SeatOpening {
                section_id: delta.section_id.clone(),
                course_code: delta.course_code.clone(),
                section_number: delta.section_number.clone(),
                available: delta.available,
            });
        }

        if !deltas.is_empty() {
            info!("Detected {} seat changes, broadcasting...", deltas.len());
        }
        self.broadcaster.broadcast_seat_update(&deltas);
        self.broadcaster
            .broadcast_sync_complete(summary.total_sections, summary.updated_sections);

        if let Err(e) = self.stats.refresh_from_feed(sections) {
            error!("Failed to update course stats: {e}");
        }

        Ok(summary)
    }

    /// Upserts every course of the feed not yet upserted by this process.
    fn upsert_courses(&self, upserted: &mut HashSet<String>, sections: &[FeedSection]) -> usize {
        let mut seen = HashSet::new();
        let mut count = 0;

        for section in sections {
            let code = section.course_code.as_str();
            if !seen.insert(code) || upserted.contains(code) {
                continue;
            }

            let course = DbCourse {
                code: code.to_string(),
                title: code.to_string(),
                department: section
                    .academic_degree
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            };
            match self.store.upsert_course(&course) {
                Ok(()) => {
                    upserted.insert(course.code);
                    count += 1;
                }
                Err(e) => error!("Failed to upsert course {code}: {e}"),
            }
        }

        info!(
            "Found {} unique courses, upserted {count}",
            seen.len()
        );
        count
    }

    /// Writes stale sections chunk by chunk and inserts all their slots in
    /// one batch.
    ///
    /// Chunks run one after another: every write goes through the store's
    /// single connection, so a chunk is one transaction rather than a set of
    /// parallel tasks.
    ///
    /// Returns the slot count of every section written. Sections that fail
    /// are logged and left out.
    fn write_sections(
        &self,
        upserted: &HashSet<String>,
        stale: &[&FeedSection],
        summary: &mut SyncSummary,
    ) -> Result<HashMap<String, usize>, SyncError> {
        let mut written = HashMap::new();
        let mut pending_slots = Vec::new();

        for chunk in stale.chunks(self.chunk_size) {
            let (ready, orphaned): (Vec<&FeedSection>, Vec<&FeedSection>) = chunk
                .iter()
                .copied()
                .partition(|s| upserted.contains(&s.course_code));
            for section in orphaned {
                warn!(
                    "Skipping section {}: course {} was not upserted",
                    section.section_id, section.course_code
                );
            }

            let rows: Vec<NewSection> = ready.iter().map(|s| new_section(s)).collect();
            let results = self.store.upsert_sections(&rows)?;

            for (section, result) in ready.into_iter().zip(results) {
                let section_id = section.key();
                if let Err(e) = result {
                    error!("Failed to process section {section_id}: {e}");
                    continue;
                }

                let slots = section_slots(section);
                debug!("Section {section_id}: {} slots", slots.len());
                written.insert(section_id.clone(), slots.len());
                pending_slots.extend(slots.into_iter().map(|slot| NewSlot {
                    section_id: section_id.clone(),
                    slot,
                }));
            }
        }

        summary.sections_written = written.len();
        summary.slots_inserted = self.store.insert_slots(&pending_slots)?;
        info!(
            "Wrote {} sections and {} slots",
            summary.sections_written, summary.slots_inserted
        );

        Ok(written)
    }
}

fn new_section(section: &FeedSection) -> NewSection {
    NewSection {
        section_id: section.key(),
        course_code: section.course_code.clone(),
        section_number: section.section_name.clone(),
        capacity: section.capacity,
        enrolled: section.consumed_seat,
        faculty: section.faculties.clone(),
        lab_faculty: section.lab_faculties.clone(),
        exam_date: section.exam_date().map(str::to_string),
        prerequisites: section.prerequisite_courses.clone(),
    }
}

/// Compares every feed section with the pre-cycle snapshot and records the
/// changed ones, updating the snapshot as it goes.
///
/// A section that was not written this cycle is recorded with zero slots
/// so that the next cycle retries it.
fn detect_deltas(
    snapshot: &mut SeatSnapshot,
    sections: &[FeedSection],
    written: &HashMap<String, usize>,
) -> Vec<SeatDelta> {
    let mut deltas = Vec::new();

    for section in sections {
        if !snapshot.is_stale(section) {
            continue;
        }

        let delta = SeatDelta::from_feed(section);
        let slot_count = written.get(&delta.section_id).copied().unwrap_or(0);
        snapshot.insert(
            delta.section_id.clone(),
            SeatState {
                enrolled: delta.enrolled,
                capacity: delta.capacity,
                slot_count,
            },
        );
        deltas.push(delta);
    }

    deltas
}
