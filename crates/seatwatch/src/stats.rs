/// Precomputed global counts, kept in a single row
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::feed::FeedSection;
use crate::store::{DbStats, SeatStore};

#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<SeatStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<SeatStore>) -> Self {
        Self { store }
    }

    /// Recomputes the row from a full feed snapshot.
    ///
    /// The course count comes from the store, sections and seats from the
    /// feed itself.
    pub fn refresh_from_feed(&self, sections: &[FeedSection]) -> rusqlite::Result<DbStats> {
        let stats = DbStats {
            total_courses: self.store.count_courses()?,
            total_sections: i64::try_from(sections.len()).unwrap_or(i64::MAX),
            total_available_seats: sections
                .iter()
                .map(FeedSection::available)
                .fold(0, i64::saturating_add),
            last_updated: Utc::now(),
        };
        self.store.upsert_stats(&stats)?;

        debug!(
            "Stats updated: {} courses, {} sections, {} available seats",
            stats.total_courses, stats.total_sections, stats.total_available_seats
        );
        Ok(stats)
    }

    /// Returns the stored row, computing it from the store on first access.
    pub fn current(&self) -> rusqlite::Result<DbStats> {
        if let Some(stats) = self.store.get_stats()? {
            return Ok(stats);
        }

        info!("No stats row yet, computing from stored sections");
        let (total_sections, total_available_seats) = self.store.seat_totals()?;
        let stats = DbStats {
            total_courses: self.store.count_courses()?,
            total_sections,
            total_available_seats,
            last_updated: Utc::now(),
        };
        self.store.upsert_stats(&stats)?;
        Ok(stats)
    }
}
