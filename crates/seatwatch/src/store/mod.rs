/// Database module for persisted courses, sections, slots and tracking data

mod types;

pub use types::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result, Row, Transaction};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_seatwatch.sql");

/// Upper bound on bound parameters per `IN (...)` list.
const MAX_IN_LIST: usize = 500;

const SECTION_COLUMNS: &str = "section_id, course_code, section_number, capacity, enrolled, status,
     faculty, lab_faculty, exam_date, prerequisites, last_updated";

const TRACKING_COLUMNS: &str = "tracking_id, user_id, section_id, active, notify_interval_minutes,
     last_notified_at, created_at";

pub struct SeatStore {
    db: Mutex<Connection>,
}

impl SeatStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::init(conn)
    }

    /// Opens a private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // A panic while holding the lock cannot leave a half-applied statement
    // behind (transactions roll back on drop), so the poison is ignored.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn().execute_batch(sql)
    }

    // ---------------------------------------------------------------------
    // Courses
    // ---------------------------------------------------------------------

    /// Inserts a course, or refreshes its title and department.
    pub fn upsert_course(&self, course: &DbCourse) -> Result<()> {
        self.conn().execute(
            "INSERT INTO courses (code, title, department, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (code) DO UPDATE SET
                title = excluded.title,
                department = excluded.department,
                updated_at = excluded.updated_at",
            params![course.code, course.title, course.department, Utc::now()],
        )?;
        Ok(())
    }

    pub fn count_courses(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
    }

    // ---------------------------------------------------------------------
    // Sections
    // ---------------------------------------------------------------------

    /// Upserts a batch of sections in one transaction.
    ///
    /// Each row gets its own savepoint, so one bad row is reported in its
    /// slot of the returned vector without rolling back its siblings.
    pub fn upsert_sections(&self, rows: &[NewSection]) -> Result<Vec<Result<()>>> {
        let now = Utc::now();
        let mut db = self.conn();
        let mut tx = db.transaction()?;

        let results = rows
            .iter()
            .map(|row| upsert_section_row(&mut tx, row, now))
            .collect();

        tx.commit()?;
        Ok(results)
    }

    pub fn get_section(&self, section_id: &str) -> Result<Option<DbSection>> {
        self.conn()
            .query_row(
                &format!("SELECT {SECTION_COLUMNS} FROM sections WHERE section_id = ?"),
                [section_id],
                section_from_row,
            )
            .optional()
    }

    /// Seat state and slot count of every stored section.
    pub fn seat_records(&self) -> Result<Vec<SeatRecord>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT s.section_id, s.enrolled, s.capacity, COUNT(sl.slot_id)
             FROM sections s
             LEFT JOIN slots sl ON sl.section_id = s.section_id
             GROUP BY s.section_id",
        )?;

        let records = stmt.query_map([], |row| {
            let slot_count: i64 = row.get(3)?;
            Ok(SeatRecord {
                section_id: row.get(0)?,
                enrolled: row.get(1)?,
                capacity: row.get(2)?,
                slot_count: usize::try_from(slot_count).unwrap_or_default(),
            })
        })?;

        records.collect()
    }

    /// Returns (section count, total available seats) over stored sections.
    pub fn seat_totals(&self) -> Result<(i64, i64)> {
        self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(MAX(capacity - enrolled, 0)), 0) FROM sections",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    // ---------------------------------------------------------------------
    // Slots
    // ---------------------------------------------------------------------

    /// Deletes every slot of the given sections. Returns the number removed.
    pub fn delete_slots_for_sections(&self, section_ids: &[String]) -> Result<usize> {
        if section_ids.is_empty() {
            return Ok(0);
        }

        let mut db = self.conn();
        let tx = db.transaction()?;
        let mut deleted = 0;
        for chunk in section_ids.chunks(MAX_IN_LIST) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            deleted += tx.execute(
                &format!("DELETE FROM slots WHERE section_id IN ({placeholders})"),
                params_from_iter(chunk),
            )?;
        }
        tx.commit()?;

        Ok(deleted)
    }

    /// Inserts slots in one transaction, skipping ones already stored.
    /// Returns the number actually inserted.
    pub fn insert_slots(&self, slots: &[NewSlot]) -> Result<usize> {
        if slots.is_empty() {
            return Ok(0);
        }

        let mut db = self.conn();
        let tx = db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO slots
                    (section_id, day, start_time, end_time, room, building, slot_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for new_slot in slots {
                let slot = &new_slot.slot;
                inserted += stmt.execute(params![
                    new_slot.section_id,
                    slot.day.as_str(),
                    slot.start_time,
                    slot.end_time,
                    slot.room,
                    slot.building,
                    slot.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;

        debug!("Inserted {inserted} of {} slots", slots.len());
        Ok(inserted)
    }

    /// Gets all slots for a specific section ID
    pub fn slots_for_section(&self, section_id: &str) -> Result<Vec<DbSlot>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT slot_id, section_id, day, start_time, end_time, room, building, slot_type
             FROM slots
             WHERE section_id = ?
             ORDER BY slot_id",
        )?;

        let slots = stmt.query_map([section_id], |row| {
            Ok(DbSlot {
                slot_id: row.get(0)?,
                section_id: row.get(1)?,
                day: row.get(2)?,
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                room: row.get(5)?,
                building: row.get(6)?,
                slot_type: row.get(7)?,
            })
        })?;

        slots.collect()
    }

    // ---------------------------------------------------------------------
    // Users and tracking
    // ---------------------------------------------------------------------

    pub fn upsert_user(&self, user_id: &str, email: Option<&str>) -> Result<DbUser> {
        self.conn().execute(
            "INSERT INTO users (user_id, email, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET email = excluded.email",
            params![user_id, email, Utc::now()],
        )?;

        Ok(DbUser {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<DbUser>> {
        self.conn()
            .query_row(
                "SELECT user_id, email FROM users WHERE user_id = ?",
                [user_id],
                |row| {
                    Ok(DbUser {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    /// Creates the (user, section) tracking, or reactivates an existing one.
    pub fn upsert_tracking(
        &self,
        user_id: &str,
        section_id: &str,
        default_interval_minutes: u32,
    ) -> Result<DbTracking> {
        let db = self.conn();
        db.execute(
            "INSERT INTO trackings (user_id, section_id, active, notify_interval_minutes, created_at)
             VALUES (?1, ?2, 1, ?3, ?4)
             ON CONFLICT (user_id, section_id) DO UPDATE SET active = 1",
            params![user_id, section_id, default_interval_minutes, Utc::now()],
        )?;

        db.query_row(
            &format!("SELECT {TRACKING_COLUMNS} FROM trackings WHERE user_id = ?1 AND section_id = ?2"),
            [user_id, section_id],
            tracking_from_row,
        )
    }

    pub fn get_tracking(&self, user_id: &str, section_id: &str) -> Result<Option<DbTracking>> {
        self.conn()
            .query_row(
                &format!("SELECT {TRACKING_COLUMNS} FROM trackings WHERE user_id = ?1 AND section_id = ?2"),
                [user_id, section_id],
                tracking_from_row,
            )
            .optional()
    }

    /// Removes a tracking. Returns false if there was none.
    pub fn delete_tracking(&self, user_id: &str, section_id: &str) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM trackings WHERE user_id = ?1 AND section_id = ?2",
            [user_id, section_id],
        )?;
        Ok(deleted > 0)
    }

    /// Sets the reminder interval. Returns false if the tracking does not exist.
    pub fn set_notify_interval(&self, user_id: &str, section_id: &str, minutes: u32) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE trackings SET notify_interval_minutes = ?3 WHERE user_id = ?1 AND section_id = ?2",
            params![user_id, section_id, minutes],
        )?;
        Ok(updated > 0)
    }

    /// Marks a tracking as notified at `at`.
    ///
    /// Returns false, without error, when the tracking was deleted in the
    /// meantime.
    pub fn touch_last_notified(&self, tracking_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE trackings SET last_notified_at = ?2 WHERE tracking_id = ?1",
            params![tracking_id, at],
        )?;
        Ok(updated > 0)
    }

    /// Active trackers of one section.
    pub fn trackers_for_section(&self, section_id: &str) -> Result<Vec<Tracker>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT t.tracking_id, t.user_id, u.email, t.notify_interval_minutes, t.last_notified_at
             FROM trackings t
             JOIN users u ON u.user_id = t.user_id
             WHERE t.section_id = ? AND t.active = 1
             ORDER BY t.tracking_id",
        )?;

        let trackers = stmt.query_map([section_id], tracker_from_row)?;
        trackers.collect()
    }

    /// Every active tracking with the stored seat state of its section.
    pub fn reminder_candidates(&self) -> Result<Vec<ReminderCandidate>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT t.tracking_id, t.user_id, u.email, t.notify_interval_minutes, t.last_notified_at,
                    s.course_code, s.section_number, s.capacity, s.enrolled
             FROM trackings t
             JOIN users u ON u.user_id = t.user_id
             JOIN sections s ON s.section_id = t.section_id
             WHERE t.active = 1
             ORDER BY t.tracking_id",
        )?;

        let candidates = stmt.query_map([], |row| {
            Ok(ReminderCandidate {
                tracker: tracker_from_row(row)?,
                course_code: row.get(5)?,
                section_number: row.get(6)?,
                capacity: row.get(7)?,
                enrolled: row.get(8)?,
            })
        })?;

        candidates.collect()
    }

    /// Active trackings of a user with their sections.
    pub fn user_trackings(&self, user_id: &str) -> Result<Vec<(DbTracking, DbSection)>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT t.tracking_id, t.user_id, t.section_id, t.active, t.notify_interval_minutes,
                    t.last_notified_at, t.created_at,
                    s.section_id, s.course_code, s.section_number, s.capacity, s.enrolled, s.status,
                    s.faculty, s.lab_faculty, s.exam_date, s.prerequisites, s.last_updated
             FROM trackings t
             JOIN sections s ON s.section_id = t.section_id
             WHERE t.user_id = ? AND t.active = 1
             ORDER BY s.course_code, s.section_number",
        )?;

        let rows = stmt.query_map([user_id], |row| {
            Ok((tracking_from_row(row)?, section_from_row_at(row, 7)?))
        })?;

        rows.collect()
    }

    // ---------------------------------------------------------------------
    // Email log
    // ---------------------------------------------------------------------

    pub fn insert_email_log(&self, log: &NewEmailLog) -> Result<()> {
        self.conn().execute(
            "INSERT INTO email_logs
                (recipient, subject, email_type, status, course_code, section_number, error, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.recipient,
                log.subject,
                log.email_type.as_str(),
                log.status.as_str(),
                log.course_code,
                log.section_number,
                log.error,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Totals over the email log; `today` counts attempts at or after `day_start`.
    pub fn email_stats(&self, day_start: DateTime<Utc>) -> Result<EmailStats> {
        self.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'SENT'), 0),
                    COALESCE(SUM(status = 'FAILED'), 0),
                    COALESCE(SUM(sent_at >= ?1), 0)
             FROM email_logs",
            [day_start],
            |row| {
                Ok(EmailStats {
                    total: row.get(0)?,
                    sent: row.get(1)?,
                    failed: row.get(2)?,
                    today: row.get(3)?,
                })
            },
        )
    }

    // ---------------------------------------------------------------------
    // Statistics row
    // ---------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<Option<DbStats>> {
        self.conn()
            .query_row(
                "SELECT total_courses, total_sections, total_available_seats, last_updated
                 FROM course_stats WHERE id = 1",
                [],
                |row| {
                    Ok(DbStats {
                        total_courses: row.get(0)?,
                        total_sections: row.get(1)?,
                        total_available_seats: row.get(2)?,
                        last_updated: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    pub fn upsert_stats(&self, stats: &DbStats) -> Result<()> {
        self.conn().execute(
            "INSERT INTO course_stats (id, total_courses, total_sections, total_available_seats, last_updated)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                total_courses = excluded.total_courses,
                total_sections = excluded.total_sections,
                total_available_seats = excluded.total_available_seats,
                last_updated = excluded.last_updated",
            params![
                stats.total_courses,
                stats.total_sections,
                stats.total_available_seats,
                stats.last_updated,
            ],
        )?;
        Ok(())
    }
}

fn upsert_section_row(tx: &mut Transaction<'_>, row: &NewSection, now: DateTime<Utc>) -> Result<()> {
    let sp = tx.savepoint()?;
    sp.execute(
        "INSERT INTO sections (section_id, course_code, section_number, capacity, enrolled, status,
                               faculty, lab_faculty, exam_date, prerequisites, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (section_id) DO UPDATE SET
            course_code = excluded.course_code,
            section_number = excluded.section_number,
            capacity = excluded.capacity,
            enrolled = excluded.enrolled,
            status = excluded.status,
            faculty = excluded.faculty,
            lab_faculty = excluded.lab_faculty,
            exam_date = excluded.exam_date,
            prerequisites = excluded.prerequisites,
            last_updated = excluded.last_updated",
        params![
            row.section_id,
            row.course_code,
            row.section_number,
            row.capacity,
            row.enrolled,
            SeatStatus::from_counts(row.enrolled, row.capacity).as_str(),
            row.faculty,
            row.lab_faculty,
            row.exam_date,
            row.prerequisites,
            now,
        ],
    )?;
    sp.commit()
}

fn section_from_row(row: &Row<'_>) -> Result<DbSection> {
    section_from_row_at(row, 0)
}

fn section_from_row_at(row: &Row<'_>, offset: usize) -> Result<DbSection> {
    let status: String = row.get(offset + 5)?;
    Ok(DbSection {
        section_id: row.get(offset)?,
        course_code: row.get(offset + 1)?,
        section_number: row.get(offset + 2)?,
        capacity: row.get(offset + 3)?,
        enrolled: row.get(offset + 4)?,
        status: if status == "CLOSED" {
            SeatStatus::Closed
        } else {
            SeatStatus::Open
        },
        faculty: row.get(offset + 6)?,
        lab_faculty: row.get(offset + 7)?,
        exam_date: row.get(offset + 8)?,
        prerequisites: row.get(offset + 9)?,
        last_updated: row.get(offset + 10)?,
    })
}

fn tracking_from_row(row: &Row<'_>) -> Result<DbTracking> {
    Ok(DbTracking {
        tracking_id: row.get(0)?,
        user_id: row.get(1)?,
        section_id: row.get(2)?,
        active: row.get(3)?,
        notify_interval_minutes: row.get(4)?,
        last_notified_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn tracker_from_row(row: &Row<'_>) -> Result<Tracker> {
    Ok(Tracker {
        tracking_id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        notify_interval_minutes: row.get(3)?,
        last_notified_at: row.get(4)?,
    })
}
