//! Storage layer for day timeline reconstruction.
//!
//! Provides persistence for raw signals, persisted slots and smart guesses
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The pipeline shares one connection through [`SharedDatabase`], which
//! serializes access with a `Mutex` and implements the collaborator traits
//! from `dt-core`.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond
//! precision (e.g., `2024-01-15T10:30:00.000Z`). This ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Slots
//!
//! `time_slots` stores only the start, category and user flag of each slot.
//! The end of a slot is the start of the next one and is derived on read.

mod store;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use dt_core::{
    Category, CommitPlan, ConfidenceTier, Location, MotionType, PurgePlan, PurgeStats,
    RawMotionSample, SmartGuess, TimeSlot, TrackAction, TrackEvent, ValidationError,
};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

pub use store::SharedDatabase;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {record}: {timestamp}")]
    TimestampParse {
        record: &'static str,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value could not be turned back into a domain value.
    #[error("invalid {record}: {message}")]
    InvalidRecord {
        record: &'static str,
        message: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts per table, for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub motion_samples: usize,
    pub location_fixes: usize,
    pub track_events: usize,
    pub time_slots: usize,
    pub smart_guesses: usize,
}

const MOTION_ACCESS_KEY: &str = "motion_access";
const MOTION_AUTHORIZED_KEY: &str = "motion_authorized";

/// Meters per degree of latitude, used for the guess bounding box.
const METERS_PER_DEGREE: f64 = 111_320.0;

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Raw classifier output, consumed by the segmenter
            CREATE TABLE IF NOT EXISTS motion_samples (
                timestamp TEXT PRIMARY KEY,
                motion TEXT NOT NULL,
                confidence TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS location_fixes (
                timestamp TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                accuracy_m REAL
            );

            CREATE TABLE IF NOT EXISTS track_events (
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                category TEXT NOT NULL,
                PRIMARY KEY (timestamp, action)
            );

            -- Persisted slots: no end column, the end is the next start
            CREATE TABLE IF NOT EXISTS time_slots (
                start TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                set_by_user INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS smart_guesses (
                id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                learned_at TEXT NOT NULL,
                category TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                strikes INTEGER NOT NULL DEFAULT 0,
                struck_at TEXT,
                last_used_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_smart_guesses_position ON smart_guesses(latitude, longitude);
            CREATE INDEX IF NOT EXISTS idx_smart_guesses_last_used ON smart_guesses(last_used_at);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ========== Raw signals ==========

    /// Inserts motion samples, ignoring duplicates by timestamp.
    pub fn insert_motion_samples(&mut self, samples: &[RawMotionSample]) -> Result<usize, DbError> {
        if samples.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO motion_samples (timestamp, motion, confidence) VALUES (?, ?, ?)",
            )?;
            for sample in samples {
                inserted += stmt.execute(params![
                    format_timestamp(sample.timestamp),
                    sample.motion.as_str(),
                    sample.confidence.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists motion samples with `start <= timestamp <= end`, oldest first.
    pub fn motion_samples_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawMotionSample>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT timestamp, motion, confidence
            FROM motion_samples
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(start), format_timestamp(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut samples = Vec::new();
        for row in rows {
            let (timestamp, motion, confidence) = row?;
            samples.push(RawMotionSample {
                timestamp: parse_timestamp(&timestamp, "motion sample")?,
                motion: parse_name::<MotionType>(&motion, "motion sample")?,
                confidence: parse_name::<ConfidenceTier>(&confidence, "motion sample")?,
            });
        }
        Ok(samples)
    }

    /// Inserts location fixes, ignoring duplicates by timestamp.
    pub fn insert_location_fixes(&mut self, fixes: &[Location]) -> Result<usize, DbError> {
        if fixes.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO location_fixes (timestamp, latitude, longitude, accuracy_m)
                VALUES (?, ?, ?, ?)
                ",
            )?;
            for fix in fixes {
                inserted += stmt.execute(params![
                    format_timestamp(fix.timestamp),
                    fix.latitude,
                    fix.longitude,
                    fix.accuracy_m,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists location fixes with `start <= timestamp <= end`, oldest first.
    pub fn location_fixes_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Location>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT timestamp, latitude, longitude, accuracy_m
            FROM location_fixes
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(start), format_timestamp(end)], |row| {
            Ok(LocationRow {
                timestamp: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                accuracy_m: row.get(3)?,
            })
        })?;
        let mut fixes = Vec::new();
        for row in rows {
            fixes.push(row?.into_location()?);
        }
        Ok(fixes)
    }

    /// Returns the newest fix strictly before `before`.
    pub fn last_location_before(&self, before: DateTime<Utc>) -> Result<Option<Location>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT timestamp, latitude, longitude, accuracy_m
                FROM location_fixes
                WHERE timestamp < ?
                ORDER BY timestamp DESC
                LIMIT 1
                ",
                [format_timestamp(before)],
                |row| {
                    Ok(LocationRow {
                        timestamp: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                        accuracy_m: row.get(3)?,
                    })
                },
            )
            .optional()?;
        row.map(LocationRow::into_location).transpose()
    }

    /// Inserts user track events, ignoring duplicates by timestamp and action.
    pub fn insert_track_events(&mut self, events: &[TrackEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO track_events (timestamp, action, category) VALUES (?, ?, ?)",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    format_timestamp(event.timestamp),
                    event.action.as_str(),
                    event.category.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists track events with `start <= timestamp <= end`, oldest first.
    pub fn track_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TrackEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT timestamp, action, category
            FROM track_events
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, action ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(start), format_timestamp(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (timestamp, action, category) = row?;
            events.push(TrackEvent {
                timestamp: parse_timestamp(&timestamp, "track event")?,
                action: parse_name::<TrackAction>(&action, "track event")?,
                category: parse_name::<Category>(&category, "track event")?,
            });
        }
        Ok(events)
    }

    // ========== Slots ==========

    /// Lists stored slots with `start <= slot.start < end`, oldest first.
    pub fn slots_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT start, category, set_by_user
            FROM time_slots
            WHERE start >= ? AND start < ?
            ORDER BY start ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(start), format_timestamp(end)], SlotRow::from_row)?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.into_slot()?);
        }
        Ok(slots)
    }

    /// Lists every stored slot, oldest first.
    pub fn list_slots(&self) -> Result<Vec<TimeSlot>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT start, category, set_by_user FROM time_slots ORDER BY start ASC")?;
        let rows = stmt.query_map([], SlotRow::from_row)?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.into_slot()?);
        }
        Ok(slots)
    }

    /// Returns the stored slot with the greatest start.
    pub fn latest_slot(&self) -> Result<Option<TimeSlot>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT start, category, set_by_user FROM time_slots ORDER BY start DESC LIMIT 1",
                [],
                SlotRow::from_row,
            )
            .optional()?;
        row.map(SlotRow::into_slot).transpose()
    }

    /// Applies a run's writes in one transaction.
    pub fn commit(&mut self, plan: &CommitPlan) -> Result<(), DbError> {
        if plan.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut slot_stmt = tx.prepare(
                "
                INSERT INTO time_slots (start, category, set_by_user)
                VALUES (?, ?, ?)
                ON CONFLICT(start) DO UPDATE SET
                    category = excluded.category,
                    set_by_user = excluded.set_by_user
                ",
            )?;
            for slot in plan.changed_slots() {
                slot_stmt.execute(params![
                    format_timestamp(slot.start),
                    slot.category.as_str(),
                    slot.set_by_user,
                ])?;
            }
        }
        {
            let mut guess_stmt = tx.prepare(
                "
                INSERT INTO smart_guesses
                (id, latitude, longitude, learned_at, category, usage_count, strikes, struck_at, last_used_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    usage_count = excluded.usage_count,
                    strikes = excluded.strikes,
                    struck_at = excluded.struck_at,
                    last_used_at = excluded.last_used_at
                ",
            )?;
            for guess in &plan.guesses {
                guess_stmt.execute(params![
                    guess.id,
                    guess.location.latitude,
                    guess.location.longitude,
                    format_timestamp(guess.location.timestamp),
                    guess.category.as_str(),
                    guess.usage_count,
                    guess.strikes,
                    guess.struck_at.map(format_timestamp),
                    format_timestamp(guess.last_used_at),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            slots = plan.changed_slots().len(),
            guesses = plan.guesses.len(),
            "committed run"
        );
        Ok(())
    }

    // ========== Smart guesses ==========

    /// Lists all guesses, most recently used first.
    pub fn list_guesses(&self) -> Result<Vec<SmartGuess>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, latitude, longitude, learned_at, category, usage_count, strikes, struck_at, last_used_at
            FROM smart_guesses
            ORDER BY last_used_at DESC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], GuessRow::from_row)?;
        let mut guesses = Vec::new();
        for row in rows {
            guesses.push(row?.into_guess()?);
        }
        Ok(guesses)
    }

    /// Lists guesses whose centroid is within `radius_m` of `location`.
    ///
    /// A bounding box narrows the query; the exact distance is checked after.
    pub fn guesses_near(&self, location: &Location, radius_m: f64) -> Result<Vec<SmartGuess>, DbError> {
        let dlat = radius_m / METERS_PER_DEGREE;
        let cos_lat = location.latitude.to_radians().cos();
        let dlon = if cos_lat > 1e-6 {
            (radius_m / (METERS_PER_DEGREE * cos_lat)).min(180.0)
        } else {
            180.0
        };

        let mut stmt = self.conn.prepare(
            "
            SELECT id, latitude, longitude, learned_at, category, usage_count, strikes, struck_at, last_used_at
            FROM smart_guesses
            WHERE latitude BETWEEN ? AND ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![location.latitude - dlat, location.latitude + dlat],
            GuessRow::from_row,
        )?;
        let mut guesses = Vec::new();
        for row in rows {
            let guess = row?.into_guess()?;
            let lon_delta = (guess.location.longitude - location.longitude).abs();
            let lon_delta = lon_delta.min(360.0 - lon_delta);
            if lon_delta <= dlon && guess.location.distance_m(location) <= radius_m {
                guesses.push(guess);
            }
        }
        Ok(guesses)
    }

    // ========== Cleanup ==========

    /// Deletes consumed raw data and expired guesses.
    ///
    /// The newest fix before `keep_fix_before` is never deleted.
    pub fn purge(&mut self, plan: &PurgePlan) -> Result<PurgeStats, DbError> {
        let tx = self.conn.transaction()?;
        let mut stats = PurgeStats::default();
        if let Some(before) = plan.raw_before {
            let before = format_timestamp(before);
            stats.motion_samples =
                tx.execute("DELETE FROM motion_samples WHERE timestamp < ?", [&before])?;
            stats.location_fixes = match plan.keep_fix_before {
                Some(keep) => tx.execute(
                    "DELETE FROM location_fixes WHERE timestamp < ?1
                     AND timestamp IS NOT
                        (SELECT MAX(timestamp) FROM location_fixes WHERE timestamp < ?2)",
                    params![before, format_timestamp(keep)],
                )?,
                None => tx.execute("DELETE FROM location_fixes WHERE timestamp < ?", [&before])?,
            };
            stats.track_events =
                tx.execute("DELETE FROM track_events WHERE timestamp < ?", [&before])?;
        }
        stats.guesses = tx.execute(
            "DELETE FROM smart_guesses WHERE last_used_at < ?",
            [format_timestamp(plan.guesses_unused_since)],
        )?;
        tx.commit()?;
        Ok(stats)
    }

    // ========== Settings ==========

    /// Grants or denies access to motion data.
    pub fn set_motion_access(&mut self, granted: bool) -> Result<(), DbError> {
        self.set_setting(MOTION_ACCESS_KEY, if granted { "granted" } else { "denied" })
    }

    /// Whether motion data may be read. Granted unless explicitly denied.
    pub fn motion_access_granted(&self) -> Result<bool, DbError> {
        Ok(self.setting(MOTION_ACCESS_KEY)?.as_deref() != Some("denied"))
    }

    /// Records the outcome of the latest motion query.
    pub fn set_motion_authorized(&mut self, authorized: bool) -> Result<(), DbError> {
        self.set_setting(MOTION_AUTHORIZED_KEY, if authorized { "true" } else { "false" })
    }

    /// Outcome of the latest motion query, if any query has run.
    pub fn motion_authorized(&self) -> Result<Option<bool>, DbError> {
        Ok(self
            .setting(MOTION_AUTHORIZED_KEY)?
            .map(|value| value == "true"))
    }

    fn setting(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| row.get(0))
            .optional()?)
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Counts rows per table.
    pub fn table_counts(&self) -> Result<TableCounts, DbError> {
        let count = |table: &str| -> Result<usize, DbError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(TableCounts {
            motion_samples: count("motion_samples")?,
            location_fixes: count("location_fixes")?,
            track_events: count("track_events")?,
            time_slots: count("time_slots")?,
            smart_guesses: count("smart_guesses")?,
        })
    }
}

#[derive(Debug)]
struct LocationRow {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    accuracy_m: Option<f64>,
}

impl LocationRow {
    fn into_location(self) -> Result<Location, DbError> {
        let timestamp = parse_timestamp(&self.timestamp, "location fix")?;
        let location = Location::new(timestamp, self.latitude, self.longitude)
            .map_err(|err| invalid("location fix", &err))?;
        Ok(match self.accuracy_m {
            Some(accuracy) => location.with_accuracy(accuracy),
            None => location,
        })
    }
}

#[derive(Debug)]
struct SlotRow {
    start: String,
    category: String,
    set_by_user: bool,
}

impl SlotRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            start: row.get(0)?,
            category: row.get(1)?,
            set_by_user: row.get(2)?,
        })
    }

    fn into_slot(self) -> Result<TimeSlot, DbError> {
        Ok(TimeSlot {
            start: parse_timestamp(&self.start, "time slot")?,
            category: parse_name::<Category>(&self.category, "time slot")?,
            set_by_user: self.set_by_user,
        })
    }
}

#[derive(Debug)]
struct GuessRow {
    id: String,
    latitude: f64,
    longitude: f64,
    learned_at: String,
    category: String,
    usage_count: u32,
    strikes: u32,
    struck_at: Option<String>,
    last_used_at: String,
}

impl GuessRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            learned_at: row.get(3)?,
            category: row.get(4)?,
            usage_count: row.get(5)?,
            strikes: row.get(6)?,
            struck_at: row.get(7)?,
            last_used_at: row.get(8)?,
        })
    }

    fn into_guess(self) -> Result<SmartGuess, DbError> {
        let learned_at = parse_timestamp(&self.learned_at, "smart guess")?;
        let location = Location::new(learned_at, self.latitude, self.longitude)
            .map_err(|err| invalid("smart guess", &err))?;
        Ok(SmartGuess {
            id: self.id,
            location,
            category: parse_name::<Category>(&self.category, "smart guess")?,
            usage_count: self.usage_count,
            strikes: self.strikes,
            struck_at: self
                .struck_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "smart guess"))
                .transpose()?,
            last_used_at: parse_timestamp(&self.last_used_at, "smart guess")?,
        })
    }
}

fn parse_timestamp(timestamp: &str, record: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_name<T>(value: &str, record: &'static str) -> Result<T, DbError>
where
    T: std::str::FromStr<Err = ValidationError>,
{
    value.parse().map_err(|err| invalid(record, &err))
}

fn invalid(record: &'static str, err: &ValidationError) -> DbError {
    DbError::InvalidRecord {
        record,
        message: err.to_string(),
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
