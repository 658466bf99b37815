//! SQLite persistence: activity accounting and runtime settings.
//!
//! Activity is written as deltas. Deltas landing within a five-minute window
//! of the most recent record merge into it instead of creating a new row, so
//! a steady session produces a handful of rows rather than one per flush.
//! Timestamps are stored as fixed-width RFC 3339 UTC strings, which sort
//! correctly as text.

use crate::config::{MonitorSettings, SettingsError};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Deltas this close to the latest record merge into it.
pub const SESSION_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One increment of activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityDelta {
    pub eye_alerts: u32,
    pub posture_alerts: u32,
    pub breaks_taken: u32,
    pub keyboard_activity: u32,
    pub mouse_activity: u32,
    pub low_light_alerts: u32,
    pub session_duration_secs: u32,
}

impl ActivityDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Fold another delta into this one.
    pub fn merge(&mut self, other: &ActivityDelta) {
        self.eye_alerts += other.eye_alerts;
        self.posture_alerts += other.posture_alerts;
        self.breaks_taken += other.breaks_taken;
        self.keyboard_activity += other.keyboard_activity;
        self.mouse_activity += other.mouse_activity;
        self.low_light_alerts += other.low_light_alerts;
        self.session_duration_secs += other.session_duration_secs;
    }

    pub fn eye_alert() -> Self {
        Self {
            eye_alerts: 1,
            ..Self::default()
        }
    }

    pub fn posture_alert() -> Self {
        Self {
            posture_alerts: 1,
            ..Self::default()
        }
    }

    pub fn break_taken() -> Self {
        Self {
            breaks_taken: 1,
            ..Self::default()
        }
    }

    pub fn low_light() -> Self {
        Self {
            low_light_alerts: 1,
            ..Self::default()
        }
    }

    pub fn keyboard(count: u32) -> Self {
        Self {
            keyboard_activity: count,
            ..Self::default()
        }
    }

    pub fn mouse(count: u32) -> Self {
        Self {
            mouse_activity: count,
            ..Self::default()
        }
    }

    pub fn session(secs: u32) -> Self {
        Self {
            session_duration_secs: secs,
            ..Self::default()
        }
    }
}

/// Summed activity over a time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ActivityTotals {
    pub eye_alerts: u64,
    pub posture_alerts: u64,
    pub breaks_taken: u64,
    pub keyboard_activity: u64,
    pub mouse_activity: u64,
    pub low_light_alerts: u64,
    pub session_duration_secs: u64,
}

/// Handle on the database. Owned by the engine thread; all access is
/// single-threaded.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// An in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                eye_alerts INTEGER NOT NULL DEFAULT 0,
                posture_alerts INTEGER NOT NULL DEFAULT 0,
                breaks_taken INTEGER NOT NULL DEFAULT 0,
                keyboard_activity INTEGER NOT NULL DEFAULT 0,
                mouse_activity INTEGER NOT NULL DEFAULT 0,
                low_light_alerts INTEGER NOT NULL DEFAULT 0,
                session_duration INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_activity_timestamp
                ON activity (timestamp);
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Record a delta, merging into the latest record when it falls within
    /// the session window. A zero delta is a no-op.
    ///
    /// The lookup and the write run inside one transaction, so each flush
    /// is a single atomic upsert.
    pub fn log_activity(&self, delta: &ActivityDelta, now: DateTime<Utc>) -> Result<(), StoreError> {
        if delta.is_zero() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        let cutoff = format_ts(now - Duration::minutes(SESSION_WINDOW_MINUTES));
        let recent: Option<i64> = tx
            .query_row(
                "SELECT id FROM activity WHERE timestamp >= ?1
                 ORDER BY timestamp DESC LIMIT 1",
                params![cutoff],
                |row| row.get(0),
            )
            .optional()?;

        match recent {
            Some(id) => {
                tx.execute(
                    "UPDATE activity SET
                        eye_alerts = eye_alerts + ?1,
                        posture_alerts = posture_alerts + ?2,
                        breaks_taken = breaks_taken + ?3,
                        keyboard_activity = keyboard_activity + ?4,
                        mouse_activity = mouse_activity + ?5,
                        low_light_alerts = low_light_alerts + ?6,
                        session_duration = session_duration + ?7
                     WHERE id = ?8",
                    params![
                        delta.eye_alerts,
                        delta.posture_alerts,
                        delta.breaks_taken,
                        delta.keyboard_activity,
                        delta.mouse_activity,
                        delta.low_light_alerts,
                        delta.session_duration_secs,
                        id,
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO activity (
                        timestamp, eye_alerts, posture_alerts, breaks_taken,
                        keyboard_activity, mouse_activity, low_light_alerts,
                        session_duration
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        format_ts(now),
                        delta.eye_alerts,
                        delta.posture_alerts,
                        delta.breaks_taken,
                        delta.keyboard_activity,
                        delta.mouse_activity,
                        delta.low_light_alerts,
                        delta.session_duration_secs,
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Sum all activity recorded at or after `since`.
    pub fn totals_since(&self, since: DateTime<Utc>) -> Result<ActivityTotals, StoreError> {
        let totals = self.conn.query_row(
            "SELECT
                COALESCE(SUM(eye_alerts), 0),
                COALESCE(SUM(posture_alerts), 0),
                COALESCE(SUM(breaks_taken), 0),
                COALESCE(SUM(keyboard_activity), 0),
                COALESCE(SUM(mouse_activity), 0),
                COALESCE(SUM(low_light_alerts), 0),
                COALESCE(SUM(session_duration), 0)
             FROM activity WHERE timestamp >= ?1",
            params![format_ts(since)],
            |row| {
                Ok(ActivityTotals {
                    eye_alerts: row.get::<_, i64>(0)? as u64,
                    posture_alerts: row.get::<_, i64>(1)? as u64,
                    breaks_taken: row.get::<_, i64>(2)? as u64,
                    keyboard_activity: row.get::<_, i64>(3)? as u64,
                    mouse_activity: row.get::<_, i64>(4)? as u64,
                    low_light_alerts: row.get::<_, i64>(5)? as u64,
                    session_duration_secs: row.get::<_, i64>(6)? as u64,
                })
            },
        )?;
        Ok(totals)
    }

    /// Load settings, seeding defaults for any names not yet stored.
    ///
    /// An unparseable stored value is logged and skipped; the default for
    /// that name remains in effect.
    pub fn load_settings(&self) -> Result<MonitorSettings, StoreError> {
        let defaults = MonitorSettings::default();
        for name in MonitorSettings::NAMES {
            if let Some(value) = defaults.get(name) {
                self.conn.execute(
                    "INSERT OR IGNORE INTO settings (name, value) VALUES (?1, ?2)",
                    params![name, value],
                )?;
            }
        }

        let mut settings = MonitorSettings::default();
        let mut stmt = self.conn.prepare("SELECT name, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (name, value) = row?;
            if let Err(err) = settings.apply(&name, &value) {
                warn!("ignoring stored setting {name}={value}: {err}");
            }
        }
        Ok(settings)
    }

    /// Persist the full settings struct. Validated first.
    pub fn save_settings(&self, settings: &MonitorSettings) -> Result<(), StoreError> {
        settings.validate()?;
        for name in MonitorSettings::NAMES {
            if let Some(value) = settings.get(name) {
                self.conn.execute(
                    "INSERT INTO settings (name, value) VALUES (?1, ?2)
                     ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                    params![name, value],
                )?;
            }
        }
        Ok(())
    }

    /// Validated single-setting update. Returns the settings now in effect.
    pub fn update_setting(&self, name: &str, value: &str) -> Result<MonitorSettings, StoreError> {
        let mut settings = self.load_settings()?;
        settings.apply(name, value)?;
        self.save_settings(&settings)?;
        Ok(settings)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
