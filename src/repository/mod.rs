//! Repository layer for SQLite persistence.
//!
//! Each store owns its tables and follows the same shape: a struct holding
//! the database path, a `connect()` per operation, and an idempotent
//! `init_schema` run at construction.

pub mod schedule;
pub mod tender;
pub mod watermark;

pub use schedule::{ScheduleConfig, ScheduleStore};
pub use tender::{RowOutcome, TenderStore, UpsertReport};
pub use watermark::{WatermarkEntry, WatermarkStore};

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::Connection;

/// Repository result type.
pub type Result<T> = std::result::Result<T, rusqlite::Error>;

/// Storage format for timestamps; lexicographic order matches chronological
/// order so SQL-side ordering stays correct.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

pub(crate) fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored timestamp, `None` on absence or corruption.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<NaiveDateTime> {
    s.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok())
}
