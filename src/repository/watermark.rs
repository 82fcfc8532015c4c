//! Watermark store: the append-only `scraping_metadata` run log.
//!
//! Freshness is decided against the most recent entry; the full log is
//! kept as an audit trail of every scrape run.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime_opt, Result};

/// One recorded scrape run.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkEntry {
    pub last_scraping: NaiveDateTime,
    pub new_ao_count: u64,
}

/// SQLite-backed run log.
pub struct WatermarkStore {
    db_path: PathBuf,
}

impl WatermarkStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS scraping_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                last_scraping TEXT NOT NULL,
                new_ao_count  INTEGER NOT NULL DEFAULT 0
            );
        "#,
        )?;
        Ok(())
    }

    /// Timestamp of the most recent completed run, `None` before the first
    /// run ever.
    pub fn last_scraping(&self) -> Result<Option<NaiveDateTime>> {
        let conn = self.connect()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_scraping FROM scraping_metadata ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parse_datetime_opt(raw))
    }

    /// Append a run entry stamped with the current local time.
    pub fn record_run(&self, new_ao_count: u64) -> Result<()> {
        self.record_run_at(Local::now().naive_local(), new_ao_count)
    }

    /// Append a run entry with an explicit timestamp.
    pub fn record_run_at(&self, at: NaiveDateTime, new_ao_count: u64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO scraping_metadata (last_scraping, new_ao_count) VALUES (?1, ?2)",
            params![format_datetime(at), new_ao_count],
        )?;
        Ok(())
    }

    /// All run entries, oldest first.
    pub fn history(&self) -> Result<Vec<WatermarkEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT last_scraping, new_ao_count FROM scraping_metadata ORDER BY id",
        )?;
        let entries = stmt
            .query_map([], |row| {
                let raw: String = row.get(0)?;
                Ok((raw, row.get::<_, u64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries
            .into_iter()
            .filter_map(|(raw, new_ao_count)| {
                parse_datetime_opt(Some(raw)).map(|last_scraping| WatermarkEntry {
                    last_scraping,
                    new_ao_count,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, WatermarkStore) {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_store_has_no_watermark() {
        let (_dir, store) = store();
        assert_eq!(store.last_scraping().unwrap(), None);
        assert!(store.history().unwrap().is_empty());
    }

    #[test]
    fn test_latest_entry_wins() {
        let (_dir, store) = store();
        store.record_run_at(ts(1, 8), 12).unwrap();
        store.record_run_at(ts(2, 8), 0).unwrap();
        store.record_run_at(ts(3, 8), 4).unwrap();

        assert_eq!(store.last_scraping().unwrap(), Some(ts(3, 8)));

        let history = store.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].new_ao_count, 12);
        assert_eq!(history[2].last_scraping, ts(3, 8));
    }

    #[test]
    fn test_record_run_uses_current_time() {
        let (_dir, store) = store();
        let before = Local::now().naive_local() - chrono::Duration::seconds(1);
        store.record_run(7).unwrap();
        let after = Local::now().naive_local() + chrono::Duration::seconds(1);

        let mark = store.last_scraping().unwrap().unwrap();
        assert!(mark >= before && mark <= after);
    }
}
