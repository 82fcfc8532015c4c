//! Schedule store: the single-row `scraping_config` table.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::Result;

/// Scheduler configuration. `scraping_time` is a local wall-clock time in
/// `HH:MM` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub scraping_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scraping_time: "08:00".to_string(),
        }
    }
}

/// SQLite-backed scheduler configuration, always exactly one logical row.
pub struct ScheduleStore {
    db_path: PathBuf,
}

impl ScheduleStore {
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
            CREATE TABLE IF NOT EXISTS scraping_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled       INTEGER NOT NULL DEFAULT 0,
                scraping_time TEXT NOT NULL DEFAULT '08:00'
            );
        "#,
        )?;
        Ok(())
    }

    /// Current configuration, defaults when none was ever stored.
    pub fn get(&self) -> Result<ScheduleConfig> {
        let conn = self.connect()?;
        let row: Option<ScheduleConfig> = conn
            .query_row(
                "SELECT enabled, scraping_time FROM scraping_config WHERE id = 1",
                [],
                |row| {
                    Ok(ScheduleConfig {
                        enabled: row.get::<_, i64>(0)? != 0,
                        scraping_time: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_default())
    }

    /// Persist the configuration, creating the row on first use.
    pub fn set(&self, config: &ScheduleConfig) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE scraping_config SET enabled = ?1, scraping_time = ?2 WHERE id = 1",
            params![config.enabled as i64, config.scraping_time],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO scraping_config (id, enabled, scraping_time) VALUES (1, ?1, ?2)",
                params![config.enabled as i64, config.scraping_time],
            )?;
        }
        Ok(())
    }
}
