//! Tender store: the durable `appels_offres` table.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::{format_datetime, parse_datetime_opt, Result};
use crate::models::TenderRecord;

/// Outcome of one row upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
}

/// Per-batch success/failure counts, an explicit return value rather than a
/// log side effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// SQLite-backed tender store.
///
/// Guarantees at most one row per natural key (numero_ordre, date_poste):
/// re-scraping the same tender overwrites its non-key columns in place.
pub struct TenderStore {
    db_path: PathBuf,
}

impl TenderStore {
    /// Create the store, ensuring the schema exists.
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
            CREATE TABLE IF NOT EXISTS appels_offres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organisme     TEXT,
                date_poste    TEXT,
                type_offre    TEXT,
                ville         TEXT,
                numero_ordre  TEXT,
                numero_ao     TEXT,
                date_limite   TEXT,
                caution       REAL,
                estimation    REAL,
                description   TEXT,
                marche        TEXT,
                UNIQUE (numero_ordre, date_poste)
            );
        "#,
        )?;
        Ok(())
    }

    /// Upsert a whole batch inside one transaction. An individual row
    /// failure is logged, counted and skipped; it never aborts the
    /// remaining rows.
    pub fn upsert_all(&self, records: &[TenderRecord]) -> Result<UpsertReport> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let mut report = UpsertReport::default();
        for record in records {
            match Self::upsert_one(&tx, record) {
                Ok(RowOutcome::Inserted) => report.inserted += 1,
                Ok(RowOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!(
                        numero_ordre = %record.numero_ordre,
                        error = %e,
                        "failed to persist tender row; skipping"
                    );
                    report.failed += 1;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// Upsert a single record keyed by (numero_ordre, date_poste).
    pub fn upsert(&self, record: &TenderRecord) -> Result<RowOutcome> {
        let conn = self.connect()?;
        Self::upsert_one(&conn, record)
    }

    fn upsert_one(conn: &Connection, record: &TenderRecord) -> Result<RowOutcome> {
        let date_poste = record.date_poste.map(format_datetime);
        let date_limite = record.date_limite.map(format_datetime);

        // NULL-safe key lookup: the unique index treats NULL date_poste
        // values as distinct, so undated rows must be matched explicitly to
        // stay idempotent across re-scrapes.
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM appels_offres WHERE numero_ordre = ?1 AND date_poste IS ?2",
                params![record.numero_ordre, date_poste],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                conn.execute(
                    r#"
                    UPDATE appels_offres SET
                        organisme   = ?1,
                        type_offre  = ?2,
                        ville       = ?3,
                        numero_ao   = ?4,
                        date_limite = ?5,
                        caution     = ?6,
                        estimation  = ?7,
                        description = ?8,
                        marche      = ?9
                    WHERE id = ?10
                    "#,
                    params![
                        record.organisme,
                        record.type_offre,
                        record.ville,
                        record.numero_ao,
                        date_limite,
                        record.caution,
                        record.estimation,
                        record.description,
                        record.marche,
                        id,
                    ],
                )?;
                Ok(RowOutcome::Updated)
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO appels_offres (
                        organisme, date_poste, type_offre, ville, numero_ordre,
                        numero_ao, date_limite, caution, estimation, description,
                        marche
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    ON CONFLICT (numero_ordre, date_poste)
                    DO UPDATE SET
                        organisme   = excluded.organisme,
                        type_offre  = excluded.type_offre,
                        ville       = excluded.ville,
                        numero_ao   = excluded.numero_ao,
                        date_limite = excluded.date_limite,
                        caution     = excluded.caution,
                        estimation  = excluded.estimation,
                        description = excluded.description,
                        marche      = excluded.marche
                    "#,
                    params![
                        record.organisme,
                        date_poste,
                        record.type_offre,
                        record.ville,
                        record.numero_ordre,
                        record.numero_ao,
                        date_limite,
                        record.caution,
                        record.estimation,
                        record.description,
                        record.marche,
                    ],
                )?;
                Ok(RowOutcome::Inserted)
            }
        }
    }

    /// Load all durable rows in insertion order. `is_new` comes back false;
    /// callers recompute it against the current watermark.
    pub fn load_all(&self) -> Result<Vec<TenderRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT organisme, date_poste, type_offre, ville, numero_ordre,
                   numero_ao, date_limite, caution, estimation, description,
                   marche
            FROM appels_offres ORDER BY id
            "#,
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Number of durable rows.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        conn.query_row("SELECT COUNT(*) FROM appels_offres", [], |row| row.get(0))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TenderRecord> {
    Ok(TenderRecord {
        organisme: row.get("organisme")?,
        date_poste: parse_datetime_opt(row.get("date_poste")?),
        type_offre: row.get("type_offre")?,
        ville: row.get("ville")?,
        numero_ordre: row.get("numero_ordre")?,
        numero_ao: row.get("numero_ao")?,
        date_limite: parse_datetime_opt(row.get("date_limite")?),
        caution: row.get("caution")?,
        estimation: row.get("estimation")?,
        description: row.get("description")?,
        marche: row.get("marche")?,
        is_new: false,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::models::NOT_SPECIFIED;

    fn record(numero_ordre: &str, day: u32) -> TenderRecord {
        TenderRecord {
            organisme: "Organisme".into(),
            date_poste: NaiveDate::from_ymd_opt(2026, 3, day)
                .map(|d| d.and_time(chrono::NaiveTime::MIN)),
            type_offre: "Appel d'offres ouvert".into(),
            ville: "Rabat".into(),
            numero_ordre: numero_ordre.into(),
            numero_ao: "10/2026".into(),
            date_limite: None,
            caution: Some(5000.0),
            estimation: None,
            description: "Travaux divers".into(),
            marche: NOT_SPECIFIED.into(),
            is_new: false,
        }
    }

    fn store() -> (TempDir, TenderStore) {
        let dir = TempDir::new().unwrap();
        let store = TenderStore::new(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_insert_then_conflict_updates_in_place() {
        let (_dir, store) = store();
        assert_eq!(store.upsert(&record("100", 1)).unwrap(), RowOutcome::Inserted);

        let mut changed = record("100", 1);
        changed.ville = "Tanger".into();
        changed.estimation = Some(99.0);
        assert_eq!(store.upsert(&changed).unwrap(), RowOutcome::Updated);

        let rows = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ville, "Tanger");
        assert_eq!(rows[0].estimation, Some(99.0));
    }

    #[test]
    fn test_same_numero_different_date_is_a_new_row() {
        let (_dir, store) = store();
        store.upsert(&record("100", 1)).unwrap();
        store.upsert(&record("100", 2)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_null_date_poste_upsert_stays_idempotent() {
        let (_dir, store) = store();
        let mut undated = record("200", 1);
        undated.date_poste = None;

        assert_eq!(store.upsert(&undated).unwrap(), RowOutcome::Inserted);
        undated.description = "Mise à jour".into();
        assert_eq!(store.upsert(&undated).unwrap(), RowOutcome::Updated);

        let rows = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Mise à jour");
    }

    #[test]
    fn test_upsert_all_counts() {
        let (_dir, store) = store();
        store.upsert(&record("1", 1)).unwrap();

        let batch = vec![record("1", 1), record("2", 1), record("3", 2)];
        let report = store.upsert_all(&batch).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_load_all_round_trips_dates() {
        let (_dir, store) = store();
        let mut r = record("300", 15);
        r.date_limite = NaiveDate::from_ymd_opt(2026, 4, 30)
            .map(|d| d.and_time(chrono::NaiveTime::MIN));
        store.upsert(&r).unwrap();

        let rows = store.load_all().unwrap();
        assert_eq!(rows[0].date_poste, r.date_poste);
        assert_eq!(rows[0].date_limite, r.date_limite);
    }
}
