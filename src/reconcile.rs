//! Reconciliation: raw extraction output to durable, deduplicated records.
//!
//! Normalization repairs mojibake and parses the portal's day-first dates;
//! persistence upserts on the natural key; freshness is derived in memory
//! against the watermark and never stored.

use chrono::{NaiveDateTime, NaiveTime};
use tracing::{info, warn};

use crate::models::{RawTender, TenderRecord, NOT_SPECIFIED};
use crate::repository::{TenderStore, UpsertReport, WatermarkStore};
use crate::utils::force_utf8;

/// Result of one reconciliation pass.
#[derive(Debug)]
pub struct Reconciliation {
    /// Every durable record after the pass, freshness flags applied.
    pub snapshot: Vec<TenderRecord>,
    /// Records in this batch posted after the previous run's watermark.
    pub new_count: u64,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Parse the portal's day-first date strings. The listing usually carries a
/// bare date; detail values sometimes include a time.
fn parse_day_first(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%d/%m/%Y %H:%M") {
        return Some(dt);
    }
    chrono::NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn clean_text(value: &str) -> String {
    let repaired = force_utf8(value);
    let trimmed = repaired.trim();
    if trimmed.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize one raw tender into its durable form. Total: unparsable dates
/// become `None`, empty text becomes the sentinel.
pub fn normalize(raw: &RawTender) -> TenderRecord {
    TenderRecord {
        organisme: clean_text(&raw.organisme),
        date_poste: parse_day_first(&raw.date_poste),
        type_offre: clean_text(&raw.type_offre),
        ville: clean_text(&raw.ville),
        numero_ordre: clean_text(&raw.numero_ordre),
        numero_ao: clean_text(&raw.numero_ao),
        date_limite: parse_day_first(&raw.date_limite),
        caution: raw.caution,
        estimation: raw.estimation,
        description: clean_text(&raw.description),
        marche: NOT_SPECIFIED.to_string(),
        is_new: false,
    }
}

/// Whether a record counts as new relative to the previous run.
///
/// Before the first run everything is new. Afterwards only records with a
/// known posting date strictly after the watermark qualify; undated records
/// never do.
pub fn is_new(date_poste: Option<NaiveDateTime>, cutoff: Option<NaiveDateTime>) -> bool {
    match cutoff {
        None => true,
        Some(cutoff) => matches!(date_poste, Some(posted) if posted > cutoff),
    }
}

/// Reconcile a scraped batch into the store and return the full annotated
/// snapshot. Does not advance the watermark; the caller records the run
/// once the batch is durable.
pub fn reconcile(
    store: &TenderStore,
    watermarks: &WatermarkStore,
    raw: &[RawTender],
) -> Result<Reconciliation, rusqlite::Error> {
    let cutoff = watermarks.last_scraping()?;
    let records: Vec<TenderRecord> = raw.iter().map(normalize).collect();

    let new_count = records
        .iter()
        .filter(|r| is_new(r.date_poste, cutoff))
        .count() as u64;

    let UpsertReport {
        inserted,
        updated,
        failed,
    } = store.upsert_all(&records)?;
    if failed > 0 {
        warn!(failed, "some scraped rows could not be persisted");
    }
    info!(inserted, updated, new_count, "reconciliation pass complete");

    let mut snapshot = store.load_all()?;
    for record in &mut snapshot {
        record.is_new = is_new(record.date_poste, cutoff);
    }

    Ok(Reconciliation {
        snapshot,
        new_count,
        inserted,
        updated,
        failed,
    })
}

/// Load the durable snapshot with freshness flags relative to the current
/// watermark, without scraping.
pub fn load_last_snapshot(
    store: &TenderStore,
    watermarks: &WatermarkStore,
) -> Result<Vec<TenderRecord>, rusqlite::Error> {
    let cutoff = watermarks.last_scraping()?;
    let mut snapshot = store.load_all()?;
    for record in &mut snapshot {
        record.is_new = is_new(record.date_poste, cutoff);
    }
    Ok(snapshot)
}
