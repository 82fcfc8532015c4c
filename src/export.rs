//! CSV export of the tender snapshot.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::models::{TenderRecord, NOT_SPECIFIED};

const HEADERS: [&str; 12] = [
    "Organisme",
    "Date de Poste",
    "Type d'AO",
    "Ville",
    "Numéro d'ordre",
    "Numéro AO",
    "Date Limite",
    "Caution",
    "Estimation",
    "Description",
    "Marché",
    "Nouveau",
];

/// Derive the market status from the submission deadline: still open while
/// the deadline lies in the future, expired otherwise. An unknown deadline
/// counts as expired.
pub fn market_status(date_limite: Option<NaiveDateTime>, now: NaiveDateTime) -> &'static str {
    match date_limite {
        Some(deadline) if deadline > now => "En Cours",
        _ => "Dépassé",
    }
}

fn format_date(value: Option<NaiveDateTime>) -> String {
    match value {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => NOT_SPECIFIED.to_string(),
    }
}

fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => NOT_SPECIFIED.to_string(),
    }
}

/// Write the snapshot as CSV to any writer.
pub fn write_csv<W: Write>(writer: W, records: &[TenderRecord]) -> Result<()> {
    let now = Local::now().naive_local();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADERS)?;

    for record in records {
        let date_poste = format_date(record.date_poste);
        let date_limite = format_date(record.date_limite);
        let caution = format_amount(record.caution);
        let estimation = format_amount(record.estimation);
        csv.write_record([
            record.organisme.as_str(),
            date_poste.as_str(),
            record.type_offre.as_str(),
            record.ville.as_str(),
            record.numero_ordre.as_str(),
            record.numero_ao.as_str(),
            date_limite.as_str(),
            caution.as_str(),
            estimation.as_str(),
            record.description.as_str(),
            // The stored marche value is display-only; the exported column
            // carries the derived status, matching the dashboard view.
            market_status(record.date_limite, now),
            if record.is_new { "Oui" } else { "Non" },
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the snapshot as CSV to a file.
pub fn export_to_file(path: &Path, records: &[TenderRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    write_csv(file, records)?;
    info!(path = %path.display(), rows = records.len(), "exported tender snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_time(chrono::NaiveTime::MIN)
    }

    fn record() -> TenderRecord {
        TenderRecord {
            organisme: "Ministère de l'Équipement".into(),
            date_poste: Some(dt(5)),
            type_offre: "Appel d'offres ouvert".into(),
            ville: "Casablanca".into(),
            numero_ordre: "123".into(),
            numero_ao: "45/2026".into(),
            date_limite: Some(dt(20)),
            caution: Some(10000.0),
            estimation: None,
            description: "Construction d'un pont".into(),
            marche: NOT_SPECIFIED.into(),
            is_new: true,
        }
    }

    #[test]
    fn test_market_status_boundaries() {
        let now = dt(10);
        assert_eq!(market_status(Some(dt(11)), now), "En Cours");
        assert_eq!(market_status(Some(dt(10)), now), "Dépassé");
        assert_eq!(market_status(Some(dt(9)), now), "Dépassé");
        assert_eq!(market_status(None, now), "Dépassé");
    }

    #[test]
    fn test_csv_has_headers_and_day_first_dates() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[record()]).unwrap();
        let out = String::from_utf8(buf).unwrap();

        let mut lines = out.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Organisme,Date de Poste"));
        assert!(header.ends_with("Nouveau"));

        let row = lines.next().unwrap();
        assert!(row.contains("05/03/2026"));
        assert!(row.contains("20/03/2026"));
        assert!(row.contains("10000.00"));
        assert!(row.contains(NOT_SPECIFIED));
        assert!(row.ends_with("Oui"));
    }

    #[test]
    fn test_empty_snapshot_still_writes_headers() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.lines().count(), 1);
    }
}
