//! Tender announcement models.
//!
//! A tender ("appel d'offres") is uniquely identified by its natural key
//! (numero_ordre, date_poste). Re-scraping the same tender updates the
//! existing row rather than duplicating it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Placeholder used for every user-facing text field that could not be
/// extracted from the portal markup. Partial records are kept rather than
/// dropped.
pub const NOT_SPECIFIED: &str = "Non spécifié";

/// A tender announcement as extracted from one listing card, before any
/// normalization. Date fields carry the raw portal text (`DD/MM/YYYY` or the
/// sentinel); numeric fields are already cleaned because the portal renders
/// them with thousands separators and comma decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTender {
    pub organisme: String,
    pub date_poste: String,
    pub type_offre: String,
    pub ville: String,
    pub numero_ordre: String,
    pub numero_ao: String,
    pub date_limite: String,
    pub caution: Option<f64>,
    pub estimation: Option<f64>,
    pub description: String,
}

impl Default for RawTender {
    fn default() -> Self {
        Self {
            organisme: NOT_SPECIFIED.to_string(),
            date_poste: NOT_SPECIFIED.to_string(),
            type_offre: NOT_SPECIFIED.to_string(),
            ville: NOT_SPECIFIED.to_string(),
            numero_ordre: NOT_SPECIFIED.to_string(),
            numero_ao: NOT_SPECIFIED.to_string(),
            date_limite: NOT_SPECIFIED.to_string(),
            caution: None,
            estimation: None,
            description: NOT_SPECIFIED.to_string(),
        }
    }
}

/// A normalized tender record as persisted in the store.
///
/// All fields are always present; semantically optional values are nullable
/// instead of being materialized ad hoc. `is_new` is derived in memory
/// against the scraping watermark and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub organisme: String,
    pub date_poste: Option<NaiveDateTime>,
    pub type_offre: String,
    pub ville: String,
    pub numero_ordre: String,
    pub numero_ao: String,
    pub date_limite: Option<NaiveDateTime>,
    pub caution: Option<f64>,
    pub estimation: Option<f64>,
    pub description: String,
    pub marche: String,
    /// True when this record appeared after the last recorded scraping run.
    /// Derived per reconciliation pass, never stored.
    #[serde(default)]
    pub is_new: bool,
}

impl TenderRecord {
    /// The natural key identifying this tender.
    pub fn natural_key(&self) -> (&str, Option<NaiveDateTime>) {
        (&self.numero_ordre, self.date_poste)
    }
}
