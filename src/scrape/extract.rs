//! Field extraction from tender listing cards.
//!
//! Pure transforms over already-fetched markup: every lookup degrades to the
//! "Non spécifié" sentinel instead of failing, so a malformed card yields a
//! partial record rather than aborting the page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{RawTender, NOT_SPECIFIED};

/// One listing card per tender on the search results page.
static CARD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.card.card-dashed.card-custom.gutter-b").expect("valid selector")
});

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.DetailAO").expect("valid selector"));

static DETAILS_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.d-flex.flex-wrap.my-2").expect("valid selector"));

/// Primary detail links carry the posted date and the tender type.
static DETAILS_PRIMARY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "a.text-muted.text-hover-primary.font-weight-bold.mr-lg-8.mr-5.mb-lg-0.mb-2",
    )
    .expect("valid selector")
});

/// City links share the base classes of primary links but none of the margin
/// modifiers, hence the `:not` guard.
static DETAILS_CITY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.text-muted.text-hover-primary.font-weight-bold:not(.mr-lg-8)")
        .expect("valid selector")
});

static ATTRIBUTES_SECTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.d-flex.align-items-center.flex-lg-fill.mr-5.my-1")
        .expect("valid selector")
});

static ATTRIBUTE_SPAN: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.font-weight-bolder.font-size-sm").expect("valid selector")
});

static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.flex-grow-1.font-weight-bolder.font-size-h5.py-2.py-lg-2.mr-5")
        .expect("valid selector")
});

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}").expect("valid regex"));

/// Keywords classifying a detail fragment as the tender type.
const TYPE_KEYWORDS: &[&str] = &["APPEL D'OFFRES", "CONCOURS", "MARCHÉ"];

/// Parse a full results page and extract every tender card it contains, in
/// encounter order.
pub fn extract_records(html: &str) -> Vec<RawTender> {
    let document = Html::parse_document(html);
    document.select(&CARD).map(extract_card).collect()
}

/// Extract one tender record from a single card fragment.
///
/// Total: a card missing every recognized field yields a record with every
/// field equal to the sentinel.
pub fn extract_card(card: ElementRef<'_>) -> RawTender {
    let mut record = RawTender::default();

    if let Some(title) = card.select(&TITLE).next() {
        record.organisme = text_of(title);
    }

    extract_details(card, &mut record);
    extract_attributes(card, &mut record);

    if let Some(description) = card.select(&DESCRIPTION).next() {
        record.description = text_of(description);
    }

    record
}

/// Posted date, tender type and city from the card's detail section.
///
/// A detail fragment is claimed by at most one classification; the date
/// pattern takes precedence, and the first match wins for each field.
fn extract_details(card: ElementRef<'_>, record: &mut RawTender) {
    let Some(section) = card.select(&DETAILS_SECTION).next() else {
        return;
    };

    for detail in section.select(&DETAILS_PRIMARY) {
        let text = text_of(detail);

        if DATE_PATTERN.is_match(&text) && record.date_poste == NOT_SPECIFIED {
            record.date_poste = text;
            continue;
        }

        let upper = text.to_uppercase();
        if TYPE_KEYWORDS.iter().any(|kw| upper.contains(kw)) && record.type_offre == NOT_SPECIFIED
        {
            record.type_offre = text;
        }
    }

    if let Some(city) = section.select(&DETAILS_CITY).next() {
        record.ville = text_of(city);
    }
}

/// Order number, tender number, deadline, security deposit and estimate from
/// the card's attribute blocks.
///
/// A block is usable only when at least two spans exist: the first carries
/// the label, the second the content.
fn extract_attributes(card: ElementRef<'_>, record: &mut RawTender) {
    for section in card.select(&ATTRIBUTES_SECTION) {
        let spans: Vec<ElementRef<'_>> = section.select(&ATTRIBUTE_SPAN).collect();
        if spans.len() < 2 {
            continue;
        }

        let label = text_of(spans[0]);
        let value = text_of(spans[1]);

        if label.contains("N°Ordre") {
            record.numero_ordre = value;
        } else if label.contains("N° AO") {
            record.numero_ao = value;
        } else if label.contains("Date Limite") {
            record.date_limite = value;
        } else if label.contains("Caution") {
            record.caution = clean_numeric(&value);
        } else if label.contains("Estimation") {
            record.estimation = clean_numeric(&value);
        }
    }
}

/// Clean and parse a portal-formatted amount ("1 234,56 DH", NBSP thousands
/// separators, comma decimals). Unparsable input yields `None`, never an
/// error. Idempotent on already-clean decimal strings.
pub fn clean_numeric(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let cleaned = cleaned.replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Concatenated, whitespace-trimmed text content of an element.
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
