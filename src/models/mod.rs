//! Data models for aoveille.

mod tender;

pub use tender::{RawTender, TenderRecord, NOT_SPECIFIED};
