//! Scraping pipeline: session driver, field extraction, page orchestration.

pub mod extract;
pub mod orchestrator;
pub mod session;

pub use extract::{clean_numeric, extract_card, extract_records};
pub use orchestrator::{scrape_all, ScrapeOutcome};
pub use session::{Advance, BrowserSession, Credentials, PortalSession};
