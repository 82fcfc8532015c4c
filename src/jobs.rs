//! The end-to-end scraping job: browser session, extraction,
//! reconciliation and watermark advance.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::TenderRecord;
use crate::reconcile;
use crate::repository::{TenderStore, WatermarkStore};
use crate::scrape::{scrape_all, BrowserSession, Credentials, PortalSession};

/// Shared context for job runs.
#[derive(Clone)]
pub struct JobContext {
    pub settings: Settings,
}

/// Summary of one completed job.
#[derive(Debug)]
pub struct JobReport {
    pub pages: usize,
    pub scraped: usize,
    pub new_count: u64,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    /// Full annotated snapshot after the run.
    pub snapshot: Vec<TenderRecord>,
}

impl JobContext {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run the full job against a live browser session.
    pub async fn run_scraping_job(&self) -> Result<JobReport> {
        let mut session = BrowserSession::open(&self.settings.portal)
            .await
            .context("failed to open browser session")?;
        self.run_with_session(&mut session).await
    }

    /// Job body over any session implementation.
    ///
    /// The watermark is advanced exactly once, after the batch is durable,
    /// so a failed run never moves the freshness cutoff. The session is
    /// closed on every exit path, including setup failures before the
    /// traversal starts.
    pub async fn run_with_session<S: PortalSession>(&self, session: &mut S) -> Result<JobReport> {
        let (store, watermarks, credentials) = match self.prepare() {
            Ok(prepared) => prepared,
            // scrape_all owns closing on its own paths; a setup failure
            // happens before it runs, so close here.
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("failed to close browser session cleanly: {close_err}");
                }
                return Err(e);
            }
        };

        let outcome = scrape_all(session, &credentials)
            .await
            .context("scrape traversal failed")?;

        let result = reconcile::reconcile(&store, &watermarks, &outcome.records)?;
        watermarks.record_run(result.new_count)?;

        info!(
            pages = outcome.pages,
            scraped = outcome.records.len(),
            new = result.new_count,
            "scraping job finished"
        );

        Ok(JobReport {
            pages: outcome.pages,
            scraped: outcome.records.len(),
            new_count: result.new_count,
            inserted: result.inserted,
            updated: result.updated,
            failed: result.failed,
            snapshot: result.snapshot,
        })
    }

    /// Everything fallible that must be in place before scraping starts.
    fn prepare(&self) -> Result<(TenderStore, WatermarkStore, Credentials)> {
        self.settings.ensure_directories()?;
        let db_path = self.settings.database_path();
        let store = TenderStore::new(&db_path)?;
        let watermarks = WatermarkStore::new(&db_path)?;
        let credentials = self.settings.credentials()?;
        Ok((store, watermarks, credentials))
    }
}
