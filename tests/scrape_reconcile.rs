//! End-to-end flow over a scripted portal session: traversal, extraction,
//! reconciliation and watermark accounting, without a browser.

use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use aoveille::config::Settings;
use aoveille::error::SessionError;
use aoveille::jobs::JobContext;
use aoveille::repository::WatermarkStore;
use aoveille::scrape::{Advance, Credentials, PortalSession};

struct ScriptedPortal {
    pages: Vec<String>,
    cursor: usize,
    closed: bool,
}

impl ScriptedPortal {
    fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            cursor: 0,
            closed: false,
        }
    }
}

#[async_trait]
impl PortalSession for ScriptedPortal {
    async fn login(&mut self, _credentials: &Credentials) -> Result<(), SessionError> {
        Ok(())
    }

    async fn page_html(&mut self) -> Result<String, SessionError> {
        Ok(self.pages[self.cursor].clone())
    }

    async fn advance_page(&mut self) -> Result<Advance, SessionError> {
        if self.cursor + 1 < self.pages.len() {
            self.cursor += 1;
            Ok(Advance::More)
        } else {
            Ok(Advance::Done)
        }
    }

    async fn dismiss_transient_alert(&mut self, _timeout: Duration) -> Option<String> {
        None
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed = true;
        Ok(())
    }
}

fn card(organisme: &str, numero_ordre: &str, date_poste: &str) -> String {
    format!(
        r##"<div class="card card-dashed card-custom gutter-b">
            <a class="DetailAO" href="#">{organisme}</a>
            <div class="d-flex flex-wrap my-2">
                <a class="text-muted text-hover-primary font-weight-bold mr-lg-8 mr-5 mb-lg-0 mb-2">{date_poste}</a>
                <a class="text-muted text-hover-primary font-weight-bold mr-lg-8 mr-5 mb-lg-0 mb-2">Appel d'offres ouvert</a>
                <a class="text-muted text-hover-primary font-weight-bold">Rabat</a>
            </div>
            <div class="d-flex align-items-center flex-lg-fill mr-5 my-1">
                <span class="font-weight-bolder font-size-sm">N°Ordre :</span>
                <span class="font-weight-bolder font-size-sm">{numero_ordre}</span>
            </div>
            <div class="flex-grow-1 font-weight-bolder font-size-h5 py-2 py-lg-2 mr-5">
                Travaux divers
            </div>
        </div>"##
    )
}

fn page(cards: &[String]) -> String {
    format!("<html><body>{}</body></html>", cards.join("\n"))
}

fn test_settings(dir: &TempDir) -> Settings {
    std::env::set_var("AOVEILLE_PORTAL_USERNAME", "user");
    std::env::set_var("AOVEILLE_PORTAL_PASSWORD", "pass");
    Settings::default().with_data_dir(dir.path())
}

#[tokio::test]
async fn test_full_pipeline_first_and_second_run() {
    let dir = TempDir::new().unwrap();
    let settings = test_settings(&dir);
    let ctx = JobContext::new(settings.clone());

    let pages = vec![
        page(&[
            card("Ministère de la Santé", "100", "05/03/2026"),
            card("Commune de Fès", "101", "06/03/2026"),
        ]),
        page(&[card("ONEE", "102", "07/03/2026")]),
    ];

    // First run: empty database, everything counts as new.
    let mut session = ScriptedPortal::new(pages.clone());
    let report = ctx.run_with_session(&mut session).await.unwrap();
    assert!(session.closed);
    assert_eq!(report.pages, 2);
    assert_eq!(report.scraped, 3);
    assert_eq!(report.new_count, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 0);
    assert!(report.snapshot.iter().all(|r| r.is_new));

    let watermarks = WatermarkStore::new(&settings.database_path()).unwrap();
    let history = watermarks.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].new_ao_count, 3);

    // Second run over the same listing: nothing new, rows update in place.
    let mut session = ScriptedPortal::new(pages);
    let report = ctx.run_with_session(&mut session).await.unwrap();
    assert_eq!(report.scraped, 3);
    assert_eq!(report.new_count, 0);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 3);
    assert_eq!(report.snapshot.len(), 3);
    assert!(report.snapshot.iter().all(|r| !r.is_new));

    assert_eq!(watermarks.history().unwrap().len(), 2);
}

#[tokio::test]
async fn test_changed_listing_updates_without_duplicating() {
    let dir = TempDir::new().unwrap();
    let settings = test_settings(&dir);
    let ctx = JobContext::new(settings);

    let mut session = ScriptedPortal::new(vec![page(&[card(
        "Ministère de l'Intérieur",
        "200",
        "05/03/2026",
    )])]);
    ctx.run_with_session(&mut session).await.unwrap();

    // Same tender re-scraped with a corrected organisme.
    let mut session = ScriptedPortal::new(vec![page(&[card(
        "Ministère de l'Intérieur - DGCL",
        "200",
        "05/03/2026",
    )])]);
    let report = ctx.run_with_session(&mut session).await.unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(report.snapshot.len(), 1);
    assert_eq!(report.snapshot[0].organisme, "Ministère de l'Intérieur - DGCL");
}
