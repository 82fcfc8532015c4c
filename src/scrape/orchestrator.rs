//! Drives one portal session across every results page.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::models::RawTender;

use super::extract::extract_records;
use super::session::{Advance, Credentials, PortalSession};

/// How long to watch for the transient datatable warning after navigation.
const ALERT_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a full scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// Extracted records, concatenated per page in encounter order.
    pub records: Vec<RawTender>,
    /// Number of result pages traversed.
    pub pages: usize,
}

/// Log in and traverse every results page, extracting all tender cards.
///
/// The session is closed on every exit path, normal completion or error.
pub async fn scrape_all<S: PortalSession>(
    session: &mut S,
    credentials: &Credentials,
) -> Result<ScrapeOutcome, SessionError> {
    let outcome = run(session, credentials).await;
    if let Err(e) = session.close().await {
        warn!("failed to close browser session cleanly: {e}");
    }
    outcome
}

async fn run<S: PortalSession>(
    session: &mut S,
    credentials: &Credentials,
) -> Result<ScrapeOutcome, SessionError> {
    session.login(credentials).await?;
    session.dismiss_transient_alert(ALERT_TIMEOUT).await;

    let mut records: Vec<RawTender> = Vec::new();
    let mut pages = 0;

    loop {
        let html = session.page_html().await?;
        let page_records = extract_records(&html);
        pages += 1;
        debug!(page = pages, count = page_records.len(), "extracted tender cards");
        records.extend(page_records);

        match session.advance_page().await? {
            Advance::Done => break,
            Advance::More => {
                session.dismiss_transient_alert(ALERT_TIMEOUT).await;
            }
        }
    }

    info!(pages, records = records.len(), "scrape traversal finished");
    Ok(ScrapeOutcome { records, pages })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// Scripted session serving canned pages; stands in for the browser.
    pub(crate) struct ScriptedSession {
        pages: Vec<String>,
        cursor: usize,
        pub login_calls: usize,
        pub advance_calls: usize,
        pub closed: bool,
    }

    impl ScriptedSession {
        pub(crate) fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                cursor: 0,
                login_calls: 0,
                advance_calls: 0,
                closed: false,
            }
        }
    }

    #[async_trait]
    impl PortalSession for ScriptedSession {
        async fn login(&mut self, _credentials: &Credentials) -> Result<(), SessionError> {
            self.login_calls += 1;
            Ok(())
        }

        async fn page_html(&mut self) -> Result<String, SessionError> {
            Ok(self.pages[self.cursor].clone())
        }

        async fn advance_page(&mut self) -> Result<Advance, SessionError> {
            self.advance_calls += 1;
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

    fn page_with_cards(names: &[&str]) -> String {
        let cards: String = names
            .iter()
            .map(|name| {
                format!(
                    r##"<div class="card card-dashed card-custom gutter-b">
                        <a class="DetailAO" href="#">{name}</a>
                    </div>"##
                )
            })
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user".into(),
            password: "pass".into(),
        }
    }

    #[tokio::test]
    async fn test_pagination_terminates_and_preserves_order() {
        let mut session = ScriptedSession::new(vec![
            page_with_cards(&["A", "B"]),
            page_with_cards(&["C"]),
            page_with_cards(&["D", "E"]),
        ]);

        let outcome = scrape_all(&mut session, &credentials()).await.unwrap();

        assert_eq!(outcome.pages, 3);
        // One advance call per page; the last one signalled Done.
        assert_eq!(session.advance_calls, 3);
        let names: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r.organisme.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_single_page_without_next_control() {
        let mut session = ScriptedSession::new(vec![page_with_cards(&["Solo"])]);
        let outcome = scrape_all(&mut session, &credentials()).await.unwrap();
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(session.login_calls, 1);
    }

    #[tokio::test]
    async fn test_login_failure_still_closes_session() {
        struct FailingLogin {
            closed: bool,
        }

        #[async_trait]
        impl PortalSession for FailingLogin {
            async fn login(&mut self, _credentials: &Credentials) -> Result<(), SessionError> {
                Err(SessionError::NavigationTimeout {
                    step: "login form username field",
                    waited: Duration::from_secs(10),
                })
            }
            async fn page_html(&mut self) -> Result<String, SessionError> {
                unreachable!("login never succeeds")
            }
            async fn advance_page(&mut self) -> Result<Advance, SessionError> {
                unreachable!("login never succeeds")
            }
            async fn dismiss_transient_alert(&mut self, _timeout: Duration) -> Option<String> {
                None
            }
            async fn close(&mut self) -> Result<(), SessionError> {
                self.closed = true;
                Ok(())
            }
        }

        let mut session = FailingLogin { closed: false };
        let err = scrape_all(&mut session, &credentials()).await.unwrap_err();
        assert!(matches!(err, SessionError::NavigationTimeout { .. }));
        assert!(session.closed);
    }
}
