//! Authenticated browser session against the tender portal.
//!
//! The portal keeps its listing behind a login form and JS-driven
//! pagination, so extraction goes through a real browser (CDP via
//! chromiumoxide). `PortalSession` is the only contract the orchestrator
//! depends on; a future direct API client only needs to satisfy the same
//! trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::error::SessionError;

/// Poll interval for bounded element/URL waits.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Portal login credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Pagination advance result. `Done` is the normal loop-termination
/// condition, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    More,
    Done,
}

/// The page-source-provider contract the orchestrator depends on.
#[async_trait]
pub trait PortalSession: Send {
    /// Run the multi-step login sequence up to the tender listing.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), SessionError>;

    /// Markup of the currently displayed results page.
    async fn page_html(&mut self) -> Result<String, SessionError>;

    /// Advance to the next results page, or signal end of pagination.
    async fn advance_page(&mut self) -> Result<Advance, SessionError>;

    /// Best-effort acknowledgement of a transient warning dialog. Returns
    /// the dialog message if one was seen; absence is the common case and
    /// never fails the caller.
    async fn dismiss_transient_alert(&mut self, timeout: Duration) -> Option<String>;

    /// Release all browser resources. Must be invoked exactly once per
    /// opened session, on every exit path.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Chromium-backed portal session.
pub struct BrowserSession {
    config: PortalConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    dialog_task: Option<JoinHandle<()>>,
    /// Messages of dialogs auto-accepted by the listener, drained by
    /// `dismiss_transient_alert`.
    dialog_log: Arc<Mutex<Vec<String>>>,
}

impl BrowserSession {
    /// Launch a browser, register the dialog auto-accept listener and
    /// navigate to the login entry point.
    pub async fn open(config: &PortalConfig) -> Result<Self, SessionError> {
        info!(headless = config.headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        if !config.headless {
            builder = builder.with_head();
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SessionError::LoginFailed(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page(config.login_url.as_str()).await?;
        let dialog_log = Arc::new(Mutex::new(Vec::new()));

        // The portal occasionally raises a client-side warning dialog that
        // is unrelated to data correctness; accept every dialog so it can
        // never wedge navigation.
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await?;
        let dialog_page = page.clone();
        let log = dialog_log.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                debug!(message = %event.message, "auto-accepting dialog");
                log.lock().await.push(event.message.clone());
                let params = HandleJavaScriptDialogParams::builder().accept(true).build();
                match params {
                    Ok(params) => {
                        if let Err(e) = dialog_page.execute(params).await {
                            debug!("failed to accept dialog: {e}");
                        }
                    }
                    Err(e) => debug!("failed to build dialog params: {e}"),
                }
            }
        });

        Ok(Self {
            config: config.clone(),
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
            dialog_task: Some(dialog_task),
            dialog_log,
        })
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page.as_ref().ok_or(SessionError::NotOpen)
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.config.element_timeout_secs)
    }

    /// Wait for an element to appear, bounded by the configured timeout.
    /// `step` names the login/navigation step for diagnosable failures.
    async fn wait_for_element(
        &self,
        selector: &str,
        step: &'static str,
    ) -> Result<chromiumoxide::element::Element, SessionError> {
        let waited = self.element_timeout();
        let deadline = tokio::time::Instant::now() + waited;
        let page = self.page()?;
        loop {
            if let Ok(element) = page.find_element(selector).await {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::NavigationTimeout { step, waited });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the current URL to contain a fragment.
    async fn wait_for_url(
        &self,
        fragment: &str,
        step: &'static str,
    ) -> Result<(), SessionError> {
        let waited = self.element_timeout();
        let deadline = tokio::time::Instant::now() + waited;
        let page = self.page()?;
        loop {
            if let Ok(Some(url)) = page.url().await {
                if url.contains(fragment) {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::NavigationTimeout { step, waited });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PortalSession for BrowserSession {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), SessionError> {
        let username_field = self
            .wait_for_element("input[name=\"username\"]", "login form username field")
            .await?;
        username_field.click().await?;
        username_field.type_str(&credentials.username).await?;

        let password_field = self
            .wait_for_element("input[name=\"password\"]", "login form password field")
            .await?;
        password_field.click().await?;
        password_field.type_str(&credentials.password).await?;

        self.wait_for_element("#kt_login_signin_submit", "login submit button")
            .await?
            .click()
            .await?;

        self.wait_for_url(&self.config.post_login_url_fragment, "post-login redirect")
            .await?;
        info!("login succeeded");

        self.wait_for_element("#MesMarches", "tender listing entry")
            .await?
            .click()
            .await?;

        // Trigger the default (non-advanced) search. The original flow
        // tolerates this control being absent and proceeds with whatever
        // the listing shows.
        match self
            .wait_for_element("#rechercheaoG", "default search trigger")
            .await
        {
            Ok(search) => {
                search.click().await?;
                debug!("default search triggered");
            }
            Err(e) => warn!("could not trigger default search: {e}"),
        }

        self.wait_for_element(".card-dashed", "tender cards").await?;
        info!("tender listing reached");
        Ok(())
    }

    async fn page_html(&mut self) -> Result<String, SessionError> {
        Ok(self.page()?.content().await?)
    }

    async fn advance_page(&mut self) -> Result<Advance, SessionError> {
        // The next-page control is identified by its stable onclick
        // signature; `:has` needs Chromium >= 105.
        let selector = "a[onclick*=\"getAoByPage\"]:has(i.ki-bold-arrow-next)";
        let next_button = match self.page()?.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(Advance::Done),
        };

        // Script-level click: the control can sit under a floating overlay
        // that would intercept a trusted click.
        next_button
            .call_js_fn("function() { this.click(); }", false)
            .await?;

        tokio::time::sleep(Duration::from_secs(self.config.page_settle_secs)).await;
        Ok(Advance::More)
    }

    async fn dismiss_transient_alert(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let seen: Vec<String> = self.dialog_log.lock().await.drain(..).collect();
            for message in seen {
                if message.contains("DataTables warning") {
                    info!(message = %message, "intercepted datatable warning dialog");
                    return Some(message);
                }
                debug!(message = %message, "dialog accepted");
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(task) = self.dialog_task.take() {
            task.abort();
        }
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            browser.close().await?;
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process; this only flags the
        // contract violation.
        if self.browser.is_some() {
            warn!("browser session dropped without close()");
        }
        if let Some(task) = self.dialog_task.take() {
            task.abort();
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
