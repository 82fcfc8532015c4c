//! Error types for the scraping session.

use std::time::Duration;

use thiserror::Error;

/// Failures raised by the portal session driver.
///
/// A `NavigationTimeout` is fatal to the current run: login and navigation
/// are brittle multi-step sequences, so each wait names the step that never
/// produced its target element.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {waited:?} waiting for {step}")]
    NavigationTimeout {
        step: &'static str,
        waited: Duration,
    },

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("browser session is not open")]
    NotOpen,
}
