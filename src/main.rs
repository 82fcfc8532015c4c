//! aoveille - tender announcement scraping and tracking system.
//!
//! Scrapes public tender announcements from a subscription portal,
//! reconciles them into a local database and flags what changed since the
//! previous run.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aoveille::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "aoveille=info"
    } else {
        "aoveille=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
