//! Daily scheduler: runs the scraping job at a configured local wall-clock
//! time.

use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::jobs::JobContext;
use crate::repository::ScheduleConfig;

/// Parse an `HH:MM` wall-clock time.
pub fn parse_schedule_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Time until the next occurrence of `at`: later today if still ahead,
/// otherwise tomorrow.
pub fn duration_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// One background task running the job daily at the configured time.
pub struct Scheduler {
    ctx: JobContext,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx, task: None }
    }

    /// Apply a schedule configuration: start, restart or stop the task.
    pub fn reschedule(&mut self, config: &ScheduleConfig) -> Result<()> {
        self.stop();
        if !config.enabled {
            info!("scheduler disabled");
            return Ok(());
        }
        let at = parse_schedule_time(&config.scraping_time).ok_or_else(|| {
            anyhow::anyhow!("invalid schedule time {:?}, expected HH:MM", config.scraping_time)
        })?;
        self.start(at);
        Ok(())
    }

    fn start(&mut self, at: NaiveTime) {
        let ctx = self.ctx.clone();
        info!(at = %at.format("%H:%M"), "scheduler armed");
        self.task = Some(tokio::spawn(run_loop(ctx, at)));
    }

    /// Cancel the background task if any.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(ctx: JobContext, at: NaiveTime) {
    loop {
        let wait = duration_until_next(Local::now().naive_local(), at);
        info!(seconds = wait.as_secs(), "next scheduled run");
        tokio::time::sleep(wait).await;

        match ctx.run_scraping_job().await {
            Ok(report) => info!(
                scraped = report.scraped,
                new = report.new_count,
                "scheduled run complete"
            ),
            // A failed run is retried at the next slot; the watermark was
            // not advanced so nothing is missed.
            Err(e) => {
                error!("scheduled run failed: {e:#}");
                warn!("will retry at the next scheduled time");
            }
        }
    }
}
