//! CLI commands implementation.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::export;
use crate::jobs::JobContext;
use crate::models::TenderRecord;
use crate::reconcile;
use crate::repository::{ScheduleConfig, ScheduleStore, TenderStore, WatermarkStore};
use crate::scheduler::{parse_schedule_time, Scheduler};

#[derive(Parser)]
#[command(name = "aoveille")]
#[command(about = "Tender announcement scraping and tracking system")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Log in to the portal and scrape every tender page
    Scrape,

    /// List stored tenders
    List {
        /// Filter by city (substring, case-insensitive)
        #[arg(long)]
        ville: Option<String>,
        /// Filter by issuing organisation (substring, case-insensitive)
        #[arg(long)]
        organisme: Option<String>,
        /// Filter by description (substring, case-insensitive)
        #[arg(long)]
        description: Option<String>,
        /// Only tenders newer than the previous run
        #[arg(long)]
        new: bool,
    },

    /// Export stored tenders to CSV
    Export {
        /// Output file path
        #[arg(short, long, default_value = "appels_offres.csv")]
        output: PathBuf,
    },

    /// Manage the daily scraping schedule
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Run in the foreground, scraping daily at the configured time
    Watch,

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Show the current schedule
    Show,
    /// Update the schedule
    Set {
        /// Enable or disable scheduled runs
        #[arg(long)]
        enabled: Option<bool>,
        /// Daily run time (HH:MM, local)
        #[arg(long)]
        time: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(data_dir) = cli.data_dir {
        settings = settings.with_data_dir(&data_dir);
    }

    match cli.command {
        Commands::Init => cmd_init(&settings),
        Commands::Scrape => cmd_scrape(settings).await,
        Commands::List {
            ville,
            organisme,
            description,
            new,
        } => cmd_list(&settings, ville, organisme, description, new),
        Commands::Export { output } => cmd_export(&settings, &output),
        Commands::Schedule { command } => match command {
            ScheduleCommands::Show => cmd_schedule_show(&settings),
            ScheduleCommands::Set { enabled, time } => {
                cmd_schedule_set(&settings, enabled, time)
            }
        },
        Commands::Watch => cmd_watch(settings).await,
        Commands::Status => cmd_status(&settings),
    }
}

fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let db_path = settings.database_path();
    TenderStore::new(&db_path)?;
    WatermarkStore::new(&db_path)?;
    ScheduleStore::new(&db_path)?;

    println!(
        "{} Initialized aoveille in {}",
        style("+").green(),
        settings.data_dir.display()
    );
    Ok(())
}

async fn cmd_scrape(settings: Settings) -> anyhow::Result<()> {
    let ctx = JobContext::new(settings);
    println!("Scraping tender listing...");
    let report = ctx.run_scraping_job().await?;

    println!(
        "{} Scraped {} tenders over {} pages",
        style("+").green(),
        report.scraped,
        report.pages
    );
    println!(
        "  {} new, {} inserted, {} updated",
        style(report.new_count).bold(),
        report.inserted,
        report.updated
    );
    if report.failed > 0 {
        println!(
            "{} {} rows could not be persisted (see logs)",
            style("!").yellow(),
            report.failed
        );
    }
    Ok(())
}

fn matches_filter(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

fn cmd_list(
    settings: &Settings,
    ville: Option<String>,
    organisme: Option<String>,
    description: Option<String>,
    only_new: bool,
) -> anyhow::Result<()> {
    let snapshot = load_snapshot(settings)?;

    let filtered: Vec<&TenderRecord> = snapshot
        .iter()
        .filter(|r| matches_filter(&r.ville, &ville))
        .filter(|r| matches_filter(&r.organisme, &organisme))
        .filter(|r| matches_filter(&r.description, &description))
        .filter(|r| !only_new || r.is_new)
        .collect();

    if filtered.is_empty() {
        println!("No tenders match.");
        return Ok(());
    }

    for record in &filtered {
        let marker = if record.is_new {
            style("NEW").green().bold().to_string()
        } else {
            "   ".to_string()
        };
        let posted = record
            .date_poste
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "--/--/----".to_string());
        println!(
            "{} {} {} | {} | {} | {}",
            marker,
            style(&record.numero_ordre).bold(),
            posted,
            record.ville,
            record.organisme,
            record.description
        );
    }
    println!("\n{} tenders", filtered.len());
    Ok(())
}

fn cmd_export(settings: &Settings, output: &std::path::Path) -> anyhow::Result<()> {
    let snapshot = load_snapshot(settings)?;
    export::export_to_file(output, &snapshot)?;
    println!(
        "{} Exported {} tenders to {}",
        style("+").green(),
        snapshot.len(),
        output.display()
    );
    Ok(())
}

fn cmd_schedule_show(settings: &Settings) -> anyhow::Result<()> {
    let store = ScheduleStore::new(&settings.database_path())?;
    let config = store.get()?;
    let state = if config.enabled {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    println!("Schedule: {} at {}", state, config.scraping_time);
    Ok(())
}

fn cmd_schedule_set(
    settings: &Settings,
    enabled: Option<bool>,
    time: Option<String>,
) -> anyhow::Result<()> {
    let store = ScheduleStore::new(&settings.database_path())?;
    let mut config = store.get()?;

    if let Some(enabled) = enabled {
        config.enabled = enabled;
    }
    if let Some(time) = time {
        if parse_schedule_time(&time).is_none() {
            anyhow::bail!("invalid time {time:?}, expected HH:MM");
        }
        config.scraping_time = time;
    }

    store.set(&config)?;
    println!("{} Schedule updated", style("+").green());
    cmd_schedule_show(settings)
}

/// How often the watch loop re-reads the stored schedule.
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Reprogram the scheduler when the stored config changed. Returns whether
/// a change was applied.
fn refresh_schedule(
    scheduler: &mut Scheduler,
    current: &mut ScheduleConfig,
    latest: ScheduleConfig,
) -> anyhow::Result<bool> {
    if latest == *current {
        return Ok(false);
    }
    scheduler.reschedule(&latest)?;
    *current = latest;
    Ok(true)
}

async fn cmd_watch(settings: Settings) -> anyhow::Result<()> {
    let store = ScheduleStore::new(&settings.database_path())?;
    let mut config = store.get()?;
    if !config.enabled {
        println!(
            "{} Schedule is disabled; nothing will run until `aoveille schedule set --enabled true`",
            style("!").yellow()
        );
    }

    let mut scheduler = Scheduler::new(JobContext::new(settings));
    scheduler.reschedule(&config)?;
    println!(
        "Watching: daily scrape at {}. Press Ctrl-C to stop.",
        style(&config.scraping_time).bold()
    );

    // Schedule updates from other invocations take effect without a
    // restart: poll the store and reprogram on change.
    let mut poll = tokio::time::interval(WATCH_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                let latest = store.get()?;
                if refresh_schedule(&mut scheduler, &mut config, latest)? {
                    let state = if config.enabled { "enabled" } else { "disabled" };
                    println!(
                        "{} Schedule changed: {} at {}",
                        style("+").green(),
                        state,
                        config.scraping_time
                    );
                }
            }
        }
    }
    scheduler.stop();
    println!("\nStopped.");
    Ok(())
}

fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.database_path();
    if !db_path.exists() {
        println!("{} No database yet, run `aoveille init`", style("!").yellow());
        return Ok(());
    }

    let store = TenderStore::new(&db_path)?;
    let watermarks = WatermarkStore::new(&db_path)?;
    let schedule = ScheduleStore::new(&db_path)?;

    println!("Database: {}", db_path.display());
    println!("Tenders:  {}", store.count()?);
    match watermarks.last_scraping()? {
        Some(at) => println!("Last run: {}", at.format("%d/%m/%Y %H:%M")),
        None => println!("Last run: never"),
    }
    let config = schedule.get()?;
    println!(
        "Schedule: {} at {}",
        if config.enabled { "enabled" } else { "disabled" },
        config.scraping_time
    );
    Ok(())
}

fn load_snapshot(settings: &Settings) -> anyhow::Result<Vec<TenderRecord>> {
    let db_path = settings.database_path();
    let store = TenderStore::new(&db_path)?;
    let watermarks = WatermarkStore::new(&db_path)?;
    Ok(reconcile::load_last_snapshot(&store, &watermarks)?)
}
