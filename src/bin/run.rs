//! Trendwiki Run CLI
//!
//! Compute, publish and archive the daily trending article lists.
//!
//! # Examples
//!
//! Publish yesterday's lists (the usual cron invocation):
//! ```bash
//! trendwiki-run run
//! ```
//!
//! Re-run a specific day without editing any page:
//! ```bash
//! trendwiki-run run --date 2021-03-07 --dry-run
//! ```
//!
//! Show which articles are suppressed for Nigeria today:
//! ```bash
//! trendwiki-run exclusions --country NG
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trendwiki::{
    Archive, ArchiveSource, CommandQueryEngine, Config, Credentials, DryRunPublisher, QueryTemplate,
    RecencyFilter, RunDriver, RunLock, WikiSession,
};

#[derive(Parser)]
#[command(name = "trendwiki-run")]
#[command(author, version, about = "Publish daily trending Wikipedia articles per country")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON config file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "trendwiki.json", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute, publish and archive the lists for one day
    Run {
        /// Day to process (YYYY-MM-DD); defaults to yesterday
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Log the page content instead of editing, and leave the archive untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the recently trending articles that would be excluded
    Exclusions {
        /// Country code
        #[arg(long)]
        country: String,

        /// Day being computed (YYYY-MM-DD); defaults to yesterday
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Write a config file with the default settings
    InitConfig {
        /// Where to write the config (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Commands::Run { date, dry_run } => run(&cli.config, date.unwrap_or_else(yesterday), dry_run),
        Commands::Exclusions { country, date } => exclusions(&cli.config, &country, date.unwrap_or_else(yesterday)),
        Commands::InitConfig { output } => {
            let path = output.unwrap_or(cli.config);
            if path.exists() {
                anyhow::bail!("{} already exists; not overwriting", path.display());
            }
            Config::default().save(&path)?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}

fn yesterday() -> NaiveDate {
    Local::now().date_naive() - Duration::days(1)
}

fn run(config_path: &PathBuf, date: NaiveDate, dry_run: bool) -> Result<()> {
    tracing::info!(
        "###### trendwiki-run at {} ######",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let config = Config::load_or_default(config_path).context("Failed to load config")?;

    let _lock = match &config.lock_path {
        Some(path) => Some(RunLock::acquire(path).context("Failed to acquire run lock")?),
        None => None,
    };

    let template = QueryTemplate::load(&config.query_file)?;
    let engine = CommandQueryEngine::new(template, &config.query_command)?.with_timeout(config.query_timeout());
    let session = WikiSession::new(&config, Credentials::from_env()).context("Failed to create wiki session")?;

    let report = if dry_run {
        let driver = RunDriver::new(&config, &engine, &session, &DryRunPublisher);
        let mut archive = Archive::load_or_empty(&config.archive_path).context("Failed to load archive")?;
        let report = driver.run(&mut archive, date);
        tracing::info!("Dry run: archive not written");
        report
    } else {
        let driver = RunDriver::new(&config, &engine, &session, &session);
        driver
            .run_and_persist(&config.archive_path, date)
            .with_context(|| format!("Failed to update archive {}", config.archive_path.display()))?
    };
    report.log();

    if report.has_failures() {
        anyhow::bail!(
            "Run for {} finished with {} failed countries and {} failed pages",
            date,
            report.failed_countries().count(),
            report.failed_pages().count()
        );
    }

    tracing::info!("✅ Run for {} complete", date);
    Ok(())
}

fn exclusions(config_path: &PathBuf, country: &str, date: NaiveDate) -> Result<()> {
    let config = Config::load_or_default(config_path).context("Failed to load config")?;

    let source = Archive::load(&config.archive_path).context("Failed to load archive")?;
    let archive = match &source {
        ArchiveSource::Loaded(archive) => Some(archive),
        ArchiveSource::NotFound => None,
    };

    match RecencyFilter::new(archive).exclusions(country, date) {
        Some(set) => {
            println!(
                "{} articles excluded for {} on {} (ranked ≤ {} since {}):",
                set.len(),
                country,
                date,
                trendwiki::RECENT_RANK_THRESHOLD,
                RecencyFilter::window_start(date)
            );
            for article in set.iter() {
                println!("  {}", article);
            }
        }
        None => println!("No exclusions for {} on {}", country, date),
    }

    Ok(())
}
