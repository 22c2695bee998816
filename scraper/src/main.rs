//! Remote Fresher Jobs Scraper
//!
//! Searches every configured platform for each job title, keeps the
//! entry-level remote listings, writes them to CSV (or JSON) and sends
//! a digest to the enabled notifiers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use common::Query;
use job_scraper::config::DEFAULT_CONFIG_PATH;
use job_scraper::notify::{notify_all, Digest};
use job_scraper::store::{FileIdentityStore, IdentityStore};
use job_scraper::{writer, Aggregator, AppConfig, Deduplicator, HttpFetcher, RunOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

const DEFAULT_TITLES: &[&str] = &[
    "software engineer",
    "web developer",
    "frontend developer",
    "backend developer",
    "full stack developer",
    "junior developer",
    "entry level developer",
    "python developer",
    "javascript developer",
    "react developer",
    "data analyst",
    "qa engineer",
    "devops engineer",
];

#[derive(Debug, Parser)]
#[command(
    name = "job-scraper",
    about = "Find remote, entry-level jobs across several job boards",
    long_about = "Search every enabled job board for each title, keep listings that are remote and suitable for freshers, drop duplicates, and save the result."
)]
struct Cli {
    #[arg(
        long = "title",
        value_name = "TITLE",
        help = "Job title to search for, repeat as needed (default: built-in entry-level titles)"
    )]
    titles: Vec<String>,
    #[arg(long, default_value = "remote", help = "Location passed to every board")]
    location: String,
    #[arg(
        long,
        value_name = "FILE",
        help = "Output file, .json for JSON (default: remote_fresher_jobs_<timestamp>.csv)"
    )]
    output: Option<PathBuf>,
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long, help = "Send the email digest even if the config disables it")]
    email: bool,
    #[arg(long, help = "Send the WhatsApp digest even if the config disables it")]
    whatsapp: bool,
    #[arg(long, conflicts_with_all = ["email", "whatsapp"], help = "Send no notifications")]
    no_notify: bool,
    #[arg(long, value_name = "N", help = "Stop once a run admits N jobs")]
    max_records: Option<usize>,
    #[arg(long, help = "Order output by platform, title and company")]
    sort: bool,
    #[arg(long, value_name = "SECS", help = "Cancel the search after SECS seconds")]
    deadline: Option<u64>,
    #[arg(long, help = "Ignore jobs remembered from earlier runs")]
    no_seen_store: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    info!("🎯 Remote Fresher Jobs Scraper");

    let mut config = AppConfig::load(&cli.config).context("Failed to load configuration")?;
    if cli.email {
        config.notifications.enable_email = true;
    }
    if cli.whatsapp {
        config.notifications.enable_whatsapp = true;
    }
    if cli.no_notify {
        config.notifications.enable_email = false;
        config.notifications.enable_whatsapp = false;
    }
    if cli.max_records.is_some() {
        config.max_records = cli.max_records;
    }
    if cli.no_seen_store {
        config.seen_store.enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    let classifier = config.classifier()?;
    let adapters = config.adapters()?;

    let mut dedup = Deduplicator::new();
    if let Some(limit) = config.max_records {
        dedup = dedup.with_limit(limit);
    }
    if config.seen_store.enabled {
        let store = FileIdentityStore::open(&config.seen_store.path).with_context(|| {
            format!(
                "Failed to open seen-job store {}",
                config.seen_store.path.display()
            )
        })?;
        let store: Arc<dyn IdentityStore> = Arc::new(store);
        dedup = dedup.with_store(store, config.seen_store.ttl());
    }
    let dedup = Arc::new(dedup);

    let fetcher =
        Arc::new(HttpFetcher::new(config.request.clone()).context("Failed to build HTTP client")?);
    let mut aggregator = Aggregator::new(
        fetcher,
        classifier,
        Arc::clone(&dedup),
        config.aggregator_settings(),
    )?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 Interrupted, finishing with what we have");
                cancel.cancel();
            }
        });
    }
    if let Some(secs) = cli.deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("⏰ Deadline of {}s reached, cancelling", secs);
            cancel.cancel();
        });
    }

    let titles: Vec<String> = if cli.titles.is_empty() {
        DEFAULT_TITLES.iter().map(|t| t.to_string()).collect()
    } else {
        cli.titles.clone()
    };

    let mut outcome = RunOutcome::default();
    for title in titles {
        if cancel.is_cancelled() {
            break;
        }

        let run = aggregator
            .run(&Query::new(title, cli.location.as_str()), &adapters, &cancel)
            .await;
        let capped = run.reports.iter().any(|r| r.capped);
        outcome.records.extend(run.records);
        outcome.reports.extend(run.reports);

        if capped {
            info!("🧮 Record cap reached, skipping remaining titles");
            break;
        }
    }

    let failed = outcome.reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!("⚠️  {} source fetches failed", failed);
    }

    if cli.sort {
        outcome.sort_by_platform();
    }
    outcome.summary().log();

    let output = cli.output.clone().unwrap_or_else(default_output);
    writer::save(&outcome.records, &output)
        .with_context(|| format!("Failed to save results to {}", output.display()))?;
    info!("✅ SUCCESS! Remote fresher jobs saved to: {}", output.display());

    dedup
        .flush_store()
        .context("Failed to save seen-job store")?;

    let notifiers = config.notifications.build();
    if !notifiers.is_empty() {
        let listed: usize = outcome.reports.iter().map(|r| r.fetched).sum();
        let digest = Digest::new(&outcome.records, listed);
        notify_all(&notifiers, &digest).await;
    }

    Ok(())
}

fn default_output() -> PathBuf {
    PathBuf::from(format!(
        "remote_fresher_jobs_{}.csv",
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_titles() {
        let cli = Cli::try_parse_from([
            "job-scraper",
            "--title",
            "rust developer",
            "--title",
            "qa engineer",
            "--max-records",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.titles, vec!["rust developer", "qa engineer"]);
        assert_eq!(cli.max_records, Some(10));
        assert_eq!(cli.location, "remote");
    }

    #[test]
    fn test_no_notify_conflicts_with_email() {
        assert!(Cli::try_parse_from(["job-scraper", "--no-notify", "--email"]).is_err());
    }

    #[test]
    fn test_default_output_name() {
        let name = default_output().display().to_string();
        assert!(name.starts_with("remote_fresher_jobs_"));
        assert!(name.ends_with(".csv"));
    }
}
