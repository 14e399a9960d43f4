//! Archive-Harvest main entry point
//!
//! This is the command-line interface for the Archive-Harvest archive walker.

use anyhow::{Context, Result};
use archive_harvest::config::{load_config_with_hash, Config};
use archive_harvest::crawler::{crawl, CrawlPhase};
use archive_harvest::output::{
    load_stats, print_statistics, write_reports, CrawlStats, CrawlSummary,
};
use archive_harvest::state::{CrawlState, JsonStore};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Archive-Harvest: a resumable archive walker
///
/// Archive-Harvest walks the archive index pages of a single site, writes
/// every post it finds to disk, and keeps its progress in JSON files so
/// an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "archive-harvest")]
#[command(version)]
#[command(about = "A resumable archive walker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, discarding previous state and stats
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_report", "fresh"])]
    dry_run: bool,

    /// Show statistics from the persisted state and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_report", "fresh"])]
    stats: bool,

    /// Regenerate the text reports from the persisted state and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "fresh"])]
    export_report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config).context("failed to read crawl statistics")
    } else if cli.export_report {
        handle_export_report(&config).context("failed to export reports")
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("archive_harvest=info,warn"),
            1 => EnvFilter::new("archive_harvest=debug,info"),
            2 => EnvFilter::new("archive_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the persisted state and stats without seeding anything
///
/// Rejects the same corrupt or inconsistent files a crawl would.
fn load_persisted(config: &Config) -> Result<(CrawlState, CrawlStats)> {
    let state = JsonStore::<CrawlState>::new(&config.output.state_path).load()?;
    let stats = load_stats(&JsonStore::new(&config.output.stats_path))?;
    Ok((state, stats))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Archive-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Key parameter: {}", config.crawler.key_param);
    println!("  Max requeues: {}", config.crawler.max_requeues);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nRetry Policy:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {} x 2^n, clamped to {}s..{}s",
        config.retry.backoff_multiplier,
        config.retry.min_backoff_secs,
        config.retry.max_backoff_secs
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  State: {}", config.output.state_path);
    println!("  Stats: {}", config.output.stats_path);
    println!("  Report: {}", config.output.report_path);
    println!("  Not found list: {}", config.output.errors_path);
    println!("  Abandoned list: {}", config.output.abandoned_path);
    println!("  Posts directory: {}", config.output.posts_dir);

    let store = JsonStore::<CrawlState>::new(&config.output.state_path);
    if store.exists() {
        let state = store.load()?;
        println!(
            "\n✓ Would resume: {} pending, {} visited",
            state.pending().len(),
            state.visited().len()
        );
    } else {
        println!("\n✓ Would start from {}", config.crawler.start_url);
    }

    println!("✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows progress and post counts
fn handle_stats(config: &Config) -> Result<()> {
    println!("State: {}", config.output.state_path);
    println!("Stats: {}\n", config.output.stats_path);

    let (state, stats) = load_persisted(config)?;
    print_statistics(&CrawlSummary::new(&state, &stats));

    Ok(())
}

/// Handles the --export-report mode: rewrites the text reports
fn handle_export_report(config: &Config) -> Result<()> {
    println!("=== Exporting Reports ===\n");

    let (state, stats) = load_persisted(config)?;
    write_reports(&config.output, &state, &stats)?;

    println!("✓ Report written to: {}", config.output.report_path);
    println!("✓ Not found list written to: {}", config.output.errors_path);
    println!(
        "✓ Abandoned list written to: {}",
        config.output.abandoned_path
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if a previous run exists)");
    }
    tracing::info!("Start URL: {}", config.crawler.start_url);

    let phase = crawl(config, config_hash, fresh)
        .await
        .context("crawl failed")?;

    match phase {
        CrawlPhase::Draining => tracing::info!("Crawl completed successfully"),
        CrawlPhase::Suspended => tracing::info!("Crawl suspended, rerun to resume"),
        other => tracing::warn!(phase = %other, "Crawl stopped unexpectedly"),
    }

    Ok(())
}
