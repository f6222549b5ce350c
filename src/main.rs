//! Vetting-Crawler main entry point
//!
//! This is the command-line interface for the applicant verification crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use vetting_crawler::config::{load_config_with_hash, Config};
use vetting_crawler::crawler::{build_http_client, Crawler};
use vetting_crawler::governor::Governor;
use vetting_crawler::output::{print_usage, write_json_report, write_markdown_summary};
use vetting_crawler::pipeline::{
    ApplicantInfo, CustomSearchClient, OllamaClient, VerificationReport, VerificationRun,
};
use vetting_crawler::storage::{open_storage, RunStatus, Storage};
use vetting_crawler::EarlyTermination;

/// Exit status for a run stopped by quota exhaustion or strict rate limiting
const EXIT_HALTED: i32 = 2;

/// Vetting-Crawler: checks an application against the web
///
/// Searches for the applicant, crawls the sites found while respecting robots.txt
/// and a daily search quota, and scores each page against the application.
#[derive(Parser, Debug)]
#[command(name = "vetting-crawler")]
#[command(version)]
#[command(about = "Verify an applicant against web search results", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Company name
    #[arg(long, required_unless_present_any = ["usage", "dry_run"])]
    company: Option<String>,

    /// Company address
    #[arg(long, required_unless_present_any = ["usage", "dry_run"])]
    address: Option<String>,

    /// Company phone number
    #[arg(long, required_unless_present_any = ["usage", "dry_run"])]
    tel: Option<String>,

    /// Other identifying information (former names, branches, ...)
    #[arg(long, num_args = 0..)]
    other: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the run plan without searching
    #[arg(long, conflicts_with = "usage")]
    dry_run: bool,

    /// Show today's search quota usage and exit
    #[arg(long, conflicts_with = "dry_run")]
    usage: bool,
}

impl Cli {
    fn applicant(&self) -> ApplicantInfo {
        ApplicantInfo {
            company: self.company.clone().unwrap_or_default(),
            address: self.address.clone().unwrap_or_default(),
            tel: self.tel.clone().unwrap_or_default(),
            other: self.other.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.applicant());
        return Ok(());
    }

    if cli.usage {
        return handle_usage(&config);
    }

    let report = handle_run(config, &config_hash, cli.applicant()).await?;

    if report.is_halted() {
        eprintln!(
            "Run stopped ({}): {}",
            report.status,
            report.detail.as_deref().unwrap_or("no detail")
        );
        std::process::exit(EXIT_HALTED);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vetting_crawler=info,warn"),
            1 => EnvFilter::new("vetting_crawler=debug,info"),
            2 => EnvFilter::new("vetting_crawler=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config, applicant: &ApplicantInfo) {
    println!("=== Vetting-Crawler Dry Run ===\n");

    println!("Crawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Page timeout: {}s", config.crawler.page_timeout);
    println!("  Pacing interval: {}ms", config.crawler.pacing_interval);
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nGovernor:");
    println!("  Daily limit: {}", config.governor.daily_limit);
    println!(
        "  Rate limits: {}/min, {}/s ({})",
        config.governor.rate_limit_per_minute,
        config.governor.rate_limit_per_second,
        if config.governor.strict_mode { "strict" } else { "soft" }
    );

    println!("\nPipeline:");
    println!("  Max queries: {}", config.pipeline.max_queries);
    println!("  Results per query: {}", config.pipeline.results_per_query);
    println!("  Unit timeout: {}s", config.pipeline.unit_timeout);
    println!("  Score threshold: {}", config.pipeline.score_threshold);
    println!("  Concurrent units: {}", config.pipeline.max_concurrent_units);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);
    println!("  Summary: {}", config.output.summary_path);

    if !applicant.company.is_empty() {
        println!("\nApplicant: {} / {} / {}", applicant.company, applicant.address, applicant.tel);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would use at most {} search calls",
        config.pipeline.max_queries
    );
}

/// Handles the --usage mode: shows today's quota usage from the database
fn handle_usage(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let latest = storage.get_latest_run()?;

    let governor = Governor::new(config.governor.clone(), Arc::new(Mutex::new(storage)));
    let usage = governor.usage()?;

    print_usage(&usage, &config.governor, latest.as_ref());
    Ok(())
}

/// Handles the verification run, recording it in the database
async fn handle_run(
    config: Config,
    config_hash: &str,
    applicant: ApplicantInfo,
) -> anyhow::Result<VerificationReport> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let run_id = storage.create_run(config_hash)?;
    let storage = Arc::new(Mutex::new(storage));

    let client = build_http_client(&config.user_agent, config.crawler.page_timeout())?;
    let termination = EarlyTermination::new();

    let ctrl_c = termination.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping run");
            ctrl_c.set();
        }
    });

    let ollama = Arc::new(OllamaClient::new(client.clone(), &config.verifier));
    let run = VerificationRun::new(
        config.pipeline.clone(),
        Governor::new(config.governor.clone(), storage.clone()),
        Crawler::from_config(&config)?,
        termination,
        Arc::new(CustomSearchClient::new(client, &config.search)),
        ollama.clone(),
        ollama,
    );

    let report = match run.execute(&applicant).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Verification run failed: {}", e);
            finish_run(&storage, run_id, RunStatus::Failed, Some(&e.to_string()));
            return Err(e.into());
        }
    };

    write_json_report(&report, Path::new(&config.output.report_path))
        .context("Failed to write JSON report")?;
    write_markdown_summary(&report, Path::new(&config.output.summary_path))
        .context("Failed to write markdown summary")?;

    finish_run(&storage, run_id, report.status, report.detail.as_deref());

    println!(
        "Result: found={}, best score={:.3}, searched URLs={}, early terminated={}",
        report.found, report.best_score, report.searched_url_count, report.early_terminated
    );
    println!(
        "Wrote {} and {}",
        config.output.report_path, config.output.summary_path
    );

    Ok(report)
}

fn finish_run(
    storage: &Mutex<vetting_crawler::storage::SqliteStorage>,
    run_id: i64,
    status: RunStatus,
    detail: Option<&str>,
) {
    let result = match storage.lock() {
        Ok(mut storage) => storage.finish_run(run_id, status, detail).map_err(|e| e.to_string()),
        Err(_) => Err("storage lock poisoned".to_string()),
    };

    if let Err(e) = result {
        tracing::error!("Failed to record run {} as {}: {}", run_id, status, e);
    }
}
