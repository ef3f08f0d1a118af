#![forbid(unsafe_code)]

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tracshift_core::cancel::CancelToken;
use tracshift_core::config::MigrationConfig;
use tracshift_core::driver::{DriverOptions, MigrationDriver, RunReport};
use tracshift_core::github::{IssueTracker as _, RepoSlug, RestTracker};
use tracshift_core::labels::RuleSet;
use tracshift_core::store::SqliteTicketStore;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tracshift: replay Trac ticket histories into GitHub issues",
    long_about = None
)]
struct Cli {
    /// Migration config file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Skip tickets whose summary matches an existing issue title.
    #[arg(short, long)]
    deduplicate: bool,

    /// First ticket id to migrate (resume point after an aborted run).
    #[arg(short, long, value_name = "ID", default_value_t = 0)]
    start_at: i64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose || env::var("DEBUG").is_ok() {
        "tracshift=debug,info"
    } else {
        "tracshift=info,warn"
    };
    let filter =
        EnvFilter::try_from_env("TRACSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = env::var("TRACSHIFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = MigrationConfig::load(&cli.config)?;
    let rules = RuleSet::compile(&config.labels)?;

    let store = SqliteTicketStore::open(&config.trac_db)?;
    let slug = RepoSlug::parse(&config.repository)?;
    let tracker = RestTracker::new(slug, &config.credentials)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("interrupt received; finishing current mutation then aborting");
        handler_token.cancel();
    })?;

    let options = DriverOptions {
        deduplicate: cli.deduplicate,
        start_at: cli.start_at,
    };

    info!(
        repository = %config.repository,
        start_at = cli.start_at,
        deduplicate = cli.deduplicate,
        "starting migration"
    );

    let driver = MigrationDriver::new(&store, &tracker, &rules, cancel, options);
    let report = driver.run(&config)?;

    println!("tracshift: migration finished");
    println!("  milestones created:  {}", report.milestones_created);
    println!("  milestones existing: {}", report.milestones_existing);
    println!("  tickets migrated:    {}", report.tickets_migrated);
    println!("  tickets skipped:     {}", report.tickets_skipped);
    println!("  mutations issued:    {}", report.mutations);
    println!("  events skipped:      {}", report.events_skipped);
    println!("  API requests:        {}", tracker.request_count());

    let (remaining, limit) = tracker.rate_limit();
    if limit > 0 {
        println!("  quota remaining:     {remaining}/{limit}");
    }

    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<tracshift_core::error::FatalError>() {
                Some(fatal) => error!(kind = fatal.kind(), "migration aborted: {err:#}"),
                None => error!("migration aborted: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
