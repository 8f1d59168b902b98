//! chanaudit - services channel audit bot.

use std::path::PathBuf;

use anyhow::Context;
use chanaudit::config::{Config, validate};
use chanaudit::output::{read_keys, write_table};
use chanaudit::protocols::Protocol;
use chanaudit::session::KeyOutcome;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Query a services bot about every channel in a list.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    /// Key list; overrides query.input
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Result file; overrides the protocol's output
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    /// Audit to run
    #[arg(value_enum)]
    protocol: Protocol,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    let config = Config::load(&args.config).map_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load config");
        e
    })?;
    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), args.config.display());
    }

    let input = args.input.unwrap_or_else(|| config.query.input.clone());
    let output = args
        .output
        .unwrap_or_else(|| args.protocol.output(&config).to_path_buf());

    info!(
        protocol = %args.protocol,
        server = %config.server.address(),
        input = %input.display(),
        output = %output.display(),
        "Starting chanaudit"
    );

    let keys = read_keys(&input)?;
    let outcome = chanaudit::audit(&config, args.protocol, &keys)
        .await
        .map_err(|e| {
            error!(error = %e, code = e.error_code(), "Audit failed; no results written");
            e
        })
        .context("audit failed")?;

    write_table(&output, &outcome.table)
        .with_context(|| format!("writing results to {}", output.display()))?;

    let timed_out = outcome
        .reports
        .iter()
        .filter(|r| r.outcome == KeyOutcome::TimedOut)
        .count();
    let rejected: usize = outcome.reports.iter().map(|r| r.rejected).sum();
    let stale: usize = outcome.reports.iter().map(|r| r.stale).sum();
    info!(
        records = outcome.table.len(),
        timed_out,
        rejected,
        stale,
        output = %output.display(),
        "Results written"
    );

    Ok(())
}
