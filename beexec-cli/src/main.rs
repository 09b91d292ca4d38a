/*!
beexec CLI - Command-line interface for the beexec log replay executor.

`run` replays a recorded command log through one of the persistence
strategies; `verify` inspects the logs a run left behind.
*/

use anyhow::Context;
use beexec_core::{
    verify_dir, Executor, ExecutorConfig, LogFamilyReport, RunSummary, ShutdownReport,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "beexec")]
#[command(about = "Replay recorded command logs under different logging strategies")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a command log and record throughput
    Run(RunArgs),
    /// Count commands and distinct keys in produced logs
    Verify {
        /// Directory holding the logs
        #[arg(long, default_value = "/tmp/")]
        check: PathBuf,
        /// Apply logs ordered by name length, then name
        #[arg(long)]
        sort: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Recorded command log to replay
    #[arg(long)]
    input: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the throughput output
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory receiving logs and latency output
    #[arg(long)]
    logfolder: Option<PathBuf>,

    /// Logging strategy: 0 discard, 1 immediate, 2 delegated, 3 batched
    #[arg(long)]
    logstrat: Option<i64>,

    /// Commands per batch or segment
    #[arg(long)]
    interval: Option<usize>,

    /// Force every write to stable storage
    #[arg(long)]
    sync: bool,

    /// Record per-write latency
    #[arg(long)]
    latency: bool,

    /// Stop replaying after this many minutes
    #[arg(long)]
    timeout: Option<u64>,

    /// Second log directory for the delegated strategy
    #[arg(long)]
    secdisk: Option<PathBuf>,

    /// Throughput sampling interval in milliseconds
    #[arg(long = "sample-ms")]
    sample_ms: Option<u64>,
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Applied")]
    applied: u64,
    #[tabled(rename = "Persisted")]
    persisted: u64,
    #[tabled(rename = "Flushes")]
    flushes: u64,
    #[tabled(rename = "Samples")]
    samples: u64,
    #[tabled(rename = "Interrupted")]
    interrupted: bool,
}

#[derive(Tabled)]
struct FamilyRow {
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Logs")]
    logs: usize,
    #[tabled(rename = "Commands")]
    commands: usize,
    #[tabled(rename = "Unique Keys")]
    unique_keys: usize,
    #[tabled(rename = "Size")]
    size: String,
}

impl From<&LogFamilyReport> for FamilyRow {
    fn from(report: &LogFamilyReport) -> Self {
        Self {
            family: report.family.clone(),
            logs: report.logs,
            commands: report.commands,
            unique_keys: report.unique_keys,
            size: format_size(report.total_bytes),
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json)?;

    match cli.command {
        Commands::Run(args) => run_replay(args)?,
        Commands::Verify { check, sort, json } => verify_logs(check, sort, json)?,
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<(), anyhow::Error> {
    if json {
        beexec_core::observability::init_observability(true, verbose)?;
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(beexec_core::observability::default_level(verbose))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<ExecutorConfig, anyhow::Error> {
    let mut config = match &args.config {
        Some(path) => ExecutorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ExecutorConfig::default(),
    };

    if let Some(dir) = &args.output {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = &args.logfolder {
        config = config.with_log_dir(dir);
    }
    if let Some(selector) = args.logstrat {
        config = config.with_selector(selector);
    }
    if let Some(interval) = args.interval {
        config = config.with_batch_threshold(interval);
    }
    if args.sync {
        config = config.with_sync(true);
    }
    if args.latency {
        config = config.with_latency(true);
    }
    if let Some(minutes) = args.timeout {
        config = config.with_timeout(Duration::from_secs(minutes * 60));
    }
    if let Some(dir) = &args.secdisk {
        config = config.with_secondary_log_dir(dir);
    }
    if let Some(ms) = args.sample_ms {
        config = config.with_sample_interval(Duration::from_millis(ms));
    }

    Ok(config)
}

fn run_replay(args: RunArgs) -> Result<(), anyhow::Error> {
    let config = build_config(&args)?;
    info!("Replaying {} with strategy selector {}", args.input.display(), config.log_strategy);

    let mut executor = Executor::new(config)?;

    let outcome = executor
        .load(&args.input)
        .and_then(|()| executor.run());

    // flush whatever was persisted even when the replay failed
    let shutdown = executor.shutdown();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            error!("✗ Replay failed: {}", e);
            if let Err(shutdown_err) = shutdown {
                warn!("Shutdown also failed: {}", shutdown_err);
            }
            return Err(e.into());
        }
    };
    let report = shutdown?;

    print_run_summary(&executor, summary, report);
    Ok(())
}

fn print_run_summary(executor: &Executor, summary: RunSummary, report: ShutdownReport) {
    let row = RunRow {
        strategy: executor.strategy_kind().to_string(),
        applied: summary.applied,
        persisted: report.strategy.persisted,
        flushes: report.strategy.flushes,
        samples: report.throughput.samples,
        interrupted: summary.interrupted,
    };
    println!("{}", Table::new([row]));

    if summary.interrupted {
        println!("Replay stopped early after {} commands", summary.applied);
    } else {
        println!("✓ Replay completed");
    }
}

fn verify_logs(dir: PathBuf, sort: bool, json: bool) -> Result<(), anyhow::Error> {
    let reports = verify_dir(&dir, sort)
        .with_context(|| format!("Failed to verify logs in {}", dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let rows: Vec<FamilyRow> = reports.iter().map(FamilyRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
