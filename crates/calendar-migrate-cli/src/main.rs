//! calendar-migrate CLI - resumable migration of legacy calendar data.

use calendar_migrate::{
    AdvanceHints, Config, MigrateError, MigrationStatus, Orchestrator, ProgressSnapshot,
    RecordType,
};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "calendar-migrate")]
#[command(about = "Resumable migration of legacy events, tickets, orders and attendees")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress snapshots as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run batches until the migration completes
    Run {
        /// Override the batch size of every phase
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Run a single batch and exit
    Step {
        /// Override the batch size of every phase
        #[arg(long)]
        batch_size: Option<usize>,

        /// Report these totals instead of counting them, e.g. events=3,tickets=1
        #[arg(long, value_parser = parse_totals)]
        totals: Option<BTreeMap<RecordType, u64>>,
    },

    /// Show job status and remaining work
    Status,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { batch_size } => {
            let cancel_token = setup_signal_handler()?;
            let mut orchestrator = Orchestrator::from_config(&config).await?;
            let hints = AdvanceHints {
                batch_size,
                ..Default::default()
            };

            let progress = cli.progress;
            let snapshot = orchestrator
                .run_to_completion(&hints, &cancel_token, |snapshot| {
                    if progress {
                        if let Ok(line) = serde_json::to_string(snapshot) {
                            eprintln!("{}", line);
                        }
                    }
                })
                .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("\nMigration completed!");
                print_snapshot(&snapshot);
            }
        }

        Commands::Step { batch_size, totals } => {
            let mut orchestrator = Orchestrator::from_config(&config).await?;
            let hints = AdvanceHints { totals, batch_size };
            let snapshot = orchestrator.advance(&hints).await?;

            if cli.progress {
                eprintln!("{}", serde_json::to_string(&snapshot)?);
            }
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }

        Commands::Status => {
            let mut orchestrator = Orchestrator::open_read_only(&config).await?;
            let report = orchestrator.status_report().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Job: {}", report.job_id);
                match report.status {
                    MigrationStatus::NotStarted => println!("  Status: not started"),
                    MigrationStatus::InProgress => println!("  Status: in progress"),
                    MigrationStatus::Complete { completed_at } => {
                        println!("  Status: complete ({})", completed_at.to_rfc3339())
                    }
                }
                println!("  Remaining:");
                for record_type in RecordType::ALL {
                    println!("    {}: {}", record_type, report.remaining.get(record_type));
                }
                println!("  Pending errors: {}", report.pending_errors);
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::open_read_only(&config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (legacy plugin): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (native calendar): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!("  State backend: {}", result.state_backend);
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

/// Parse `events=3,tickets=1` into per-type totals.
fn parse_totals(arg: &str) -> Result<BTreeMap<RecordType, u64>, String> {
    let mut totals = BTreeMap::new();
    for pair in arg.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected type=count, got '{}'", pair))?;
        let record_type: RecordType = key.trim().parse().map_err(|e: MigrateError| e.to_string())?;
        let count = value
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid count for {}: {}", key.trim(), e))?;
        totals.insert(record_type, count);
    }
    if totals.is_empty() {
        return Err("no totals given".to_string());
    }
    Ok(totals)
}

fn print_snapshot(snapshot: &ProgressSnapshot) {
    println!("  Job: {}", snapshot.job_id);
    println!("  Phase: {}", snapshot.phase.as_str());
    println!(
        "  Processed this batch: {} ({} migrated, {} skipped, {} failed)",
        snapshot.processed_this_batch,
        snapshot.batch.migrated,
        snapshot.batch.skipped,
        snapshot.batch.failed
    );
    for (record_type, total) in &snapshot.totals {
        println!("  Total {}: {}", record_type, total);
    }
    match snapshot.completed_at {
        Some(at) => println!("  Status: complete ({})", at.to_rfc3339()),
        None => println!("  Status: in progress"),
    }

    let errors = snapshot.render_errors();
    if !errors.is_empty() {
        println!("\n{}", errors);
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM. The run loop stops before
/// its next batch.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Stopping after the current batch..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Stopping after the current batch..."),
        }
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current batch...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
