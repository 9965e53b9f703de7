//! # cs-daemon
//!
//! Runs the Community Streaks reconciliation pass on a weekly schedule.
//!
//! ## Usage
//!
//! ```text
//! cs-daemon serve                 # wait for each weekly tick and reconcile
//! cs-daemon run                   # reconcile once now, print the summary
//! cs-daemon run --dry-run         # same, against an in-memory copy of the store
//! cs-daemon next --count 4        # show the next firing times
//! ```
//!
//! Configuration is read from `cs-daemon.toml` (see `config.rs`); a missing
//! file means defaults.

mod config;
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cs_reconcile::{ReconcileError, ReconciliationEngine, RunSummary};
use cs_store::{DocumentStore, JsonFileStore, MemoryStore, StoreError};

use crate::config::DaemonConfig;
use crate::schedule::WeeklySchedule;

/// Community Streaks reconciliation daemon.
#[derive(Parser)]
#[command(name = "cs-daemon", version, about)]
struct Cli {
    /// Path to the daemon config file.
    #[arg(long, default_value = "cs-daemon.toml")]
    config: PathBuf,

    /// Emit JSON log lines (overrides `log.json`).
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile once, now, and print the run summary as JSON.
    Run {
        /// Reconcile an in-memory copy of the store; nothing is written back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Reconcile on every scheduled tick until interrupted.
    Serve,
    /// Print upcoming firing times.
    Next {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DaemonConfig::load_or_default(&cli.config)?;
    init_tracing(cli.log_json || config.log.json)?;

    let schedule = WeeklySchedule::from_config(&config.schedule)?;

    match cli.command {
        Commands::Run { dry_run } => run_once(&config, dry_run).await,
        Commands::Serve => serve(&config, schedule).await,
        Commands::Next { count } => {
            for at in schedule.upcoming(Utc::now(), count) {
                println!(
                    "{}  ({})",
                    at.to_rfc3339(),
                    at.with_timezone(&schedule.timezone).format("%a %Y-%m-%d %H:%M %Z")
                );
            }
            Ok(())
        }
    }
}

/// Logs go to stderr so `run` can print its summary on stdout.
fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("cs_reconcile=info".parse()?)
        .add_directive("cs_daemon=info".parse()?);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }
    Ok(())
}

fn open_store(config: &DaemonConfig) -> Result<JsonFileStore> {
    JsonFileStore::open(&config.store.path)
        .with_context(|| format!("failed to open store {}", config.store.path.display()))
}

async fn run_once(config: &DaemonConfig, dry_run: bool) -> Result<()> {
    let file_store = open_store(config)?;
    let store: Arc<dyn DocumentStore> = if dry_run {
        tracing::info!("dry run: reconciling an in-memory copy of the store");
        Arc::new(dry_run_store(&file_store).await?)
    } else {
        Arc::new(file_store)
    };

    let engine = ReconciliationEngine::new(store, config.engine_options());
    let summary = engine.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_success() {
        bail!(
            "{} of {} communities failed to reconcile",
            summary.failed.len(),
            summary.total()
        );
    }
    Ok(())
}

/// In-memory copy of the store for a dry run. Leases are dropped so a live
/// run elsewhere doesn't block the preview.
async fn dry_run_store(file_store: &JsonFileStore) -> Result<MemoryStore, StoreError> {
    let mut snapshot = file_store.snapshot().await?;
    snapshot.leases.clear();
    Ok(MemoryStore::from_snapshot(snapshot))
}

async fn serve(config: &DaemonConfig, schedule: WeeklySchedule) -> Result<()> {
    let file_store = open_store(config)?;
    tracing::info!(
        "serving streak reconciliation {} against {}",
        schedule,
        file_store.path().display()
    );

    let store: Arc<dyn DocumentStore> = Arc::new(file_store);
    let engine = ReconciliationEngine::new(store, config.engine_options());

    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next.to_rfc3339(), "waiting for next tick");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }
        }

        // A failed run is reported and the loop keeps its schedule; the next
        // tick is the next opportunity to reconcile.
        match engine.run().await {
            Ok(summary) => log_summary(&summary),
            Err(ReconcileError::LeaseHeld { key }) => {
                tracing::warn!(lease = %key, "tick skipped, another run is in progress")
            }
            Err(e) => tracing::error!("error resetting goals or updating streaks: {}", e),
        }
    }
}

fn log_summary(summary: &RunSummary) {
    for failed in &summary.failed {
        tracing::error!(
            run_id = %summary.run_id,
            community_id = %failed.community_id,
            "community not reconciled: {}",
            failed.reason
        );
    }
    tracing::info!(
        run_id = %summary.run_id,
        committed = summary.committed.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        "tick finished"
    );
}
