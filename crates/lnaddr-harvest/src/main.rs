//! Lightning address harvester.
//!
//! Subscribes to Nostr profile metadata on a set of relays and prints the
//! distinct lud16 Lightning addresses it finds, until enough have been found,
//! the timeout expires, or the user presses Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Built-in relay list
//! lnaddr-harvest
//!
//! # Custom relays (newline or comma separated)
//! lnaddr-harvest --relays "wss://relay.damus.io,wss://nos.lol"
//!
//! # Relays from a file, final snapshot as JSON
//! lnaddr-harvest --relays-file relays.txt --json
//! ```
//!
//! Addresses go to stdout. Logs and metrics go to stderr.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use lnaddr_core::metrics::try_init_metrics;
use lnaddr_core::{HarvestLimits, SessionSnapshot, parse_relay_list};
use lnaddr_harvest::{HarvestController, RelaySource, resolve_relay_text};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Harvest Lightning addresses from Nostr profiles.
#[derive(Parser, Debug)]
#[command(name = "lnaddr-harvest")]
#[command(about = "Collect lud16 Lightning addresses from Nostr relays", long_about = None)]
#[command(version)]
struct Args {
    /// Relay list, newline or comma separated (only wss:// entries are used)
    #[arg(long, env = "LNADDR_RELAYS")]
    relays: Option<String>,

    /// Read the relay list from a file
    #[arg(long, env = "LNADDR_RELAYS_FILE")]
    relays_file: Option<PathBuf>,

    /// Print the final snapshot as JSON instead of one address per line
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long)]
    print_metrics: bool,

    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

/// Final JSON output.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    snapshot: &'a SessionSnapshot,
    finished_at: DateTime<Utc>,
}

fn print_report(snapshot: &SessionSnapshot) -> Result<()> {
    let report = Report {
        snapshot,
        finished_at: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize snapshot")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Load .env file if it exists, then re-parse so env-backed flags see it
    if Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv))?;
        eprintln!("Loaded environment from {}", args.dotenv);
        args = Args::parse();
    }

    // Initialize tracing (stderr keeps stdout for results)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lnaddr_harvest=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let metrics_handle = if args.print_metrics {
        Some(try_init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let (relay_text, origin) =
        resolve_relay_text(args.relays.as_deref(), args.relays_file.as_deref())?;
    let endpoints = parse_relay_list(&relay_text);
    let limits = HarvestLimits::default();

    tracing::info!("Configuration:");
    tracing::info!("  Relay list: {} ({} valid)", origin.as_str(), endpoints.len());
    tracing::info!("  Max addresses: {}", limits.max_addresses);
    tracing::info!("  Timeout: {:?}", limits.timeout);
    tracing::info!("  Backfill limit: {}", limits.backfill_limit);

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        tracing::info!("Stop requested, closing subscription...");
        let _ = stop_tx.send(());
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut controller = HarvestController::new(Arc::new(RelaySource::default()), limits);
    let mut updates = controller.subscribe();

    if let Err(e) = controller.start(endpoints).await {
        let snapshot = controller.snapshot();
        if args.json {
            print_report(&snapshot)?;
        }
        tracing::error!("{}", snapshot.status_message);
        return Err(e).context("Harvest did not start");
    }

    let mut printed = 0usize;
    loop {
        tokio::select! {
            Some(()) = stop_rx.recv() => controller.stop(),

            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if !args.json {
                    for address in snapshot.addresses.iter().skip(printed) {
                        println!("{address}");
                    }
                }
                printed = snapshot.addresses.len();
                if !snapshot.running {
                    break;
                }
            }
        }
    }

    let snapshot = controller.wait().await.context("Harvest task failed")?;

    if args.json {
        print_report(&snapshot)?;
    } else {
        for address in snapshot.addresses.iter().skip(printed) {
            println!("{address}");
        }
    }

    tracing::info!(
        "{} ({} addresses from {} relays)",
        snapshot.status_message,
        snapshot.addresses.len(),
        snapshot.endpoints.len()
    );

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    Ok(())
}
