//! Replay a recorded robot session against an in-memory state tree.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use neomind_robovac::config::env_vars;
use neomind_robovac::replay::{ReplayDevice, ReplayFile};
use neomind_robovac::{MemoryStateStore, RobovacSession, SessionServices};

/// Drive a robovac session from a replay file and print the state tree.
#[derive(Parser, Debug)]
#[command(name = "robovac-replay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replay file (JSON).
    file: PathBuf,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Print the state tree on one line.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = if args.verbose {
        "neomind_robovac=debug"
    } else {
        "neomind_robovac=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if env_vars::log_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let file = ReplayFile::load(&args.file)
        .with_context(|| format!("Failed to load replay file {}", args.file.display()))?;

    let store = Arc::new(MemoryStateStore::new());
    let device = Arc::new(ReplayDevice::new(&file));
    let services = SessionServices {
        store: store.clone(),
        transport: device.clone(),
        maps: device.clone(),
        consumables: device.clone(),
    };
    let session = RobovacSession::new(file.config.clone(), services)?;

    session.initialize_device_data().await?;
    for (index, payload) in file.payloads.into_iter().enumerate() {
        let changed = session.handle_status_update(payload).await?;
        tracing::info!(index, changed, "Replayed payload");
    }

    let features: Vec<&str> = session
        .enabled_features()
        .await
        .iter()
        .map(|feature| feature.as_str())
        .collect();
    tracing::info!(
        device_id = %session.device_id(),
        features = ?features,
        writes = store.write_count(),
        "Replay finished"
    );

    let snapshot = store.snapshot();
    let output = if args.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{output}");
    Ok(())
}
