mod cli;
mod config;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scenesave_core::Autosaver;

use crate::cli::Cli;
use crate::store::{FilePersistentStore, FileSceneStore, LogBus, persistence_root};

/// One engine tick per frame, daemon-style.
const TICK_PERIOD: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut file_config =
        config::load(cli.config.as_deref()).context("loading configuration")?;

    // CLI overrides beat the file and the environment
    if let Some(host) = cli.host {
        file_config.use_default_connection = false;
        file_config.host = host;
    }
    if let Some(port) = cli.port {
        file_config.use_default_connection = false;
        file_config.port = port;
    }
    if let Some(interval) = cli.interval {
        file_config.save_interval_secs = interval;
    }

    anyhow::ensure!(
        cli.scene.is_file(),
        "scene document not found: {}",
        cli.scene.display()
    );

    let scene = Arc::new(FileSceneStore::new(&cli.scene, &cli.scenes_dir));
    let persistent = Arc::new(FilePersistentStore::new(persistence_root(&cli.scene)));

    let mut node = Autosaver::new(
        file_config.into_node_config(),
        scene,
        persistent,
        Arc::new(LogBus),
    );

    tracing::info!(
        scene = %cli.scene.display(),
        interval_secs = node.save_interval_secs(),
        "autosaver running"
    );

    let mut ticker = tokio::time::interval(TICK_PERIOD);
    loop {
        tokio::select! {
            _ = ticker.tick() => node.tick(),
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for shutdown signal")?;
                break;
            }
        }
    }

    tracing::info!("shutting down");
    node.shutdown();
    Ok(())
}
