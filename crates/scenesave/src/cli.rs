//! Command-line surface of the daemon.

use std::path::PathBuf;

use clap::Parser;

/// OBS-aware scene autosave daemon.
///
/// Watches a live scene document and snapshots it on a fixed interval,
/// pausing (or not) while the connected OBS instance is streaming.
#[derive(Debug, Parser)]
#[command(name = "scenesave", version, about)]
pub struct Cli {
    /// The live scene document to autosave.
    pub scene: PathBuf,

    /// Directory snapshots are written into.
    #[arg(long, default_value = "Scenes")]
    pub scenes_dir: PathBuf,

    /// Config file path (defaults to the platform config directory).
    #[arg(long, env = "SCENESAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured OBS WebSocket host.
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured OBS WebSocket port.
    #[arg(long)]
    pub port: Option<String>,

    /// Override the configured autosave interval (seconds).
    #[arg(long)]
    pub interval: Option<f32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
