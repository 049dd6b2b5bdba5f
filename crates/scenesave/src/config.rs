//! Daemon-owned configuration: a TOML file merged with `SCENESAVE_`
//! environment variables and CLI overrides, translated to the engine's
//! [`NodeConfig`]. The engine never sees these types.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scenesave_core::NodeConfig;
use scenesave_core::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SAVE_INTERVAL_SECS};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// On-disk daemon configuration. Every field has a default, so an
/// absent file yields a working (offline) node.
#[derive(Debug, Deserialize, Serialize)]
pub struct FileConfig {
    /// Gates autosave firing.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Autosave period in seconds.
    #[serde(default = "default_interval")]
    pub save_interval_secs: f32,

    /// Connect to OBS and react to stream state.
    #[serde(default)]
    pub websocket_enabled: bool,

    /// Ignore host/port below and use the stock `localhost:4455`.
    #[serde(default = "default_true")]
    pub use_default_connection: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: String,

    /// Answer server challenges with the password below.
    #[serde(default)]
    pub use_auth: bool,

    /// OBS WebSocket password (prefer `SCENESAVE_PASSWORD` over the file).
    pub password: Option<String>,

    /// Suspend autosaving while the stream output is active.
    #[serde(default)]
    pub disable_while_streaming: bool,

    /// Write snapshots directly instead of going through the save
    /// pipeline (suppresses its notifications).
    #[serde(default)]
    pub quiet_save: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_interval_secs: default_interval(),
            websocket_enabled: false,
            use_default_connection: true,
            host: default_host(),
            port: default_port(),
            use_auth: false,
            password: None,
            disable_while_streaming: false,
            quiet_save: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_interval() -> f32 {
    DEFAULT_SAVE_INTERVAL_SECS
}
fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> String {
    DEFAULT_PORT.into()
}

impl FileConfig {
    pub fn into_node_config(self) -> NodeConfig {
        NodeConfig {
            enabled: self.enabled,
            save_interval_secs: self.save_interval_secs,
            websocket_enabled: self.websocket_enabled,
            use_default_connection: self.use_default_connection,
            host: self.host,
            port: self.port,
            use_auth: self.use_auth,
            password: self.password.map(SecretString::from),
            disable_while_streaming: self.disable_while_streaming,
            quiet_save: self.quiet_save,
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "scenesave", "scenesave")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("scenesave");
            p.push("config.toml");
            p
        })
}

/// Load the config from `path` (or the platform default), layered as
/// defaults < TOML file < `SCENESAVE_` environment variables.
pub fn load(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let config = Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SCENESAVE_"))
        .extract()?;
    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
