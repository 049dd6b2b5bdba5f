//! Node configuration surface.
//!
//! These types describe the initial settings of an autosaver node. The
//! host constructs a [`NodeConfig`] once; every later change goes through
//! the explicit setters on [`Autosaver`](crate::Autosaver), which perform
//! validation, side effects, and change notification at the call site.

use secrecy::SecretString;

/// Stock obs-websocket host.
pub const DEFAULT_HOST: &str = "localhost";
/// Stock obs-websocket port.
pub const DEFAULT_PORT: &str = "4455";

/// Default autosave period: two minutes.
pub const DEFAULT_SAVE_INTERVAL_SECS: f32 = 120.0;
/// Floor for the autosave period. Attempts to set below this are
/// silently clamped, never reported as an error.
pub const MIN_SAVE_INTERVAL_SECS: f32 = 1.0;
/// Ceiling for the autosave period: one day. Values above it, and
/// non-finite values, are clamped here so the period always converts
/// to a valid `Duration`.
pub const MAX_SAVE_INTERVAL_SECS: f32 = 86_400.0;

/// Initial settings for an autosaver node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Gates autosave firing.
    pub enabled: bool,
    /// Autosave period in seconds (clamped to 1.0..=86400.0).
    pub save_interval_secs: f32,
    /// Turns the OBS protocol client on or off.
    pub websocket_enabled: bool,
    /// When set, manual host/port edits are suppressed and the stock
    /// `localhost:4455` target is used.
    pub use_default_connection: bool,
    pub host: String,
    pub port: String,
    /// Whether to answer a server challenge with an authentication
    /// response (computed from the masked password).
    pub use_auth: bool,
    /// Initial password, if any. Held only for the process lifetime.
    pub password: Option<SecretString>,
    /// Additional firing gate driven by OBS stream state, independent
    /// of `enabled`.
    pub disable_while_streaming: bool,
    /// Write saves through the persistent store directly, bypassing the
    /// normal save pipeline (and its notifications/toasts).
    pub quiet_save: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            websocket_enabled: false,
            use_default_connection: true,
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT.into(),
            use_auth: false,
            password: None,
            disable_while_streaming: false,
            quiet_save: false,
        }
    }
}
