//! Scene autosave engine driven by OBS stream state.
//!
//! This crate owns the business logic of the autosaver; `scenesave-obs`
//! supplies the wire protocol underneath, and the host binary supplies
//! scene storage on top:
//!
//! - **[`Autosaver`]** — The node itself. Single writer for all session,
//!   schedule, and configuration state; the host drives it with one
//!   [`tick()`](Autosaver::tick) per application frame. Setters apply
//!   validation and side effects (debounced reconnects, immediate
//!   client toggles) at the call site.
//!
//! - **[`AutosaveScheduler`]** — Deadline arithmetic for periodic saves.
//!   Interval edits preserve the remaining countdown instead of
//!   restarting it.
//!
//! - **[`MaskedPassword`]** — Reconciles edits of a `*`-masked password
//!   field against the hidden real value.
//!
//! - **[`ChangeBroadcaster`]** — Batches property changes within one
//!   tick cycle into a single [`ChangeSet`] notification.
//!
//! - **Save collaborators** ([`SceneStore`], [`PersistentStore`],
//!   [`NotificationBus`]) — Seams the host implements; saves run as
//!   spawned tasks guarded against overlap.

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod masker;
pub mod saver;
pub mod scheduler;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broadcast::{ChangeBroadcaster, ChangeSet, Property};
pub use config::NodeConfig;
pub use controller::{Autosaver, ConnectionHandle, Connector, RECONNECT_DEBOUNCE, WsConnector};
pub use masker::MaskedPassword;
pub use saver::{NotificationBus, PersistentStore, SaveError, SaveEvent, SceneSnapshot, SceneStore};
pub use scheduler::AutosaveScheduler;
pub use session::SessionState;

// Transport types hosts need when wiring a node.
pub use scenesave_obs::{ConnectTarget, SessionEvent};
