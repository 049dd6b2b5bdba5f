//! The autosaver node.
//!
//! `Autosaver` is the single writer for all session, schedule, and
//! configuration state. The host drives it with one [`tick`](Autosaver::tick)
//! call per application frame; everything that happens on other tasks —
//! socket observations, expired debounce timers — reaches the node as a
//! message drained at the top of the next tick. Nothing in here blocks
//! the tick loop: connects, sends, and saves all run on spawned tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use scenesave_obs::{ConnectTarget, ObsClient, SessionEvent};

use crate::broadcast::{ChangeBroadcaster, ChangeSet, Property};
use crate::config::NodeConfig;
use crate::masker::MaskedPassword;
use crate::saver::{NotificationBus, PersistentStore, SaveContext, SceneStore, run_save};
use crate::scheduler::AutosaveScheduler;
use crate::session::SessionState;

/// How long host/port edits settle before a reconnect fires.
pub const RECONNECT_DEBOUNCE: Duration = Duration::from_secs(1);

// ── Transport seam ──────────────────────────────────────────────────

/// Creates transport connections. The production implementation wraps
/// [`ObsClient::spawn`]; tests substitute a recorder.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        target: &ConnectTarget,
        password: Option<SecretString>,
    ) -> (
        Box<dyn ConnectionHandle>,
        mpsc::UnboundedReceiver<SessionEvent>,
    );
}

/// Handle to one live transport connection.
pub trait ConnectionHandle: Send {
    fn target(&self) -> &ConnectTarget;
    /// Idempotent.
    fn shutdown(&self);
}

/// Production connector backed by `scenesave-obs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        target: &ConnectTarget,
        password: Option<SecretString>,
    ) -> (
        Box<dyn ConnectionHandle>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (client, events) = ObsClient::spawn(target.clone(), password);
        (Box::new(client), events)
    }
}

impl ConnectionHandle for ObsClient {
    fn target(&self) -> &ConnectTarget {
        ObsClient::target(self)
    }

    fn shutdown(&self) {
        ObsClient::shutdown(self);
    }
}

// ── Internal messages ───────────────────────────────────────────────

/// Connection fields with their own debounce timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DebounceField {
    Host,
    Port,
}

/// Intents posted by delayed tasks, consumed only by the tick loop.
#[derive(Debug)]
enum ControlIntent {
    /// A debounce window elapsed; reconnect to the current target.
    Reconnect,
}

// ── Autosaver ───────────────────────────────────────────────────────

/// The autosave node. See the module docs for the threading model.
pub struct Autosaver {
    connector: Arc<dyn Connector>,
    scene: Arc<dyn SceneStore>,
    persistent: Arc<dyn PersistentStore>,
    bus: Arc<dyn NotificationBus>,

    // configuration surface
    websocket_enabled: bool,
    use_default_connection: bool,
    target: ConnectTarget,
    use_auth: bool,
    quiet_save: bool,
    password: MaskedPassword,

    session: SessionState,
    connected: bool,
    scheduler: AutosaveScheduler,
    broadcaster: ChangeBroadcaster,

    conn: Option<Box<dyn ConnectionHandle>>,
    session_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,

    control_tx: mpsc::UnboundedSender<ControlIntent>,
    control_rx: mpsc::UnboundedReceiver<ControlIntent>,
    debounce: HashMap<DebounceField, JoinHandle<()>>,

    save_in_progress: Arc<AtomicBool>,
}

impl Autosaver {
    /// Build a node over the real WebSocket transport. Must be called
    /// within a Tokio runtime; connects immediately when the config has
    /// the protocol client enabled.
    pub fn new(
        config: NodeConfig,
        scene: Arc<dyn SceneStore>,
        persistent: Arc<dyn PersistentStore>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self::with_connector(config, Arc::new(WsConnector), scene, persistent, bus)
    }

    /// Build a node over a custom [`Connector`].
    pub fn with_connector(
        config: NodeConfig,
        connector: Arc<dyn Connector>,
        scene: Arc<dyn SceneStore>,
        persistent: Arc<dyn PersistentStore>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let password = config
            .password
            .as_ref()
            .map_or_else(MaskedPassword::new, MaskedPassword::from_real);

        let target = if config.use_default_connection {
            ConnectTarget::default()
        } else {
            ConnectTarget::new(config.host, config.port)
        };

        let mut node = Self {
            connector,
            scene,
            persistent,
            bus,
            websocket_enabled: config.websocket_enabled,
            use_default_connection: config.use_default_connection,
            target,
            use_auth: config.use_auth,
            quiet_save: config.quiet_save,
            password,
            session: SessionState::Disconnected,
            connected: false,
            scheduler: AutosaveScheduler::new(
                config.save_interval_secs,
                config.enabled,
                config.disable_while_streaming,
                Instant::now(),
            ),
            broadcaster: ChangeBroadcaster::new(),
            conn: None,
            session_rx: None,
            control_tx,
            control_rx,
            debounce: HashMap::new(),
            save_in_progress: Arc::new(AtomicBool::new(false)),
        };

        if node.websocket_enabled {
            node.connect();
        }
        node
    }

    // ── Observable state ────────────────────────────────────────────

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Read-only connectivity flag: the session is identified.
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn enabled(&self) -> bool {
        self.scheduler.enabled()
    }

    pub fn save_interval_secs(&self) -> f32 {
        self.scheduler.interval_secs()
    }

    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// The value the password field must display.
    pub fn password_mask(&self) -> String {
        self.password.mask()
    }

    /// Observe batched property-change notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeSet> {
        self.broadcaster.subscribe()
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Open a connection to the configured target. No-op while the
    /// protocol client is off, or while a live connection already points
    /// at the same target.
    pub fn connect(&mut self) {
        if !self.websocket_enabled {
            return;
        }
        if let Some(conn) = &self.conn {
            if conn.target() == &self.target && self.session.is_active() {
                return;
            }
        }
        self.open();
    }

    /// Close any live connection. Idempotent — disconnecting twice is a
    /// no-op, never an error.
    pub fn disconnect(&mut self) {
        self.close_conn();
        self.set_session(SessionState::Disconnected);
    }

    fn open(&mut self) {
        self.close_conn();

        let password = if self.use_auth {
            Some(self.password.real())
        } else {
            None
        };

        debug!(url = %self.target.url(), "opening connection");
        let (conn, events) = self.connector.connect(&self.target, password);
        self.conn = Some(conn);
        self.session_rx = Some(events);
        self.set_session(SessionState::Connecting);
    }

    fn close_conn(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.shutdown();
        }
        self.session_rx = None;
    }

    fn set_session(&mut self, next: SessionState) {
        if self.session == next {
            return;
        }
        debug!(from = ?self.session, to = ?next, "session transition");
        self.session = next;

        let connected = next.is_identified();
        if connected != self.connected {
            self.connected = connected;
            self.broadcaster.mark(Property::Connected);
        }
    }

    // ── Configuration surface ───────────────────────────────────────

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.scheduler.enabled() == enabled {
            return;
        }
        self.scheduler.set_enabled(enabled);
        self.broadcaster.mark(Property::Enabled);
    }

    /// Set the autosave period, clamped between one second and one day
    /// (non-finite input counts as one day). The remaining countdown is
    /// preserved, not restarted. Returns the value actually applied.
    pub fn set_save_interval(&mut self, secs: f32) -> f32 {
        let old = self.scheduler.interval_secs();
        let applied = self.scheduler.set_interval(secs, Instant::now());
        if (applied - old).abs() > f32::EPSILON {
            self.broadcaster.mark(Property::SaveInterval);
        }
        applied
    }

    /// Turn the protocol client on or off. Enabling connects at once;
    /// disabling closes at once.
    pub fn set_websocket_enabled(&mut self, enabled: bool) {
        if self.websocket_enabled == enabled {
            return;
        }
        self.websocket_enabled = enabled;
        if enabled {
            self.connect();
        } else {
            self.disconnect();
        }
    }

    /// While set, manual host/port edits are suppressed and the stock
    /// target is used.
    pub fn set_use_default_connection(&mut self, use_default: bool) {
        if self.use_default_connection == use_default {
            return;
        }
        self.use_default_connection = use_default;
        if use_default && self.target != ConnectTarget::default() {
            self.target = ConnectTarget::default();
            self.schedule_reconnect(DebounceField::Host);
        }
    }

    /// Edit the connection host. Debounced: the reconnect fires one
    /// quiet second after the last edit, and each new edit replaces any
    /// pending one (last write wins).
    pub fn set_host(&mut self, host: impl Into<String>) {
        if self.use_default_connection {
            return;
        }
        let host = host.into();
        if self.target.host == host {
            return;
        }
        self.target.host = host;
        self.schedule_reconnect(DebounceField::Host);
    }

    /// Edit the connection port. Debounced like [`set_host`](Self::set_host).
    pub fn set_port(&mut self, port: impl Into<String>) {
        if self.use_default_connection {
            return;
        }
        let port = port.into();
        if self.target.port == port {
            return;
        }
        self.target.port = port;
        self.schedule_reconnect(DebounceField::Port);
    }

    /// Whether to answer server challenges. Takes effect on the next
    /// connection.
    pub fn set_use_auth(&mut self, use_auth: bool) {
        self.use_auth = use_auth;
    }

    pub fn set_quiet_save(&mut self, quiet_save: bool) {
        self.quiet_save = quiet_save;
    }

    pub fn set_disable_while_streaming(&mut self, disable: bool) {
        self.scheduler.set_streaming_disable(disable);
    }

    /// Apply an edit of the visible password field and return the mask
    /// the field must display. A changed password invalidates any
    /// in-flight or established authentication, so the connection is
    /// dropped and reopened immediately.
    pub fn set_password(&mut self, visible: &str) -> String {
        let edit = self.password.apply_edit(visible);
        if edit.changed {
            self.broadcaster.mark(Property::Password);
            if self.websocket_enabled {
                self.open();
            }
        }
        edit.mask
    }

    fn schedule_reconnect(&mut self, field: DebounceField) {
        // last write wins: a pending timer for this field is superseded
        // without side effects
        if let Some(pending) = self.debounce.remove(&field) {
            pending.abort();
        }

        let control = self.control_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(RECONNECT_DEBOUNCE).await;
            let _ = control.send(ControlIntent::Reconnect);
        });
        self.debounce.insert(field, handle);
    }

    // ── Tick loop ───────────────────────────────────────────────────

    /// One cooperative cycle: drain intents from the socket and debounce
    /// tasks, poll the schedule, flush change notifications. Called by
    /// the host once per application frame; never blocks.
    pub fn tick(&mut self) {
        let now = Instant::now();

        while let Ok(intent) = self.control_rx.try_recv() {
            self.apply_intent(intent);
        }
        self.drain_session_events();

        if self.scheduler.poll(now) {
            self.spawn_save();
        }

        self.broadcaster.flush();
    }

    /// Trigger a save right now, outside the schedule. The regular
    /// deadline is untouched, and the in-progress guard still applies:
    /// a manual save while one is already running is skipped.
    pub fn save_now(&mut self) {
        self.spawn_save();
    }

    fn apply_intent(&mut self, intent: ControlIntent) {
        match intent {
            ControlIntent::Reconnect => {
                if !self.websocket_enabled {
                    return;
                }
                if let Some(conn) = &self.conn {
                    if conn.target() == &self.target && self.session.is_active() {
                        return;
                    }
                }
                info!(url = %self.target.url(), "reconnecting");
                self.open();
            }
        }
    }

    fn drain_session_events(&mut self) {
        let mut events = Vec::new();
        if let Some(rx) = self.session_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            self.apply_session_event(event);
        }
    }

    fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AwaitingAuth => {
                if self.session == SessionState::Connecting {
                    self.set_session(SessionState::AwaitingAuth);
                }
            }
            SessionEvent::Identified => {
                if self.session.can_identify() {
                    info!(url = %self.target.url(), "session identified");
                    self.set_session(SessionState::Identified);
                }
            }
            SessionEvent::StreamStateChanged { output_active } => {
                debug!(output_active, "stream state changed");
                self.set_enabled(!output_active);
            }
            SessionEvent::Closed => {
                self.close_conn();
                self.set_session(SessionState::Disconnected);
            }
        }
    }

    fn spawn_save(&mut self) {
        // a prior save is still running: skip this firing; the deadline
        // already advanced, so the next eligible tick fires a fresh one
        if self.save_in_progress.swap(true, Ordering::AcqRel) {
            debug!("skipping autosave, previous save still in progress");
            return;
        }

        let ctx = SaveContext {
            scene: Arc::clone(&self.scene),
            persistent: Arc::clone(&self.persistent),
            bus: Arc::clone(&self.bus),
            quiet_save: self.quiet_save,
            guard: Arc::clone(&self.save_in_progress),
        };
        tokio::spawn(run_save(ctx));
    }

    /// Tear down timers and any live connection.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.debounce.drain() {
            handle.abort();
        }
        self.disconnect();
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ───────────────────────────────────────────────────────────
