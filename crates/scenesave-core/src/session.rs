//! Protocol session states.

/// Where one OBS WebSocket session is in its lifecycle.
///
/// Valid transitions: `Disconnected → Connecting` (connect),
/// `Connecting → AwaitingAuth` (challenged Hello), `Connecting |
/// AwaitingAuth → Identified` (handshake accepted), and any state
/// `→ Disconnected` (close or transport error). Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingAuth,
    Identified,
}

impl SessionState {
    /// The handshake succeeded and events are flowing.
    pub fn is_identified(self) -> bool {
        self == Self::Identified
    }

    /// A connection exists or is being established.
    pub fn is_active(self) -> bool {
        self != Self::Disconnected
    }

    /// Whether the handshake may still complete from this state.
    pub fn can_identify(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingAuth)
    }
}
