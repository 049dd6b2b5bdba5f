//! The socket task owning one OBS WebSocket connection.
//!
//! [`ObsClient::spawn`] opens `ws://host:port` in a background task that
//! lives for exactly one connection: it answers the server's Hello with an
//! Identify frame (computing the challenge response when a password was
//! provided) and forwards session-affecting observations to the owner as
//! [`SessionEvent`]s over an mpsc channel. Connectivity failures are state,
//! not errors — a failed connect, a transport error, or a server close all
//! surface as a single [`SessionEvent::Closed`]. There is no retry here;
//! reconnect policy belongs to the owner.

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::auth::auth_response;
use crate::frames::{self, FrameError, Inbound, STREAM_STATE_CHANGED, StreamStateData};

// ── ConnectTarget ───────────────────────────────────────────────────

/// Where to connect. Both parts are kept as strings because they come
/// straight from an editable configuration surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: String,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// The WebSocket URL for this target.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for ConnectTarget {
    /// The stock obs-websocket listen address.
    fn default() -> Self {
        Self::new("localhost", "4455")
    }
}

// ── SessionEvent ────────────────────────────────────────────────────

/// Session-affecting facts observed by the socket task.
///
/// The owner drains these on its own schedule; the socket task never
/// mutates shared state directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A Hello carrying a challenge arrived; Identify was sent and the
    /// server is now judging the authentication response.
    AwaitingAuth,
    /// The server accepted the handshake.
    Identified,
    /// The streaming output started (`output_active` true) or stopped.
    StreamStateChanged { output_active: bool },
    /// The connection is gone: connect failure, transport error, or a
    /// server-initiated close. Not sent for owner-initiated shutdowns.
    Closed,
}

// ── ObsClient ───────────────────────────────────────────────────────

/// Handle to one live connection attempt.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) tears the
/// socket task down; the event receiver returned by [`spawn`](Self::spawn)
/// then yields no further events.
#[derive(Debug)]
pub struct ObsClient {
    target: ConnectTarget,
    cancel: CancellationToken,
}

impl ObsClient {
    /// Spawn the socket task for `target`.
    ///
    /// Never fails: a connection that cannot be established posts
    /// [`SessionEvent::Closed`] and the task exits. When `password` is
    /// `None`, a server challenge is answered with an Identify that omits
    /// the authentication field (the server will decide what to do with
    /// that).
    pub fn spawn(
        target: ConnectTarget,
        password: Option<SecretString>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(socket_task(
            target.clone(),
            password,
            events,
            cancel.clone(),
        ));

        (Self { target, cancel }, rx)
    }

    /// The target this client was spawned for.
    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// Tear down the socket task. Idempotent — shutting down an
    /// already-closed client is a no-op.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Socket task ─────────────────────────────────────────────────────

async fn socket_task(
    target: ConnectTarget,
    password: Option<SecretString>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let url = target.url();
    debug!(url = %url, "connecting");

    let connect = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let ws = match connect {
        Ok((ws, _response)) => ws,
        Err(e) => {
            debug!(url = %url, error = %e, "connect failed");
            let _ = events.send(SessionEvent::Closed);
            return;
        }
    };

    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Owner-initiated close: no Closed event.
                let _ = write.send(Message::Close(None)).await;
                return;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match dispatch_frame(text.as_str(), password.as_ref()) {
                        Dispatch::Reply { frame, event } => {
                            if let Some(event) = event {
                                if events.send(event).is_err() {
                                    return;
                                }
                            }
                            if let Err(e) = write.send(Message::text(frame)).await {
                                warn!(error = %e, "identify send failed");
                                let _ = events.send(SessionEvent::Closed);
                                return;
                            }
                        }
                        Dispatch::Event(event) => {
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                        Dispatch::Ignore => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("server closed the connection");
                    let _ = events.send(SessionEvent::Closed);
                    return;
                }
                // tungstenite answers pings itself; binary frames are not
                // part of this protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "transport error");
                    let _ = events.send(SessionEvent::Closed);
                    return;
                }
            }
        }
    }
}

// ── Frame dispatch ──────────────────────────────────────────────────

/// What to do with one inbound text frame.
#[derive(Debug)]
enum Dispatch {
    /// Send `frame` back, optionally after posting `event`.
    Reply {
        frame: String,
        event: Option<SessionEvent>,
    },
    /// Post an event to the owner.
    Event(SessionEvent),
    /// Drop the frame.
    Ignore,
}

/// Dispatch by op code.
///
/// Malformed payloads are dropped without touching session state — the
/// session only changes when the transport itself reports a close or
/// error.
fn dispatch_frame(text: &str, password: Option<&SecretString>) -> Dispatch {
    let inbound = match frames::parse_inbound(text) {
        Ok(inbound) => inbound,
        Err(FrameError::UnknownOp(op)) => {
            trace!(op, "ignoring frame");
            return Dispatch::Ignore;
        }
        Err(e) => {
            debug!(error = %e, "dropping malformed frame");
            return Dispatch::Ignore;
        }
    };

    match inbound {
        Inbound::Hello(hello) => match (hello.authentication, password) {
            (Some(challenge), Some(password)) => {
                let response = auth_response(password, &challenge.salt, &challenge.challenge);
                Dispatch::Reply {
                    frame: frames::identify(Some(&response)),
                    event: Some(SessionEvent::AwaitingAuth),
                }
            }
            (Some(_), None) => Dispatch::Reply {
                // challenged but no password configured; identify anyway
                // and let the server reject us
                frame: frames::identify(None),
                event: Some(SessionEvent::AwaitingAuth),
            },
            (None, _) => Dispatch::Reply {
                frame: frames::identify(None),
                event: None,
            },
        },
        Inbound::Identified => Dispatch::Event(SessionEvent::Identified),
        Inbound::Event(event) => {
            if event.event_type != STREAM_STATE_CHANGED {
                return Dispatch::Ignore;
            }
            match serde_json::from_value::<StreamStateData>(event.event_data) {
                Ok(data) => Dispatch::Event(SessionEvent::StreamStateChanged {
                    output_active: data.output_active,
                }),
                Err(e) => {
                    debug!(error = %e, "dropping event with malformed data");
                    Dispatch::Ignore
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn default_target_is_stock_obs() {
        let target = ConnectTarget::default();
        assert_eq!(target.url(), "ws://localhost:4455");
    }

    #[test]
    fn hello_with_challenge_replies_with_computed_auth() {
        let pw = password("P");
        let text = r#"{"op":0,"d":{"authentication":{"challenge":"C","salt":"S"}}}"#;

        match dispatch_frame(text, Some(&pw)) {
            Dispatch::Reply { frame, event } => {
                assert_eq!(event, Some(SessionEvent::AwaitingAuth));
                let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
                assert_eq!(value["op"], 1);
                assert_eq!(
                    value["d"]["authentication"],
                    auth_response(&pw, "S", "C").as_str()
                );
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn hello_without_challenge_replies_without_auth() {
        let text = r#"{"op":0,"d":{"rpcVersion":1}}"#;

        match dispatch_frame(text, Some(&password("P"))) {
            Dispatch::Reply { frame, event } => {
                assert_eq!(event, None);
                let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
                assert!(value["d"].get("authentication").is_none());
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn challenged_without_password_still_identifies() {
        let text = r#"{"op":0,"d":{"authentication":{"challenge":"C","salt":"S"}}}"#;

        match dispatch_frame(text, None) {
            Dispatch::Reply { frame, event } => {
                assert_eq!(event, Some(SessionEvent::AwaitingAuth));
                let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
                assert!(value["d"].get("authentication").is_none());
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn identified_frame_becomes_event() {
        let dispatch = dispatch_frame(r#"{"op":2,"d":{}}"#, None);
        assert!(matches!(
            dispatch,
            Dispatch::Event(SessionEvent::Identified)
        ));
    }

    #[test]
    fn stream_started_and_stopped_both_map() {
        let started = r#"{"op":5,"d":{"eventType":"StreamStateChanged","eventData":{"outputActive":true}}}"#;
        let stopped = r#"{"op":5,"d":{"eventType":"StreamStateChanged","eventData":{"outputActive":false}}}"#;

        assert!(matches!(
            dispatch_frame(started, None),
            Dispatch::Event(SessionEvent::StreamStateChanged {
                output_active: true
            })
        ));
        assert!(matches!(
            dispatch_frame(stopped, None),
            Dispatch::Event(SessionEvent::StreamStateChanged {
                output_active: false
            })
        ));
    }

    #[test]
    fn other_event_types_are_ignored() {
        let text = r#"{"op":5,"d":{"eventType":"RecordStateChanged","eventData":{"outputActive":true}}}"#;
        assert!(matches!(dispatch_frame(text, None), Dispatch::Ignore));
    }

    #[test]
    fn unknown_op_and_garbage_are_dropped() {
        assert!(matches!(
            dispatch_frame(r#"{"op":7,"d":{}}"#, None),
            Dispatch::Ignore
        ));
        assert!(matches!(dispatch_frame("{{nope", None), Dispatch::Ignore));
    }

    #[test]
    fn malformed_event_data_is_dropped() {
        let text = r#"{"op":5,"d":{"eventType":"StreamStateChanged","eventData":{"outputActive":"yes"}}}"#;
        assert!(matches!(dispatch_frame(text, None), Dispatch::Ignore));
    }
}
