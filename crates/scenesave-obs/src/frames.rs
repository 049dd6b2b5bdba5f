//! Wire frames for the OBS WebSocket v5 control protocol.
//!
//! Every message is a JSON text frame of the shape `{"op": <int>, "d": {...}}`,
//! discriminated by op code. This client only speaks the subset it needs:
//! Hello (0), Identify (1), Identified (2), and Event (5).

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Op codes of the frames this client understands.
pub mod op {
    /// Server greeting, may carry an authentication challenge.
    pub const HELLO: u8 = 0;
    /// Client handshake response.
    pub const IDENTIFY: u8 = 1;
    /// Server acknowledgment — the session is established.
    pub const IDENTIFIED: u8 = 2;
    /// Server-pushed event.
    pub const EVENT: u8 = 5;
}

/// The single RPC version this client negotiates.
pub const RPC_VERSION: u8 = 1;

/// Event subscription bitmask sent in Identify: Outputs (bit 6),
/// which covers `StreamStateChanged`.
pub const EVENT_SUBSCRIPTIONS: u32 = 64;

/// Event type announcing that the streaming output started or stopped.
pub const STREAM_STATE_CHANGED: &str = "StreamStateChanged";

// ── Errors ──────────────────────────────────────────────────────────

/// Why an inbound text frame could not be parsed.
///
/// These never propagate past the socket task — a bad frame is logged
/// and dropped, the session is unaffected.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported op code {0}")]
    UnknownOp(u8),
}

// ── Inbound frames ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
}

/// Payload of a Hello (op 0) frame.
#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    /// Present only when the server requires authentication.
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

/// Challenge material from a Hello frame.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Payload of an Event (op 5) frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// Event data of a `StreamStateChanged` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStateData {
    pub output_active: bool,
}

/// A parsed inbound frame, discriminated by op code.
#[derive(Debug)]
pub enum Inbound {
    Hello(HelloPayload),
    Identified,
    Event(EventPayload),
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<Inbound, FrameError> {
    let frame: RawFrame = serde_json::from_str(text)?;
    match frame.op {
        op::HELLO => Ok(Inbound::Hello(serde_json::from_value(frame.d)?)),
        op::IDENTIFIED => Ok(Inbound::Identified),
        op::EVENT => Ok(Inbound::Event(serde_json::from_value(frame.d)?)),
        other => Err(FrameError::UnknownOp(other)),
    }
}

// ── Outbound frames ─────────────────────────────────────────────────

/// Serialize an Identify (op 1) frame, with or without an
/// authentication response string.
pub fn identify(authentication: Option<&str>) -> String {
    let mut d = serde_json::json!({
        "rpcVersion": RPC_VERSION,
        "eventSubscriptions": EVENT_SUBSCRIPTIONS,
    });
    if let Some(auth) = authentication {
        d["authentication"] = Value::String(auth.to_owned());
    }
    serde_json::json!({ "op": op::IDENTIFY, "d": d }).to_string()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_hello_with_challenge() {
        let text = r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1,
            "authentication":{"challenge":"abc","salt":"xyz"}}}"#;

        match parse_inbound(text).unwrap() {
            Inbound::Hello(hello) => {
                let auth = hello.authentication.unwrap();
                assert_eq!(auth.challenge, "abc");
                assert_eq!(auth.salt, "xyz");
            }
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    #[test]
    fn parse_hello_without_challenge() {
        let text = r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1}}"#;

        match parse_inbound(text).unwrap() {
            Inbound::Hello(hello) => assert!(hello.authentication.is_none()),
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    #[test]
    fn parse_identified_ignores_payload_shape() {
        let text = r#"{"op":2,"d":{"negotiatedRpcVersion":1}}"#;
        assert!(matches!(parse_inbound(text).unwrap(), Inbound::Identified));
    }

    #[test]
    fn parse_stream_state_event() {
        let text = r#"{"op":5,"d":{"eventType":"StreamStateChanged","eventIntent":64,
            "eventData":{"outputActive":true,"outputState":"OBS_WEBSOCKET_OUTPUT_STARTED"}}}"#;

        match parse_inbound(text).unwrap() {
            Inbound::Event(event) => {
                assert_eq!(event.event_type, STREAM_STATE_CHANGED);
                let data: StreamStateData = serde_json::from_value(event.event_data).unwrap();
                assert!(data.output_active);
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_rejected() {
        let result = parse_inbound(r#"{"op":9,"d":{}}"#);
        assert!(matches!(result, Err(FrameError::UnknownOp(9))));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            parse_inbound("not a frame"),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn identify_with_auth_has_exact_shape() {
        let text = identify(Some("c2VjcmV0"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["op"], 1);
        assert_eq!(value["d"]["rpcVersion"], 1);
        assert_eq!(value["d"]["authentication"], "c2VjcmV0");
        assert_eq!(value["d"]["eventSubscriptions"], 64);
    }

    #[test]
    fn identify_without_auth_omits_the_field() {
        let text = identify(None);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["op"], 1);
        assert!(value["d"].get("authentication").is_none());
        assert_eq!(value["d"]["eventSubscriptions"], 64);
    }
}
