#![allow(clippy::unwrap_used)]
// End-to-end handshake tests against an in-process obs-websocket stand-in.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use scenesave_obs::{ConnectTarget, ObsClient, SessionEvent, auth_response};

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

async fn local_target() -> (TcpListener, ConnectTarget) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, ConnectTarget::new("127.0.0.1", port.to_string()))
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed early")
}

/// Serve one connection: send Hello, capture the Identify reply, answer
/// Identified, then push a stream-started event and close.
async fn serve_handshake(
    listener: TcpListener,
    hello: serde_json::Value,
    identify_tx: oneshot::Sender<serde_json::Value>,
) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    ws.send(Message::text(hello.to_string())).await.unwrap();

    let identify = loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => break serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    };
    identify_tx.send(identify).unwrap();

    ws.send(Message::text(json!({"op": 2, "d": {}}).to_string()))
        .await
        .unwrap();
    ws.send(Message::text(
        json!({
            "op": 5,
            "d": {
                "eventType": "StreamStateChanged",
                "eventData": { "outputActive": true }
            }
        })
        .to_string(),
    ))
    .await
    .unwrap();

    ws.send(Message::Close(None)).await.unwrap();
    // drain until the client goes away
    while ws.next().await.is_some() {}
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn authenticated_handshake_end_to_end() {
    let (listener, target) = local_target().await;
    let (identify_tx, identify_rx) = oneshot::channel();

    let hello = json!({
        "op": 0,
        "d": {
            "obsWebSocketVersion": "5.1.0",
            "rpcVersion": 1,
            "authentication": { "challenge": "C", "salt": "S" }
        }
    });
    let server = tokio::spawn(serve_handshake(listener, hello, identify_tx));

    let password = SecretString::from("P".to_owned());
    let (client, mut rx) = ObsClient::spawn(target, Some(password.clone()));

    assert_eq!(recv(&mut rx).await, SessionEvent::AwaitingAuth);
    assert_eq!(recv(&mut rx).await, SessionEvent::Identified);
    assert_eq!(
        recv(&mut rx).await,
        SessionEvent::StreamStateChanged {
            output_active: true
        }
    );
    assert_eq!(recv(&mut rx).await, SessionEvent::Closed);

    let identify = timeout(WAIT, identify_rx).await.unwrap().unwrap();
    assert_eq!(identify["op"], 1);
    assert_eq!(identify["d"]["rpcVersion"], 1);
    assert_eq!(identify["d"]["eventSubscriptions"], 64);
    assert_eq!(
        identify["d"]["authentication"],
        auth_response(&password, "S", "C").as_str()
    );

    client.shutdown();
    server.await.unwrap();
}

#[tokio::test]
async fn unauthenticated_handshake_omits_auth_field() {
    let (listener, target) = local_target().await;
    let (identify_tx, identify_rx) = oneshot::channel();

    let hello = json!({ "op": 0, "d": { "rpcVersion": 1 } });
    let server = tokio::spawn(serve_handshake(listener, hello, identify_tx));

    let (client, mut rx) = ObsClient::spawn(target, None);

    // no challenge, so the session goes straight to Identified
    assert_eq!(recv(&mut rx).await, SessionEvent::Identified);

    let identify = timeout(WAIT, identify_rx).await.unwrap().unwrap();
    assert!(identify["d"].get("authentication").is_none());

    client.shutdown();
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_surfaces_as_closed() {
    let (listener, target) = local_target().await;
    drop(listener);

    let (_client, mut rx) = ObsClient::spawn(target, None);
    assert_eq!(recv(&mut rx).await, SessionEvent::Closed);
}

#[tokio::test]
async fn shutdown_is_idempotent_and_silent() {
    let (listener, target) = local_target().await;

    // keep the listener alive but never accept, so the client sits in
    // the TCP handshake until cancelled
    let (client, mut rx) = ObsClient::spawn(target, None);
    client.shutdown();
    client.shutdown();

    // owner-initiated shutdown posts nothing; the channel just closes
    let outcome = timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(outcome, None);
    drop(listener);
}
