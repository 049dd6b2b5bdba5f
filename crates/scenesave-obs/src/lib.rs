//! Async client for the OBS WebSocket v5 control protocol.
//!
//! This crate speaks exactly the slice of the protocol a scene autosaver
//! needs: the Hello/Identify handshake (with challenge-response
//! authentication) and the `StreamStateChanged` event.
//!
//! - **[`frames`]** — wire types and op codes (0 Hello, 1 Identify,
//!   2 Identified, 5 Event).
//! - **[`auth`]** — the pure challenge-response hash.
//! - **[`socket`]** — [`ObsClient`], a background task owning one
//!   connection that forwards [`SessionEvent`]s to its owner.
//!
//! Connection policy (when to connect, reconnect, or give up) is the
//! caller's business; one `ObsClient` is one connection attempt.

pub mod auth;
pub mod frames;
pub mod socket;

pub use auth::auth_response;
pub use frames::FrameError;
pub use socket::{ConnectTarget, ObsClient, SessionEvent};
