//! Challenge-response authentication for the OBS WebSocket handshake.
//!
//! The server's Hello frame carries a `{challenge, salt}` pair; the client
//! answers with `base64(sha256(base64(sha256(password + salt)) + challenge))`
//! in the Identify frame. Wrong passwords are not reported explicitly —
//! the server just closes the connection.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Compute the `authentication` string for an Identify frame.
///
/// Deterministic and total: an empty password is a valid input, it simply
/// produces a response the server will reject.
pub fn auth_response(password: &SecretString, salt: &str, challenge: &str) -> String {
    let secret = sha256_b64(&[password.expose_secret().as_bytes(), salt.as_bytes()]);
    sha256_b64(&[secret.as_bytes(), challenge.as_bytes()])
}

fn sha256_b64(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    BASE64.encode(hasher.finalize())
}

// ── Tests ───────────────────────────────────────────────────────────
