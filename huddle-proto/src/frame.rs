//! Builders for outbound socket frames.
//!
//! Outbound frames are fire-and-forget JSON text; callers needing guaranteed
//! delivery use the HTTP sync path instead. These builders only cover the
//! frames this layer itself originates — business screens compose their own.

use serde_json::json;
use uuid::Uuid;

/// Generate a fresh client-side message identifier.
#[must_use]
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build a direct-message text frame.
///
/// Returns the frame text and the generated message identifier, so the
/// caller can track delivery of this specific message.
#[must_use]
pub fn direct_text(tag: &str, peer_id: u64, sender_id: u64, content: &str) -> (String, String) {
    let message_id = new_message_id();
    let frame = json!({
        "type": tag,
        "enemyId": peer_id,
        "content": content,
        "messageId": message_id,
        "myId": sender_id,
    })
    .to_string();
    (frame, message_id)
}

/// Build the undelivered-fetch nudge frame.
///
/// This is a socket-side hint sent after reconnect; the authoritative fetch
/// is the authenticated HTTP call in the delivery sync layer.
#[must_use]
pub fn fetch_undelivered() -> String {
    json!({ "type": "fetchUndelivered" }).to_string()
}
