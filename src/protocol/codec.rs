//! Frame codec: one JSON message per UTF-8 text frame.

use crate::error::{Result, SyncError};

use super::messages::Message;

/// Type tags this protocol understands.
const KNOWN_TYPES: &[&str] = &[
    "hello",
    "clock_sync",
    "clock_sync_response",
    "media_control",
    "media_data",
    "heartbeat",
    "node_status",
    "master_election",
    "error",
];

/// Encode a message into a single text frame.
///
/// # Errors
/// Returns [`SyncError::CodecError`] if serialization fails.
pub fn encode(message: &Message) -> Result<String> {
    serde_json::to_string(message).map_err(|e| SyncError::CodecError {
        message: e.to_string(),
    })
}

/// Decode a single text frame.
///
/// Unknown `type` tags decode to [`SyncError::UnknownMessage`] so the caller
/// can answer `INVALID_STATE` rather than dropping the frame silently.
///
/// # Errors
/// Returns [`SyncError::UnknownMessage`] for unrecognized type tags and
/// [`SyncError::CodecError`] for malformed frames.
pub fn decode(text: &str) -> Result<Message> {
    serde_json::from_str(text).map_err(|e| {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
            if let Some(tag) = value.get("type").and_then(serde_json::Value::as_str) {
                if !KNOWN_TYPES.contains(&tag) {
                    return SyncError::UnknownMessage {
                        message_type: tag.to_string(),
                    };
                }
            }
        }
        SyncError::CodecError {
            message: e.to_string(),
        }
    })
}
