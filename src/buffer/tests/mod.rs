mod adaptive;
mod future_buffer;

use bytes::Bytes;

use crate::types::{Codec, MediaFrame};

/// Opus-sized test frame.
pub(super) fn frame(track_id: &str, sequence: u64, presentation: f64) -> MediaFrame {
    MediaFrame {
        track_id: track_id.to_string(),
        sequence,
        presentation,
        duration: 0.02,
        codec: Codec::Opus,
        is_keyframe: false,
        payload: Bytes::from_static(&[0u8; 16]),
    }
}
