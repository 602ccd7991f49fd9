//! Timed media frames

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Payload codecs carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// Opus audio
    Opus,
    /// 16-bit PCM audio
    Pcm16,
    /// H.264 video
    H264,
    /// VP9 video
    Vp9,
}

impl Codec {
    /// Whether this codec carries video
    #[must_use]
    pub fn is_video(self) -> bool {
        matches!(self, Codec::H264 | Codec::Vp9)
    }
}

/// A single media frame with its presentation instant on the shared clock
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Track this frame belongs to
    pub track_id: String,
    /// Strictly increasing per track
    pub sequence: u64,
    /// Presentation instant in shared virtual time, seconds
    pub presentation: f64,
    /// Frame duration in seconds
    pub duration: f64,
    /// Payload encoding
    pub codec: Codec,
    /// Whether this frame can start decode (video)
    pub is_keyframe: bool,
    /// Encoded payload
    pub payload: Bytes,
}

impl MediaFrame {
    /// End of this frame's coverage on the shared clock
    #[must_use]
    pub fn presentation_end(&self) -> f64 {
        self.presentation + self.duration
    }
}
