//! Media actions, parameters, and the per-track playback state machine

use serde::{Deserialize, Serialize};

/// Commands a coordinator can schedule against a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    /// Start or resume playback
    Play,
    /// Pause playback, keeping position
    Pause,
    /// Stop playback and discard position
    Stop,
    /// Jump to `seek_position`
    Seek,
    /// Prepare a track for playback
    Load,
    /// Release a track's resources
    Unload,
}

/// Optional parameters carried by a media-control command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaParams {
    /// Playback volume in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    /// Number of times to repeat the track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<u32>,
    /// Fade-in duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_in_ms: Option<u32>,
    /// Fade-out duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_out_ms: Option<u32>,
    /// Seek target in seconds from track start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_position: Option<f64>,
}

impl MediaParams {
    /// Validate recognized keys: volume in [0, 1], seek position ≥ 0.
    ///
    /// Returns a description of the first invalid field, if any.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(v) = self.volume {
            if !(0.0..=1.0).contains(&v) || !v.is_finite() {
                return Err(format!("volume {v} outside [0, 1]"));
            }
        }
        if let Some(pos) = self.seek_position {
            if pos < 0.0 || !pos.is_finite() {
                return Err(format!("seek_position {pos} negative"));
            }
        }
        Ok(())
    }
}

/// Per-track playback state
///
/// ```text
/// idle → loading → ready → playing ⇄ paused
///                    |         \______ stopped
///                    \________________/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// No media bound
    #[default]
    Idle,
    /// Media requested, not yet ready
    Loading,
    /// Ready to start at a scheduled instant
    Ready,
    /// Emitting frames
    Playing,
    /// Suspended, position retained
    Paused,
    /// Finished or aborted
    Stopped,
}

impl TrackState {
    /// Whether frames should currently be released for this track
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, TrackState::Playing)
    }

    /// Whether the track holds media
    #[must_use]
    pub fn is_loaded(self) -> bool {
        !matches!(self, TrackState::Idle | TrackState::Loading)
    }

    /// The state an action transitions to from here.
    ///
    /// Returns `None` for invalid transitions; callers ignore the action and
    /// surface `INVALID_STATE` to the control plane.
    #[must_use]
    pub fn transition(self, action: MediaAction) -> Option<TrackState> {
        use MediaAction::{Load, Pause, Play, Seek, Stop, Unload};
        use TrackState::{Idle, Loading, Paused, Playing, Ready, Stopped};

        match (self, action) {
            (Idle, Load) => Some(Loading),
            (Ready | Paused, Play) => Some(Playing),
            (Playing, Pause) => Some(Paused),
            (Loading | Ready | Playing | Paused, Stop) => Some(Stopped),
            // Seek keeps the current state
            (Ready | Playing | Paused, Seek) => Some(self),
            (_, Unload) => Some(Idle),
            _ => None,
        }
    }

    /// Internal completion event: media finished loading
    #[must_use]
    pub fn loaded(self) -> Option<TrackState> {
        match self {
            TrackState::Loading => Some(TrackState::Ready),
            _ => None,
        }
    }
}
