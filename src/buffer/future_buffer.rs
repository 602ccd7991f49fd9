//! Per-track future frame queues.

use std::collections::{BTreeMap, HashMap};

use crate::types::{MediaAction, MediaFrame, TrackState};

/// Ordering key: presentation instant, ties broken by sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameKey {
    presentation: f64,
    sequence: u64,
}

impl Eq for FrameKey {}

impl Ord for FrameKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.presentation
            .total_cmp(&other.presentation)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for FrameKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of admitting a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmitResult {
    /// Frame queued for future release
    Queued,
    /// Frame queued, but the track queue is over the pressure threshold
    QueuedWithPressure,
    /// Frame arrived past its presentation instant
    Late {
        /// Seconds past the deadline
        by: f64,
    },
    /// Frame scheduled impossibly far ahead
    TooFar {
        /// Seconds of requested lead
        lead: f64,
    },
    /// Redelivery of a frame still queued or already released
    Duplicate,
    /// Non-finite timing fields; frame discarded
    Malformed,
}

/// Aggregate buffer statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferStats {
    /// Frames accepted into queues
    pub admitted: u64,
    /// Frames dropped as late
    pub late: u64,
    /// Frames dropped as too far in the future
    pub too_far: u64,
    /// Frames dropped as duplicates
    pub duplicate: u64,
    /// Frames dropped with non-finite timing
    pub malformed: u64,
    /// Frames handed to the renderer
    pub released: u64,
    /// Underruns observed
    pub underruns: u64,
}

/// State and queue for a single track.
struct TrackQueue {
    state: TrackState,
    frames: BTreeMap<FrameKey, MediaFrame>,
    /// Lowest and highest sequences seen, for loss accounting
    min_sequence: Option<u64>,
    max_sequence: Option<u64>,
    /// Frames admitted on this track
    admitted: u64,
    /// Highest sequence already handed to the renderer
    released_sequence: Option<u64>,
    /// End of the last released frame's coverage on the shared clock
    released_until: Option<f64>,
    /// Set when an underrun has been reported and no frame has arrived since
    underrun_reported: bool,
}

impl TrackQueue {
    fn new() -> Self {
        Self {
            state: TrackState::Idle,
            frames: BTreeMap::new(),
            min_sequence: None,
            max_sequence: None,
            admitted: 0,
            released_sequence: None,
            released_until: None,
            underrun_reported: false,
        }
    }
}

/// Holds timed frames until their presentation instant arrives.
///
/// Admission enforces the late / too-far windows; release hands back frames
/// in strictly non-decreasing presentation order per track. The buffer knows
/// nothing about wall time: callers pass the shared-clock reading, which
/// keeps every decision deterministic and testable.
pub struct FutureBuffer {
    tracks: HashMap<String, TrackQueue>,
    /// Frames further ahead than this are rejected, seconds
    max_future: f64,
    /// Per-track queue length that triggers pressure
    max_queue: usize,
    stats: BufferStats,
}

impl FutureBuffer {
    /// Create a buffer with the given admission windows.
    #[must_use]
    pub fn new(max_future: f64, max_queue: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            max_future,
            max_queue: max_queue.max(1),
            stats: BufferStats::default(),
        }
    }

    /// Admit a frame given the current shared-clock reading.
    pub fn admit(&mut self, frame: MediaFrame, tau_now: f64) -> AdmitResult {
        if !frame.presentation.is_finite() || !frame.duration.is_finite() {
            self.stats.malformed += 1;
            tracing::debug!(track = %frame.track_id, "dropping frame with non-finite timing");
            return AdmitResult::Malformed;
        }

        let delta = frame.presentation - tau_now;

        if delta < 0.0 {
            self.stats.late += 1;
            tracing::debug!(
                track = %frame.track_id,
                late_ms = -delta * 1000.0,
                "dropping late frame"
            );
            return AdmitResult::Late { by: -delta };
        }

        if delta > self.max_future {
            self.stats.too_far += 1;
            tracing::debug!(
                track = %frame.track_id,
                lead_s = delta,
                "dropping frame scheduled too far ahead"
            );
            return AdmitResult::TooFar { lead: delta };
        }

        let track = self
            .tracks
            .entry(frame.track_id.clone())
            .or_insert_with(TrackQueue::new);

        // Reordered arrivals are the point of this buffer; only a redelivery
        // of a frame still queued, or one behind the release watermark, is a
        // duplicate.
        let key = FrameKey {
            presentation: frame.presentation,
            sequence: frame.sequence,
        };
        let behind_watermark = track
            .released_sequence
            .is_some_and(|released| frame.sequence <= released);
        if behind_watermark || track.frames.contains_key(&key) {
            self.stats.duplicate += 1;
            return AdmitResult::Duplicate;
        }

        track.min_sequence =
            Some(track.min_sequence.map_or(frame.sequence, |s| s.min(frame.sequence)));
        track.max_sequence =
            Some(track.max_sequence.map_or(frame.sequence, |s| s.max(frame.sequence)));
        track.admitted += 1;
        track.underrun_reported = false;
        track.frames.insert(key, frame);
        self.stats.admitted += 1;

        if track.frames.len() > self.max_queue {
            AdmitResult::QueuedWithPressure
        } else {
            AdmitResult::Queued
        }
    }

    /// Earliest queued presentation among playing tracks.
    #[must_use]
    pub fn next_deadline(&self) -> Option<f64> {
        self.tracks
            .values()
            .filter(|t| t.state.is_active())
            .filter_map(|t| t.frames.keys().next().map(|k| k.presentation))
            .min_by(f64::total_cmp)
    }

    /// Pop every frame of a playing track whose instant has arrived
    /// (`presentation ≤ tau_now`), across tracks, in presentation order.
    pub fn pop_due(&mut self, tau_now: f64) -> Vec<MediaFrame> {
        let mut due = Vec::new();

        for track in self.tracks.values_mut() {
            if !track.state.is_active() {
                continue;
            }
            while let Some(entry) = track.frames.first_entry() {
                if entry.key().presentation > tau_now {
                    break;
                }
                let frame = entry.remove();
                track.released_until = Some(frame.presentation_end());
                track.released_sequence = Some(
                    track
                        .released_sequence
                        .map_or(frame.sequence, |s| s.max(frame.sequence)),
                );
                due.push(frame);
            }
        }

        due.sort_by(|a, b| {
            a.presentation
                .total_cmp(&b.presentation)
                .then(a.sequence.cmp(&b.sequence))
        });
        self.stats.released += due.len() as u64;
        due
    }

    /// Playing tracks that have run dry past their last released frame.
    ///
    /// Each underrun is reported once; admitting a new frame rearms the
    /// check.
    pub fn detect_underruns(&mut self, tau_now: f64) -> Vec<String> {
        let mut starved = Vec::new();
        for (track_id, track) in &mut self.tracks {
            if track.state.is_active()
                && track.frames.is_empty()
                && !track.underrun_reported
                && track.released_until.is_some_and(|end| tau_now > end)
            {
                track.underrun_reported = true;
                starved.push(track_id.clone());
            }
        }
        self.stats.underruns += starved.len() as u64;
        starved
    }

    /// Apply a control action to a track's state machine.
    ///
    /// Returns the new state, or `None` if the transition is invalid (the
    /// action is ignored; the caller reports `INVALID_STATE`).
    pub fn apply_action(&mut self, track_id: &str, action: MediaAction) -> Option<TrackState> {
        if !self.tracks.contains_key(track_id) {
            // Load may introduce a track; anything else needs one.
            if action != MediaAction::Load {
                return None;
            }
            self.tracks.insert(track_id.to_string(), TrackQueue::new());
        }
        let track = self.tracks.get_mut(track_id)?;

        let next = track.state.transition(action)?;
        let previous = track.state;
        track.state = next;

        // Media preparation is the renderer's concern; loading completes
        // synchronously at this layer.
        if track.state == TrackState::Loading {
            if let Some(ready) = track.state.loaded() {
                track.state = ready;
            }
        }

        if matches!(action, MediaAction::Stop | MediaAction::Unload) {
            track.frames.clear();
            track.released_sequence = None;
            track.released_until = None;
        }
        if action == MediaAction::Unload {
            self.tracks.remove(track_id);
            tracing::info!(track = track_id, "track unloaded");
            return Some(TrackState::Idle);
        }

        let state = track.state;
        tracing::info!(track = track_id, ?previous, ?state, "track transition");
        Some(state)
    }

    /// Current state of a track, if known.
    #[must_use]
    pub fn track_state(&self, track_id: &str) -> Option<TrackState> {
        self.tracks.get(track_id).map(|t| t.state)
    }

    /// Queue depth of a track.
    #[must_use]
    pub fn depth(&self, track_id: &str) -> usize {
        self.tracks.get(track_id).map_or(0, |t| t.frames.len())
    }

    /// Whether any track's queue is over the pressure threshold.
    #[must_use]
    pub fn under_pressure(&self) -> bool {
        self.tracks.values().any(|t| t.frames.len() > self.max_queue)
    }

    /// Estimated loss across all tracks, in percent, from sequence gaps.
    #[must_use]
    pub fn loss_percent(&self) -> f64 {
        let mut expected: u64 = 0;
        let mut admitted: u64 = 0;
        for track in self.tracks.values() {
            if let (Some(min), Some(max)) = (track.min_sequence, track.max_sequence) {
                expected += max - min + 1;
                admitted += track.admitted;
            }
        }
        if expected == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = (expected - admitted.min(expected)) as f64 / expected as f64;
        ratio * 100.0
    }

    /// Track ids currently known to the buffer.
    #[must_use]
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.keys().cloned().collect()
    }

    /// Drop every queue and track; used on disconnect.
    pub fn flush(&mut self) {
        self.tracks.clear();
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.stats
    }
}
