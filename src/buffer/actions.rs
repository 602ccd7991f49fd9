//! Scheduled-action queue.

use std::collections::HashSet;

use crate::types::{MediaAction, MediaParams};

/// A time-referenced control command awaiting execution.
#[derive(Debug, Clone)]
pub struct ScheduledAction {
    /// Originator-assigned id; replays of the same id are no-ops
    pub id: String,
    /// What to do
    pub action: MediaAction,
    /// Target track
    pub track_id: String,
    /// Execution instant on the shared clock
    pub start_at: f64,
    /// Optional parameters
    pub params: MediaParams,
    /// Header sequence; breaks same-instant ties, higher wins
    pub sequence: u64,
}

/// Result of offering an action to the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleOutcome {
    /// Queued for execution at `start_at`
    Scheduled,
    /// Past its instant but inside the best-effort window; execute now
    Immediate,
    /// Past the best-effort window; discarded
    TooLate {
        /// Seconds past the deadline
        by: f64,
    },
    /// Id already seen; idempotent no-op
    Duplicate,
    /// Another action holds the same track and instant with a higher
    /// sequence; discarded
    Superseded,
}

/// Orders actions by `start_at` and serializes same-instant conflicts.
///
/// Actions for one track execute in `start_at` order regardless of arrival
/// order; two actions sharing a track and instant resolve to the higher
/// header sequence. Executed ids are remembered so a redelivered command
/// cannot fire twice.
pub struct ActionQueue {
    pending: Vec<ScheduledAction>,
    seen_ids: HashSet<String>,
    /// Best-effort window for late arrivals, seconds
    late_window: f64,
}

impl ActionQueue {
    /// Create a queue with the given best-effort late window.
    #[must_use]
    pub fn new(late_window: f64) -> Self {
        Self {
            pending: Vec::new(),
            seen_ids: HashSet::new(),
            late_window,
        }
    }

    /// Offer an action given the current shared-clock reading.
    pub fn schedule(&mut self, action: ScheduledAction, tau_now: f64) -> ScheduleOutcome {
        if self.seen_ids.contains(&action.id) {
            return ScheduleOutcome::Duplicate;
        }

        let late_by = tau_now - action.start_at;
        if late_by > self.late_window {
            tracing::warn!(
                action_id = %action.id,
                late_ms = late_by * 1000.0,
                "discarding action past its execution window"
            );
            return ScheduleOutcome::TooLate { by: late_by };
        }

        self.seen_ids.insert(action.id.clone());

        if late_by > 0.0 {
            // Still close enough to run best-effort right away.
            return ScheduleOutcome::Immediate;
        }

        // Same track, same instant: higher header sequence wins.
        if let Some(existing) = self.pending.iter_mut().find(|p| {
            p.track_id == action.track_id && p.start_at.to_bits() == action.start_at.to_bits()
        }) {
            if action.sequence > existing.sequence {
                *existing = action;
                return ScheduleOutcome::Scheduled;
            }
            return ScheduleOutcome::Superseded;
        }

        self.pending.push(action);
        ScheduleOutcome::Scheduled
    }

    /// Earliest pending execution instant.
    #[must_use]
    pub fn next_start_at(&self) -> Option<f64> {
        self.pending
            .iter()
            .map(|a| a.start_at)
            .min_by(f64::total_cmp)
    }

    /// Remove and return every action due at `tau_now`, ordered by
    /// `(start_at, sequence)`.
    pub fn pop_due(&mut self, tau_now: f64) -> Vec<ScheduledAction> {
        let mut due: Vec<ScheduledAction> = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());

        for action in self.pending.drain(..) {
            if action.start_at <= tau_now {
                due.push(action);
            } else {
                remaining.push(action);
            }
        }
        self.pending = remaining;

        due.sort_by(|a, b| {
            a.start_at
                .total_cmp(&b.start_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        due
    }

    /// Number of actions waiting.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending action; used on disconnect. Seen ids survive so
    /// redelivery after reconnect stays idempotent.
    pub fn cancel_all(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            tracing::info!(dropped, "cancelled pending scheduled actions");
        }
    }
}
