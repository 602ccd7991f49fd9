//! The release scheduler: one loop from queued frames to the renderer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};

use crate::clock::{SharedClock, local_now};
use crate::render::Renderer;
use crate::types::{MediaAction, MediaFrame, SyncConfig, TrackState};

use super::actions::{ActionQueue, ScheduleOutcome, ScheduledAction};
use super::adaptive::AdaptiveDepth;
use super::future_buffer::{AdmitResult, BufferStats, FutureBuffer};

/// Telemetry and error events surfaced to the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A frame arrived past its presentation instant and was dropped
    FrameLate {
        /// Affected track
        track_id: String,
        /// Seconds past the deadline
        by: f64,
    },
    /// A frame was scheduled beyond the admission window and was dropped
    FrameTooFar {
        /// Affected track
        track_id: String,
        /// Seconds of requested lead
        lead: f64,
    },
    /// A track queue crossed the pressure threshold
    QueuePressure {
        /// Affected track
        track_id: String,
        /// Queue depth at the crossing
        depth: usize,
    },
    /// A playing track ran dry
    Underrun {
        /// Affected track
        track_id: String,
    },
    /// An action was ignored because the transition is invalid
    InvalidTransition {
        /// Affected track
        track_id: String,
        /// The ignored action
        action: MediaAction,
    },
    /// An action arrived past the best-effort window and was discarded
    ActionTooLate {
        /// Id of the discarded action
        action_id: String,
        /// Seconds past the deadline
        by: f64,
    },
}

struct SchedulerState {
    buffer: FutureBuffer,
    actions: ActionQueue,
    adaptive: AdaptiveDepth,
    /// Local time of the last quality sample
    last_quality_sample: f64,
}

/// Drives frame release against the disciplined clock.
///
/// A single loop wakes at the earliest queued instant (frame or action),
/// pops everything due, and hands frames to the renderer with a local-time
/// deadline of `now_local + (presentation − τ_now)`. Admission and control
/// entry points are synchronous and may be called from any task; they nudge
/// the loop when the earliest deadline moves.
pub struct Scheduler {
    clock: SharedClock,
    renderer: Arc<dyn Renderer>,
    state: Mutex<SchedulerState>,
    wakeup: Notify,
    events: mpsc::UnboundedSender<SchedulerEvent>,
    quality_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler and the receiving end of its event stream.
    #[must_use]
    pub fn new(
        clock: SharedClock,
        renderer: Arc<dyn Renderer>,
        config: &SyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            clock,
            renderer,
            state: Mutex::new(SchedulerState {
                buffer: FutureBuffer::new(config.max_future.as_secs_f64(), config.max_queue),
                actions: ActionQueue::new(config.late_execution_window.as_secs_f64()),
                adaptive: AdaptiveDepth::new(
                    config.buffer_min.as_secs_f64() * 1000.0,
                    config.buffer_max.as_secs_f64() * 1000.0,
                ),
                last_quality_sample: local_now(),
            }),
            wakeup: Notify::new(),
            events,
            quality_interval: config.quality_sample_interval,
        };
        (scheduler, events_rx)
    }

    /// Admit a frame from the network.
    pub fn ingest_frame(&self, frame: MediaFrame) -> AdmitResult {
        let tau_now = self.tau_now();
        let track_id = frame.track_id.clone();

        let (result, depth) = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            let result = state.buffer.admit(frame, tau_now);
            (result, state.buffer.depth(&track_id))
        };

        match result {
            AdmitResult::Late { by } => {
                self.emit(SchedulerEvent::FrameLate { track_id, by });
            }
            AdmitResult::TooFar { lead } => {
                self.emit(SchedulerEvent::FrameTooFar { track_id, lead });
            }
            AdmitResult::QueuedWithPressure => {
                self.emit(SchedulerEvent::QueuePressure { track_id, depth });
                self.wakeup.notify_one();
            }
            AdmitResult::Queued => {
                self.wakeup.notify_one();
            }
            AdmitResult::Duplicate | AdmitResult::Malformed => {}
        }
        result
    }

    /// Offer a scheduled action. Best-effort-late actions execute before
    /// this call returns.
    pub async fn schedule_action(&self, action: ScheduledAction) -> ScheduleOutcome {
        let tau_now = self.tau_now();

        let (outcome, immediate) = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            let outcome = state.actions.schedule(action.clone(), tau_now);
            (outcome, outcome == ScheduleOutcome::Immediate)
        };

        match outcome {
            ScheduleOutcome::TooLate { by } => {
                self.emit(SchedulerEvent::ActionTooLate {
                    action_id: action.id.clone(),
                    by,
                });
            }
            ScheduleOutcome::Scheduled => {
                self.wakeup.notify_one();
            }
            _ => {}
        }

        if immediate {
            self.execute_action(&action).await;
        }
        outcome
    }

    /// Current state of a track, if known.
    #[must_use]
    pub fn track_state(&self, track_id: &str) -> Option<TrackState> {
        self.state
            .lock()
            .expect("scheduler state poisoned")
            .buffer
            .track_state(track_id)
    }

    /// Live buffer depth in milliseconds.
    #[must_use]
    pub fn live_depth_ms(&self) -> f64 {
        self.state
            .lock()
            .expect("scheduler state poisoned")
            .adaptive
            .live_ms()
    }

    /// Aggregate buffer statistics.
    #[must_use]
    pub fn buffer_stats(&self) -> BufferStats {
        self.state
            .lock()
            .expect("scheduler state poisoned")
            .buffer
            .stats()
    }

    /// Cancel everything: pending actions, queued frames, device output.
    ///
    /// Called on disconnect. The disciplined clock is left untouched.
    pub async fn disconnect(&self) {
        let track_ids = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            state.actions.cancel_all();
            let ids = state.buffer.track_ids();
            state.buffer.flush();
            ids
        };

        for track_id in track_ids {
            if let Err(e) = self.renderer.stop(&track_id).await {
                tracing::warn!(track = %track_id, error = %e, "renderer stop failed");
            }
        }
    }

    /// Run the release loop until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let sleep_for = self.time_to_next_deadline();

            tokio::select! {
                () = tokio::time::sleep(sleep_for) => {}
                () = self.wakeup.notified() => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            self.tick().await;
        }

        tracing::debug!("scheduler stopped");
    }

    /// One pass: due actions, due frames, underruns, quality sampling.
    ///
    /// Public so tests can step the scheduler deterministically.
    pub async fn tick(&self) {
        let tau_now = self.tau_now();

        let due_actions = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            state.actions.pop_due(tau_now)
        };
        for action in due_actions {
            self.execute_action(&action).await;
        }

        let (due_frames, starved) = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            let frames = state.buffer.pop_due(tau_now);
            let starved = state.buffer.detect_underruns(tau_now);
            (frames, starved)
        };

        if !starved.is_empty() {
            let t_local = local_now();
            let mut state = self.state.lock().expect("scheduler state poisoned");
            for _ in &starved {
                state.adaptive.note_underrun(t_local);
            }
        }
        for track_id in starved {
            self.emit(SchedulerEvent::Underrun { track_id });
        }

        // Hand due frames over outside the lock; deadlines are local-time.
        let t_local = local_now();
        for frame in due_frames {
            let deadline_local = t_local + (frame.presentation - tau_now);
            if let Err(e) = self.renderer.submit(frame, deadline_local).await {
                tracing::warn!(error = %e, "renderer rejected frame");
            }
        }

        self.sample_quality();
    }

    /// Apply one action to the track state machine and the renderer.
    async fn execute_action(&self, action: &ScheduledAction) {
        let applied = {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            state.buffer.apply_action(&action.track_id, action.action)
        };

        match applied {
            None => {
                tracing::warn!(
                    track = %action.track_id,
                    action = ?action.action,
                    "ignoring invalid transition"
                );
                self.emit(SchedulerEvent::InvalidTransition {
                    track_id: action.track_id.clone(),
                    action: action.action,
                });
            }
            Some(_) => {
                if matches!(action.action, MediaAction::Stop | MediaAction::Unload) {
                    if let Err(e) = self.renderer.stop(&action.track_id).await {
                        tracing::warn!(track = %action.track_id, error = %e, "renderer stop failed");
                    }
                }
                self.wakeup.notify_one();
            }
        }
    }

    /// Sample network quality into the adaptive depth on its own cadence.
    fn sample_quality(&self) {
        let t_local = local_now();
        let rtt_ms = {
            let clock = self.clock.lock().expect("clock poisoned");
            clock.last_rtt().map(|rtt| rtt * 1000.0)
        };

        let mut state = self.state.lock().expect("scheduler state poisoned");
        let dt = t_local - state.last_quality_sample;
        if dt < self.quality_interval.as_secs_f64() {
            return;
        }
        state.last_quality_sample = t_local;

        let Some(rtt_ms) = rtt_ms else {
            return; // No probe has completed yet.
        };
        let loss = state.buffer.loss_percent();
        let pressure = state.buffer.under_pressure();
        state.adaptive.set_pressure(pressure);
        state.adaptive.observe(rtt_ms, loss, t_local, dt);
    }

    fn tau_now(&self) -> f64 {
        self.clock.lock().expect("clock poisoned").now()
    }

    /// Local-time delay until the earliest queued instant, capped at the
    /// quality sampling cadence.
    fn time_to_next_deadline(&self) -> Duration {
        let tau_now = self.tau_now();
        let next = {
            let state = self.state.lock().expect("scheduler state poisoned");
            match (state.buffer.next_deadline(), state.actions.next_start_at()) {
                (Some(frame), Some(action)) => Some(frame.min(action)),
                (Some(deadline), None) | (None, Some(deadline)) => Some(deadline),
                (None, None) => None,
            }
        };

        let cap = self.quality_interval;
        match next {
            Some(deadline) => {
                let delta = deadline - tau_now;
                if delta <= 0.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64(delta).min(cap)
                }
            }
            None => cap,
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        // Receiver dropping just means nobody is listening.
        let _ = self.events.send(event);
    }
}
