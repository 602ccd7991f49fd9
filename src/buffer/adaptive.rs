//! Adaptive buffer depth driven by measured network quality.

use crate::types::NetworkQuality;

/// EMA weight for smoothing raw RTT and loss inputs; matches the clock's
/// offset gain so both filters settle on the same horizon.
const SMOOTHING_ALPHA: f64 = 0.1;

/// Maximum fractional change of the live depth per second.
const MAX_SLEW_PER_SEC: f64 = 0.10;

/// Multiplier applied to the live depth on underrun.
const UNDERRUN_BUMP: f64 = 1.2;

/// Seconds without an underrun before the live depth may decay.
const DECAY_HOLDOFF_SECS: f64 = 5.0;

/// Tracks a live buffer depth that chases a quality-derived target.
///
/// Raw RTT/loss observations are smoothed before the quality table is
/// consulted, so a single spike cannot flip the band and oscillate the
/// target. The live depth slews toward the target at no more than 10 % per
/// second; underruns bypass the slew with an immediate 1.2× jump, and decay
/// back down is held off for five seconds after the last underrun.
pub struct AdaptiveDepth {
    live_ms: f64,
    target_ms: f64,
    min_ms: f64,
    max_ms: f64,
    smoothed_rtt_ms: Option<f64>,
    smoothed_loss_percent: Option<f64>,
    quality: NetworkQuality,
    /// Local time of the last underrun
    last_underrun: Option<f64>,
    /// Raised while a queue sits over the pressure threshold
    pressure: bool,
    underrun_count: u64,
}

impl AdaptiveDepth {
    /// Create with the live depth resting at the `Good` band target.
    #[must_use]
    pub fn new(min_ms: f64, max_ms: f64) -> Self {
        let initial = NetworkQuality::Good.buffer_target_ms();
        Self {
            live_ms: initial,
            target_ms: initial,
            min_ms,
            max_ms: max_ms.max(min_ms),
            smoothed_rtt_ms: None,
            smoothed_loss_percent: None,
            quality: NetworkQuality::Good,
            last_underrun: None,
            pressure: false,
            underrun_count: 0,
        }
    }

    /// Feed one quality sample and advance the live depth by `dt` seconds.
    ///
    /// `t_local` is the sampling instant on the local clock; it anchors the
    /// underrun hold-off.
    pub fn observe(&mut self, rtt_ms: f64, loss_percent: f64, t_local: f64, dt: f64) {
        if !rtt_ms.is_finite() || !loss_percent.is_finite() || dt <= 0.0 {
            return;
        }

        let rtt = smooth(&mut self.smoothed_rtt_ms, rtt_ms);
        let loss = smooth(&mut self.smoothed_loss_percent, loss_percent);

        self.quality = NetworkQuality::from_metrics(rtt, loss);
        let mut target = self.quality.buffer_target_ms();
        if self.pressure {
            target = self.quality.degraded().buffer_target_ms();
        }
        self.target_ms = target.clamp(self.min_ms, self.max_ms);

        let decay_allowed = self
            .last_underrun
            .is_none_or(|at| t_local - at >= DECAY_HOLDOFF_SECS);

        let gap = self.target_ms - self.live_ms;
        if gap > 0.0 || decay_allowed {
            let max_step = self.live_ms * MAX_SLEW_PER_SEC * dt;
            let step = gap.clamp(-max_step, max_step);
            self.live_ms = (self.live_ms + step).clamp(self.min_ms, self.max_ms);
        }
    }

    /// Record an underrun: jump the live depth immediately.
    pub fn note_underrun(&mut self, t_local: f64) {
        self.underrun_count += 1;
        self.last_underrun = Some(t_local);
        self.live_ms = (self.live_ms * UNDERRUN_BUMP).clamp(self.min_ms, self.max_ms);
        tracing::warn!(
            live_ms = self.live_ms,
            "buffer underrun, widening live depth"
        );
    }

    /// Raise or clear queue-pressure: while raised, the target sits one
    /// quality band worse.
    pub fn set_pressure(&mut self, pressure: bool) {
        self.pressure = pressure;
    }

    /// Current live depth in milliseconds.
    #[must_use]
    pub fn live_ms(&self) -> f64 {
        self.live_ms
    }

    /// Current target depth in milliseconds.
    #[must_use]
    pub fn target_ms(&self) -> f64 {
        self.target_ms
    }

    /// Quality band the smoothed inputs currently map to.
    #[must_use]
    pub fn quality(&self) -> NetworkQuality {
        self.quality
    }

    /// Smoothed RTT, if any sample has arrived.
    #[must_use]
    pub fn smoothed_rtt_ms(&self) -> Option<f64> {
        self.smoothed_rtt_ms
    }

    /// Underruns recorded so far.
    #[must_use]
    pub fn underrun_count(&self) -> u64 {
        self.underrun_count
    }
}

/// EMA update seeded by the first observation.
fn smooth(state: &mut Option<f64>, raw: f64) -> f64 {
    let next = match *state {
        Some(previous) => (1.0 - SMOOTHING_ALPHA) * previous + SMOOTHING_ALPHA * raw,
        None => raw,
    };
    *state = Some(next);
    next
}
