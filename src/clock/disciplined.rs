//! The disciplined clock: an (offset, drift) estimate of shared time.

use std::collections::VecDeque;

use super::probe::ProbeSample;

/// Default capacity of the sample ring.
const DEFAULT_RING_CAPACITY: usize = 20;

/// Default EMA weight for offset fusion.
const DEFAULT_ALPHA: f64 = 0.1;

/// Default RTT rejection threshold, as a multiple of the recent median.
const DEFAULT_REJECT_MULTIPLIER: f64 = 3.0;

/// Samples required before RTT outlier rejection kicks in.
const MIN_SAMPLES_FOR_REJECT: usize = 4;

/// Floor on the rejection threshold so a zero-RTT history (loopback) cannot
/// reject every later sample.
const REJECT_FLOOR_SECS: f64 = 1e-3;

/// Window for the RTT median and the drift regression.
const FIT_WINDOW: usize = 10;

/// Minimum regression denominator; below this the fit is ill-conditioned
/// and drift is left unchanged.
const MIN_FIT_DENOMINATOR: f64 = 1e-4;

/// Local estimate of the shared virtual clock.
///
/// Maintains `(offset, drift, t_anchor)` such that
/// `τ ≈ t_local + offset + drift · (t_local − t_anchor)`. Offset fuses via a
/// fixed-gain EMA; drift comes from ordinary least squares of measured
/// offsets against receive times over the recent window.
///
/// All methods are synchronous and allocation-free beyond the ring. Samples
/// that would poison the estimate (negative or outlier RTT, non-finite
/// arithmetic) leave state unchanged.
pub struct DisciplinedClock {
    /// Additive correction, seconds
    offset: f64,
    /// Rate correction, seconds per second
    drift: f64,
    /// Local time of the last accepted sample
    t_anchor: f64,
    /// Recent accepted probes, oldest first
    samples: VecDeque<ProbeSample>,
    /// Ring capacity
    capacity: usize,
    /// EMA weight for full probes; quick samples use half
    alpha: f64,
    /// RTT rejection threshold multiplier
    reject_multiplier: f64,
    /// RTT of the most recent accepted measurement
    last_rtt: Option<f64>,
    /// Counters for telemetry
    accepted: u64,
    rejected: u64,
}

/// Snapshot of clock telemetry.
#[derive(Debug, Clone, Copy)]
pub struct ClockStats {
    /// Current offset estimate, seconds
    pub offset: f64,
    /// Current drift estimate, seconds per second
    pub drift: f64,
    /// RTT of the latest accepted measurement
    pub last_rtt: Option<f64>,
    /// Samples currently in the ring
    pub sample_count: usize,
    /// Measurements accepted since creation or reset
    pub accepted: u64,
    /// Measurements rejected since creation or reset
    pub rejected: u64,
}

impl DisciplinedClock {
    /// Create a clock with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tuning(DEFAULT_RING_CAPACITY, DEFAULT_ALPHA, DEFAULT_REJECT_MULTIPLIER)
    }

    /// Create a clock with explicit ring capacity, EMA weight, and RTT
    /// rejection multiplier.
    #[must_use]
    pub fn with_tuning(capacity: usize, alpha: f64, reject_multiplier: f64) -> Self {
        Self {
            offset: 0.0,
            drift: 0.0,
            t_anchor: 0.0,
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            alpha,
            reject_multiplier,
            last_rtt: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Current shared time estimate.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.projected(super::local_now())
    }

    /// Project a local timestamp onto the shared clock.
    #[must_use]
    pub fn projected(&self, t_local: f64) -> f64 {
        t_local + self.offset + self.drift * (t_local - self.t_anchor)
    }

    /// Current offset estimate in seconds.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Current drift estimate in seconds per second.
    #[must_use]
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// RTT of the most recent accepted measurement, seconds.
    #[must_use]
    pub fn last_rtt(&self) -> Option<f64> {
        self.last_rtt
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Telemetry snapshot.
    #[must_use]
    pub fn stats(&self) -> ClockStats {
        ClockStats {
            offset: self.offset,
            drift: self.drift,
            last_rtt: self.last_rtt,
            sample_count: self.samples.len(),
            accepted: self.accepted,
            rejected: self.rejected,
        }
    }

    /// Submit a complete four-timestamp exchange.
    ///
    /// Returns `true` if the measurement was accepted and fused.
    pub fn submit_probe(&mut self, t1: f64, t2: f64, t3: f64, t4: f64) -> bool {
        let sample = ProbeSample::from_exchange(t1, t2, t3, t4);

        if !sample.is_finite() || sample.rtt < 0.0 {
            tracing::debug!(rtt = sample.rtt, "clock: rejecting malformed probe");
            self.rejected += 1;
            return false;
        }

        if let Some(threshold) = self.reject_threshold() {
            if sample.rtt > threshold {
                tracing::debug!(
                    rtt = sample.rtt,
                    threshold,
                    "clock: rejecting probe with outlier RTT"
                );
                self.rejected += 1;
                return false;
            }
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }

        self.fuse_offset(sample.offset_meas, self.alpha);
        self.fit_drift();
        self.t_anchor = sample.t_local_recv;
        self.last_rtt = Some(sample.rtt);
        self.accepted += 1;
        true
    }

    /// Submit a heartbeat-derived one-way estimate.
    ///
    /// Quick samples are coarse: they fuse at half the probe weight and do
    /// not enter the ring, so they cannot bias the drift regression.
    pub fn submit_quick(&mut self, offset_est: f64, rtt_est: f64) -> bool {
        if !offset_est.is_finite() || !rtt_est.is_finite() || rtt_est < 0.0 {
            self.rejected += 1;
            return false;
        }

        self.fuse_offset(offset_est, self.alpha / 2.0);
        self.last_rtt = Some(rtt_est);
        self.accepted += 1;
        true
    }

    /// Zero the estimate and clear the sample ring.
    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.drift = 0.0;
        self.t_anchor = 0.0;
        self.samples.clear();
        self.last_rtt = None;
        self.accepted = 0;
        self.rejected = 0;
    }

    /// RTT threshold above which a sample is an outlier, once enough
    /// history exists.
    fn reject_threshold(&self) -> Option<f64> {
        if self.samples.len() < MIN_SAMPLES_FOR_REJECT {
            return None;
        }

        let window = self.samples.len().min(FIT_WINDOW);
        let mut rtts: Vec<f64> = self
            .samples
            .iter()
            .rev()
            .take(window)
            .map(|s| s.rtt)
            .collect();
        rtts.sort_unstable_by(f64::total_cmp);
        let median = rtts[rtts.len() / 2];

        Some((self.reject_multiplier * median).max(REJECT_FLOOR_SECS))
    }

    /// EMA fusion; commits only finite results.
    fn fuse_offset(&mut self, offset_meas: f64, alpha: f64) {
        let fused = (1.0 - alpha) * self.offset + alpha * offset_meas;
        if fused.is_finite() {
            self.offset = fused;
        }
    }

    /// Least-squares slope of measured offset against receive time over the
    /// recent window. Skipped while the ring holds fewer than three samples
    /// or the window is degenerate (all receive times equal).
    fn fit_drift(&mut self) {
        let n = self.samples.len();
        if n < 3 {
            return;
        }

        let window = n.min(FIT_WINDOW);
        let recent = self.samples.iter().skip(n - window);

        #[allow(clippy::cast_precision_loss)]
        let count = window as f64;
        let mean_x = recent.clone().map(|s| s.t_local_recv).sum::<f64>() / count;
        let mean_y = recent.clone().map(|s| s.offset_meas).sum::<f64>() / count;

        let mut sum_dx2 = 0.0;
        let mut sum_dxdy = 0.0;
        for s in recent {
            let dx = s.t_local_recv - mean_x;
            sum_dx2 += dx * dx;
            sum_dxdy += dx * (s.offset_meas - mean_y);
        }

        // Shift-invariant form of n·Σx² − (Σx)².
        let denominator = count * sum_dx2;
        if denominator < MIN_FIT_DENOMINATOR {
            return;
        }

        let slope = sum_dxdy / sum_dx2;
        if slope.is_finite() {
            self.drift = slope;
        }
    }
}

impl Default for DisciplinedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DisciplinedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisciplinedClock")
            .field("offset_ms", &(self.offset * 1000.0))
            .field("drift_ppm", &(self.drift * 1e6))
            .field("samples", &self.samples.len())
            .field("last_rtt", &self.last_rtt)
            .finish_non_exhaustive()
    }
}
