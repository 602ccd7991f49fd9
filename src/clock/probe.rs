//! Four-timestamp probe arithmetic

/// A single accepted clock measurement.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSample {
    /// Measured offset in seconds: (peer clock − local clock)
    pub offset_meas: f64,
    /// Round-trip time in seconds, network only
    pub rtt: f64,
    /// Local time the reply was received
    pub t_local_recv: f64,
}

impl ProbeSample {
    /// Compute a sample from a complete exchange.
    ///
    /// - `t1`: local send time
    /// - `t2`: peer receive time
    /// - `t3`: peer send time
    /// - `t4`: local receive time
    ///
    /// `offset = ((t2 − t1) + (t3 − t4)) / 2`, the NTP/PTP estimator, exact
    /// when the path delay is symmetric. `rtt = (t4 − t1) − (t3 − t2)`
    /// excludes peer processing time.
    #[must_use]
    pub fn from_exchange(t1: f64, t2: f64, t3: f64, t4: f64) -> Self {
        let rtt = (t4 - t1) - (t3 - t2);
        let offset_meas = ((t2 - t1) + (t3 - t4)) / 2.0;

        Self {
            offset_meas,
            rtt,
            t_local_recv: t4,
        }
    }

    /// Whether every field is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.offset_meas.is_finite() && self.rtt.is_finite() && self.t_local_recv.is_finite()
    }
}
