//! Simulated links for synthesizing clock-probe exchanges.

use rand::Rng;

/// One direction of a probe's path through a simulated link.
///
/// Delays are one-way; a full exchange pays the link twice plus the peer's
/// turnaround between `t2` and `t3`.
pub struct LinkSimulator {
    /// Base one-way delay in milliseconds
    pub delay_ms: u32,
    /// Uniform one-way jitter added on top, in milliseconds
    pub jitter_ms: u32,
    /// Probability that a probe or its reply is lost
    pub loss_rate: f64,
    /// Peer processing time between receive and reply, in milliseconds
    pub turnaround_ms: u32,
}

impl LinkSimulator {
    /// Wired venue backbone: sub-millisecond and steady.
    #[must_use]
    pub fn wired() -> Self {
        Self {
            delay_ms: 1,
            jitter_ms: 1,
            loss_rate: 0.0,
            turnaround_ms: 1,
        }
    }

    /// A venue's access-point hop: tens of milliseconds with real jitter.
    #[must_use]
    pub fn venue_wifi() -> Self {
        Self {
            delay_ms: 10,
            jitter_ms: 20,
            loss_rate: 0.01,
            turnaround_ms: 1,
        }
    }

    /// A crowded floor: the conditions the adaptive buffer calls `Poor`.
    #[must_use]
    pub fn congested() -> Self {
        Self {
            delay_ms: 50,
            jitter_ms: 60,
            loss_rate: 0.05,
            turnaround_ms: 2,
        }
    }

    /// Whether this traversal loses the packet.
    #[must_use]
    pub fn should_drop(&self) -> bool {
        if self.loss_rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_bool(self.loss_rate)
    }

    /// One-way delay for a single traversal, in seconds.
    #[must_use]
    pub fn one_way_delay_secs(&self) -> f64 {
        let jitter: u32 = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        f64::from(self.delay_ms + jitter) / 1000.0
    }

    /// Synthesize a full four-timestamp exchange against a peer whose clock
    /// leads ours by `peer_offset` seconds.
    ///
    /// Returns `None` when the link drops the probe or its reply, exactly
    /// as a real driver would see it: no reply, superseded by the next
    /// probe. Asymmetry between the two traversals is what limits the
    /// offset estimator, so each direction draws its own delay.
    #[must_use]
    pub fn probe_exchange(&self, t1: f64, peer_offset: f64) -> Option<(f64, f64, f64, f64)> {
        if self.should_drop() || self.should_drop() {
            return None;
        }

        let up = self.one_way_delay_secs();
        let down = self.one_way_delay_secs();
        let turnaround = f64::from(self.turnaround_ms) / 1000.0;

        let t2 = t1 + up + peer_offset;
        let t3 = t2 + turnaround;
        let t4 = t1 + up + turnaround + down;
        Some((t1, t2, t3, t4))
    }
}
