//! Clock discipline against the shared virtual time base.
//!
//! Every endpoint estimates the coordinator's clock with an
//! (offset, drift) model fed by four-timestamp round-trip probes:
//!
//! ```text
//! Endpoint                       Coordinator
//!   |--- clock_sync (t1) ----------->|  (records t2)
//!   |<-- clock_sync_response --------|  (sends at t3)
//!   |  (records t4)                  |
//!   |                                |
//!   |  offset = ((t2-t1)+(t3-t4))/2  |
//!   |  rtt    = (t4-t1) - (t3-t2)    |
//! ```
//!
//! The [`DisciplinedClock`] fuses accepted probes with a fixed-gain EMA on
//! offset and a windowed least-squares fit for drift; [`ProbeDriver`] issues
//! probes on a cadence and feeds replies back in. Heartbeat replies provide
//! cheaper one-way estimates fused at half weight.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

mod disciplined;
mod driver;
mod probe;

pub use disciplined::{ClockStats, DisciplinedClock};
pub use driver::ProbeDriver;
pub use probe::ProbeSample;

#[cfg(test)]
mod tests;

/// Shared handle to a disciplined clock.
///
/// The clock is synchronous pure state; all async tasks (probe driver,
/// scheduler, session) share it behind one mutex with O(ring) critical
/// sections.
pub type SharedClock = Arc<Mutex<DisciplinedClock>>;

/// Create a shared clock with default tuning.
#[must_use]
pub fn shared_clock() -> SharedClock {
    Arc::new(Mutex::new(DisciplinedClock::new()))
}

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Local monotonic time in seconds.
///
/// All components in a process read the same origin, so timestamps are
/// directly comparable across the probe driver, scheduler, and sessions.
#[must_use]
pub fn local_now() -> f64 {
    ORIGIN.get_or_init(Instant::now).elapsed().as_secs_f64()
}
