//! Candidate health scoring.

use std::cmp::Ordering;

use crate::types::{NodeId, NodeStatus};

const W_CPU: f64 = 0.3;
const W_MEM: f64 = 0.2;
const W_NET: f64 = 0.3;
const W_BATTERY: f64 = 0.2;

/// Composite health score in [0, 1].
///
/// Mains-powered nodes count a full battery term, so a plugged-in speaker
/// outranks a phone at the same load.
#[must_use]
pub fn candidate_score(status: &NodeStatus) -> f64 {
    let cpu = status.cpu.clamp(0.0, 1.0);
    let mem = status.mem.clamp(0.0, 1.0);
    let battery = status.battery.map_or(1.0, |b| b.clamp(0.0, 1.0));

    W_CPU * (1.0 - cpu)
        + W_MEM * (1.0 - mem)
        + W_NET * status.net_quality.as_score()
        + W_BATTERY * battery
}

/// Total order over election claims: higher score wins, ties break to the
/// lowest node id. `Ordering::Greater` means `a` beats `b`.
#[must_use]
pub fn better_candidate(a: (f64, &NodeId), b: (f64, &NodeId)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1))
}
