//! Cluster roles, coordinator election, and client failover.
//!
//! One master is the authoritative time source and command origin; replicas
//! are warm standbys, clients subscribe. When the master's heartbeats stop,
//! replicas race through a score-based election:
//!
//! ```text
//! FOLLOWER --(no master heartbeat for T_timeout)--> CANDIDATE
//! CANDIDATE --(gather T_gather, highest score)----> LEADER
//! CANDIDATE --(better claim seen)-----------------> FOLLOWER
//! any ------(higher term observed)----------------> FOLLOWER
//! ```
//!
//! Clients re-bind by probing replicas in score order and never reset their
//! disciplined clock; the first probes to the new master converge the offset
//! through the normal filter.

mod election;
mod rebind;
mod score;

pub use election::{ElectionAction, ElectionMachine, ElectionState};
pub use rebind::RebindManager;
pub use score::{better_candidate, candidate_score};

#[cfg(test)]
mod tests;

use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::protocol::{ClusterInfo, Message, NodeStatusMessage};
use crate::types::NodeId;

/// A coordinator's view of cluster membership.
#[derive(Debug, Clone, Default)]
pub struct ClusterView {
    /// Elected master; `None` only during an election
    pub master_id: Option<NodeId>,
    /// Warm standbys, ordered by advertised score, best first
    pub replica_ids: Vec<NodeId>,
    /// Election term this view belongs to
    pub term: u64,
    /// Configuration epoch, bumped on membership changes
    pub epoch: u64,
}

impl ClusterView {
    /// Whether the cluster has a settled master.
    #[must_use]
    pub fn is_steady(&self) -> bool {
        self.master_id.is_some()
    }

    /// The topology summary carried in server hellos.
    #[must_use]
    pub fn to_cluster_info(&self) -> ClusterInfo {
        ClusterInfo {
            master_id: self.master_id.clone(),
            replica_ids: self.replica_ids.clone(),
            term: self.term,
        }
    }
}

/// Broadcast this node's health report on a fixed cadence until `shutdown`
/// flips.
///
/// `make_status` is sampled at each tick so the report carries fresh load
/// and network figures; peers feed the reports into election scoring and
/// replica probe ordering.
pub async fn run_status_broadcast<F>(
    mut make_status: F,
    fanout: broadcast::Sender<Message>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FnMut() -> NodeStatusMessage + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // No subscribers is fine.
                let _ = fanout.send(Message::NodeStatus(make_status()));
            }
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
