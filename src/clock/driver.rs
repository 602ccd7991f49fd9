//! Periodic sync probe driver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::protocol::{ClockSyncMessage, ClockSyncResponse, HeartbeatMessage, Message,
    MessageHeader};
use crate::transport::MessageTransport;
use crate::types::NodeId;

use super::{SharedClock, local_now};

/// Issues four-timestamp probes at a fixed cadence and feeds replies into
/// the disciplined clock.
///
/// At most one probe is outstanding per connection; issuing the next probe
/// supersedes an unanswered one, and replies that match no outstanding `t1`
/// are dropped silently. Heartbeat replies carrying `server_time` feed the
/// clock's quick path.
pub struct ProbeDriver {
    clock: SharedClock,
    node_id: NodeId,
    interval: Duration,
    state: Mutex<DriverState>,
}

struct DriverState {
    /// The one in-flight probe: (message id, t1)
    outstanding: Option<(String, f64)>,
    sequence: u64,
}

impl ProbeDriver {
    /// Create a driver feeding `clock`.
    #[must_use]
    pub fn new(clock: SharedClock, node_id: NodeId, interval: Duration) -> Self {
        Self {
            clock,
            node_id,
            interval,
            state: Mutex::new(DriverState {
                outstanding: None,
                sequence: 0,
            }),
        }
    }

    /// Build the next probe message, superseding any unanswered one.
    #[must_use]
    pub fn next_probe(&self) -> Message {
        let mut state = self.state.lock().expect("probe state poisoned");
        state.sequence += 1;
        let header = MessageHeader::new(self.node_id.clone(), state.sequence);
        let t1 = local_now();

        if let Some((stale_id, _)) = state.outstanding.replace((header.id.clone(), t1)) {
            tracing::debug!(probe_id = %stale_id, "probe superseded without reply");
        }

        Message::ClockSync(ClockSyncMessage { header, t1 })
    }

    /// Feed a probe reply; `t4` is read from the local clock.
    ///
    /// Returns `true` if the reply matched the outstanding probe and the
    /// measurement was accepted.
    pub fn handle_response(&self, response: &ClockSyncResponse) -> bool {
        self.handle_response_at(response, local_now())
    }

    /// Feed a probe reply with an explicit receive time.
    pub fn handle_response_at(&self, response: &ClockSyncResponse, t4: f64) -> bool {
        let matched = {
            let mut state = self.state.lock().expect("probe state poisoned");
            match state.outstanding {
                Some((_, t1)) if t1.to_bits() == response.t1.to_bits() => {
                    state.outstanding = None;
                    true
                }
                _ => false,
            }
        };

        if !matched {
            tracing::debug!(t1 = response.t1, "dropping stale clock_sync_response");
            return false;
        }

        self.clock
            .lock()
            .expect("clock poisoned")
            .submit_probe(response.t1, response.t2, response.t3, t4)
    }

    /// Feed a heartbeat reply carrying `server_time`; the one-way estimate
    /// goes to the clock's low-weight quick path.
    pub fn handle_heartbeat_reply(&self, heartbeat: &HeartbeatMessage) -> bool {
        self.handle_heartbeat_reply_at(heartbeat, local_now())
    }

    /// Feed a heartbeat reply with an explicit receive time.
    pub fn handle_heartbeat_reply_at(&self, heartbeat: &HeartbeatMessage, t_now: f64) -> bool {
        let Some(server_time) = heartbeat.server_time else {
            return false;
        };

        let rtt_est = t_now - heartbeat.client_time;
        if rtt_est < 0.0 {
            return false;
        }
        let offset_est = server_time - (heartbeat.client_time + rtt_est / 2.0);

        self.clock
            .lock()
            .expect("clock poisoned")
            .submit_quick(offset_est, rtt_est)
    }

    /// Run the probe cadence until `shutdown` flips.
    ///
    /// Probes are fire-and-forget: a send failure ends the loop (the session
    /// owns reconnect), a missing reply is superseded by the next tick.
    pub async fn run(
        self: Arc<Self>,
        transport: Arc<dyn MessageTransport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let probe = self.next_probe();
                    if let Err(e) = transport.send(probe).await {
                        tracing::debug!(error = %e, "probe send failed, stopping driver");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("probe driver stopped");
    }
}
