//! Client-side failover: buffer, probe replicas, resume.

use std::collections::HashMap;

use crate::protocol::{ClusterInfo, Message};
use crate::types::{NodeId, NodeRole};

/// Re-bind progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    /// Talking to a live master
    Bound,
    /// Master unreachable; probing replicas
    Probing,
}

/// Drives a client's recovery when the master goes away.
///
/// Outbound commands are buffered while unbound; known replicas are probed
/// in order of last-advertised score; the session resumes against the first
/// node that answers as master with a term at least as new as the last one
/// seen. The disciplined clock is never touched here — the new master's
/// probes converge the offset through the normal filter.
pub struct RebindManager {
    /// Last advertised score per replica
    replicas: HashMap<NodeId, f64>,
    master: Option<NodeId>,
    last_seen_term: u64,
    state: BindState,
    buffered: Vec<Message>,
}

impl RebindManager {
    /// Create a manager with no topology yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replicas: HashMap::new(),
            master: None,
            last_seen_term: 0,
            state: BindState::Bound,
            buffered: Vec::new(),
        }
    }

    /// Absorb topology from a server hello.
    pub fn update_topology(&mut self, info: &ClusterInfo) {
        self.master = info.master_id.clone();
        self.last_seen_term = self.last_seen_term.max(info.term);
        for replica in &info.replica_ids {
            self.replicas.entry(replica.clone()).or_insert(0.0);
        }
    }

    /// Absorb a node-status broadcast.
    pub fn note_status(&mut self, node_id: &NodeId, role: NodeRole, score: f64) {
        match role {
            NodeRole::Replica => {
                self.replicas.insert(node_id.clone(), score);
            }
            NodeRole::Master => {
                self.replicas.remove(node_id);
                self.master = Some(node_id.clone());
            }
            NodeRole::Client => {}
        }
    }

    /// Absorb an election term observed on the wire.
    pub fn note_term(&mut self, term: u64) {
        self.last_seen_term = self.last_seen_term.max(term);
    }

    /// The master went unreachable: start probing.
    ///
    /// Returns replicas in probe order, best advertised score first.
    pub fn master_unreachable(&mut self) -> Vec<NodeId> {
        self.state = BindState::Probing;
        tracing::warn!(
            replicas = self.replicas.len(),
            "master unreachable, probing replicas"
        );

        let mut ordered: Vec<(NodeId, f64)> = self
            .replicas
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ordered.into_iter().map(|(id, _)| id).collect()
    }

    /// Whether outbound commands should be buffered right now.
    #[must_use]
    pub fn is_probing(&self) -> bool {
        self.state == BindState::Probing
    }

    /// Hold an outbound command until a master is bound again.
    pub fn buffer_command(&mut self, message: Message) {
        self.buffered.push(message);
    }

    /// Commands waiting for a master.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// A probed node answered: resume if it claims master with a term no
    /// older than the last one seen. Returns the buffered commands to flush.
    pub fn try_resume(&mut self, node_id: &NodeId, role: NodeRole, term: u64) -> Option<Vec<Message>> {
        if role != NodeRole::Master || term < self.last_seen_term {
            return None;
        }

        self.state = BindState::Bound;
        self.master = Some(node_id.clone());
        self.last_seen_term = term;
        self.replicas.remove(node_id);
        tracing::info!(master = %node_id, term, "re-bound to new master");

        Some(std::mem::take(&mut self.buffered))
    }

    /// Master this client is bound to, if any.
    #[must_use]
    pub fn master(&self) -> Option<&NodeId> {
        self.master.as_ref()
    }

    /// Newest election term seen on the wire.
    #[must_use]
    pub fn last_seen_term(&self) -> u64 {
        self.last_seen_term
    }
}

impl Default for RebindManager {
    fn default() -> Self {
        Self::new()
    }
}
