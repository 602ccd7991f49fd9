//! The coordinator election state machine.
//!
//! Deterministic: every input carries the caller's clock reading, so the
//! machine can be driven tick by tick under test.

use std::cmp::Ordering;

use crate::types::NodeId;

use super::score::better_candidate;

/// Election role of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    /// Watching the master's heartbeats
    Follower,
    /// Gathering competing claims for the current term
    Candidate,
    /// This node is the master
    Leader,
}

/// Side effects the caller must perform after feeding the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ElectionAction {
    /// Broadcast an election claim for `term` with our `score`
    Announce {
        /// Term being contested
        term: u64,
        /// Our candidate score
        score: f64,
        /// Master we last saw, if any
        last_master: Option<NodeId>,
    },
    /// We won: broadcast `node_status { role: master }` immediately
    Promote {
        /// Term won
        term: u64,
    },
    /// We lost or yielded to a higher term
    StepDown,
}

/// FOLLOWER / CANDIDATE / LEADER machine with score-based resolution.
pub struct ElectionMachine {
    node_id: NodeId,
    state: ElectionState,
    term: u64,
    /// Our current health score
    score: f64,
    timeout_secs: f64,
    gather_secs: f64,
    /// Local time the master was last heard
    last_master_seen: f64,
    /// Set while gathering: when to resolve
    gather_deadline: Option<f64>,
    /// Best claim seen this term, ours included: (score, node)
    best_claim: Option<(f64, NodeId)>,
    current_master: Option<NodeId>,
}

impl ElectionMachine {
    /// Create a follower that considers the master alive at `now`.
    #[must_use]
    pub fn new(node_id: NodeId, score: f64, timeout_secs: f64, gather_secs: f64, now: f64) -> Self {
        Self {
            node_id,
            state: ElectionState::Follower,
            term: 0,
            score,
            timeout_secs,
            gather_secs,
            last_master_seen: now,
            gather_deadline: None,
            best_claim: None,
            current_master: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ElectionState {
        self.state
    }

    /// Current term.
    #[must_use]
    pub fn term(&self) -> u64 {
        self.term
    }

    /// Whether this node currently holds the master role.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.state == ElectionState::Leader
    }

    /// Master this node recognizes, if any.
    #[must_use]
    pub fn current_master(&self) -> Option<&NodeId> {
        self.current_master.as_ref()
    }

    /// Refresh our own health score.
    pub fn set_score(&mut self, score: f64) {
        self.score = score.clamp(0.0, 1.0);
    }

    /// A master heartbeat (or status with `role: master`) was observed.
    pub fn note_master(&mut self, master: NodeId, term: u64, now: f64) -> Vec<ElectionAction> {
        if term < self.term {
            // Stale master from an old term; ignore.
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.state == ElectionState::Leader && master != self.node_id {
            // Another master with an equal or newer term: yield.
            tracing::info!(new_master = %master, term, "leader yielding to observed master");
            actions.push(ElectionAction::StepDown);
        }

        self.term = term;
        self.state = ElectionState::Follower;
        self.gather_deadline = None;
        self.best_claim = None;
        self.current_master = Some(master);
        self.last_master_seen = now;
        actions
    }

    /// A competing election claim arrived.
    pub fn observe_claim(
        &mut self,
        candidate: &NodeId,
        score: f64,
        term: u64,
        now: f64,
    ) -> Vec<ElectionAction> {
        match term.cmp(&self.term) {
            Ordering::Less => Vec::new(), // Stale round.
            Ordering::Greater => {
                // Higher term always wins: adopt it and fall back to follower.
                let mut actions = Vec::new();
                if self.state == ElectionState::Leader {
                    actions.push(ElectionAction::StepDown);
                }
                self.term = term;
                self.state = ElectionState::Follower;
                self.gather_deadline = None;
                self.best_claim = Some((score, candidate.clone()));
                self.current_master = None;
                // An election is in progress; restart our own patience.
                self.last_master_seen = now;
                actions
            }
            Ordering::Equal => {
                if self.state == ElectionState::Candidate {
                    self.record_claim(score, candidate.clone());
                }
                Vec::new()
            }
        }
    }

    /// Advance time: start an election on master silence, resolve a gather
    /// window that has closed.
    pub fn tick(&mut self, now: f64) -> Vec<ElectionAction> {
        match self.state {
            ElectionState::Follower if now - self.last_master_seen >= self.timeout_secs => {
                self.term += 1;
                self.state = ElectionState::Candidate;
                self.gather_deadline = Some(now + self.gather_secs);
                self.best_claim = Some((self.score, self.node_id.clone()));
                let last_master = self.current_master.take();
                tracing::info!(term = self.term, score = self.score, "starting election");

                vec![ElectionAction::Announce {
                    term: self.term,
                    score: self.score,
                    last_master,
                }]
            }
            ElectionState::Candidate
                if self.gather_deadline.is_some_and(|deadline| now >= deadline) =>
            {
                self.resolve(now)
            }
            _ => Vec::new(),
        }
    }

    fn record_claim(&mut self, score: f64, candidate: NodeId) {
        let incoming = (score, candidate);
        let better = match &self.best_claim {
            Some((best_score, best_id)) => {
                better_candidate((incoming.0, &incoming.1), (*best_score, best_id))
                    == Ordering::Greater
            }
            None => true,
        };
        if better {
            self.best_claim = Some(incoming);
        }
    }

    fn resolve(&mut self, now: f64) -> Vec<ElectionAction> {
        self.gather_deadline = None;

        let won = self
            .best_claim
            .as_ref()
            .is_some_and(|(_, winner)| *winner == self.node_id);

        if won {
            self.state = ElectionState::Leader;
            self.current_master = Some(self.node_id.clone());
            tracing::info!(term = self.term, "won election");
            vec![ElectionAction::Promote { term: self.term }]
        } else {
            self.state = ElectionState::Follower;
            self.last_master_seen = now;
            tracing::info!(term = self.term, best = ?self.best_claim, "lost election");
            vec![ElectionAction::StepDown]
        }
    }
}
