//! Control-plane sessions: handshake, command routing, heartbeats, limits.
//!
//! [`Session`] is the coordinator side of one connection: it gates the
//! handshake, answers clock probes, validates and fans out media commands,
//! and applies per-session rate limits. [`Endpoint`] is the subscriber side:
//! it feeds probe replies to the clock, hands frames and commands to the
//! scheduler, and tracks cluster topology for failover.
//!
//! Both are sans-transport: `handle` consumes one message and returns what
//! to send, so every protocol rule is testable without sockets.

mod heartbeat;
mod rate_limit;

pub use heartbeat::HeartbeatMonitor;
pub use rate_limit::{AddressLimiter, RateLimiter};

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};

use crate::buffer::{ScheduleOutcome, ScheduledAction, Scheduler};
use crate::clock::{ProbeDriver, SharedClock, local_now};
use crate::cluster::{ClusterView, RebindManager, candidate_score};
use crate::error::{ErrorCode, Result, SyncError};
use crate::protocol::{
    ClockSyncResponse, ErrorMessage, HelloMessage, Message, MessageHeader,
};
use crate::transport::MessageTransport;
use crate::types::{NodeId, NodeRole, SyncConfig};

/// Capabilities this implementation announces.
const CAPABILITIES: &[&str] = &["audio", "video", "clock_sync", "cluster"];

/// What to do with a handled message.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Messages to send back on this session
    pub replies: Vec<Message>,
    /// Message to fan out to every subscribed session
    pub broadcast: Option<Message>,
    /// Whether the session must close after sending replies
    pub close: bool,
}

impl Dispatch {
    fn reply(message: Message) -> Self {
        Self {
            replies: vec![message],
            ..Self::default()
        }
    }

    fn none() -> Self {
        Self::default()
    }
}

struct PeerInfo {
    node_id: NodeId,
    #[allow(dead_code)] // Reported in diagnostics
    node_type: NodeRole,
    capabilities: Vec<String>,
}

/// Coordinator-side session state for one connection.
pub struct Session {
    node_id: NodeId,
    role: NodeRole,
    clock: SharedClock,
    config: SyncConfig,
    /// Expected auth token; `None` runs the session open. Real credential
    /// verification is an external collaborator.
    expected_token: Option<String>,
    cluster: ClusterView,
    peer: Option<PeerInfo>,
    clock_sync_limiter: RateLimiter,
    media_control_limiter: RateLimiter,
    heartbeat: HeartbeatMonitor,
    sequence: u64,
}

impl Session {
    /// Create a session owned by node `node_id` playing `role`.
    #[must_use]
    pub fn new(
        node_id: NodeId,
        role: NodeRole,
        clock: SharedClock,
        cluster: ClusterView,
        config: &SyncConfig,
    ) -> Self {
        Self {
            node_id,
            role,
            clock,
            expected_token: None,
            cluster,
            peer: None,
            clock_sync_limiter: RateLimiter::per_second(config.clock_sync_rate),
            media_control_limiter: RateLimiter::per_second(config.media_control_rate),
            heartbeat: HeartbeatMonitor::new(
                config.heartbeat_interval.as_secs_f64(),
                config.heartbeat_miss_limit,
                local_now(),
            ),
            config: config.clone(),
            sequence: 0,
        }
    }

    /// Require clients to present this token.
    pub fn require_token(&mut self, token: impl Into<String>) {
        self.expected_token = Some(token.into());
    }

    /// Refresh the topology advertised to new clients.
    pub fn set_cluster_view(&mut self, cluster: ClusterView) {
        self.cluster = cluster;
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.peer.is_some()
    }

    /// The peer's node id, once established.
    #[must_use]
    pub fn peer_id(&self) -> Option<&NodeId> {
        self.peer.as_ref().map(|p| &p.node_id)
    }

    /// Whether the peer's heartbeats are current.
    #[must_use]
    pub fn is_peer_healthy(&self) -> bool {
        self.heartbeat.is_healthy(local_now())
    }

    /// Decode and handle one raw frame.
    pub fn handle_frame(&mut self, text: &str) -> Dispatch {
        match crate::protocol::decode(text) {
            Ok(message) => self.handle(message),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable frame");
                Dispatch::reply(self.error_reply(e.code(), &e.to_string()))
            }
        }
    }

    /// Handle one message.
    pub fn handle(&mut self, message: Message) -> Dispatch {
        // Everything except the handshake itself requires a completed
        // handshake.
        if self.peer.is_none() && !matches!(message, Message::Hello(_)) {
            return Dispatch::reply(
                self.error_reply(ErrorCode::InvalidState, "handshake required"),
            );
        }

        match message {
            Message::Hello(hello) => self.handle_hello(hello),
            Message::ClockSync(probe) => self.handle_clock_sync(&probe),
            Message::MediaControl(control) => self.handle_media_control(control),
            Message::MediaData(data) => {
                // Relay timed media to subscribers untouched.
                Dispatch {
                    broadcast: Some(Message::MediaData(data)),
                    ..Dispatch::default()
                }
            }
            Message::Heartbeat(heartbeat) => {
                self.heartbeat.note_seen(local_now());
                if heartbeat.server_time.is_some() {
                    // Reply to a heartbeat we sent; liveness noted.
                    return Dispatch::none();
                }
                let header = self.next_header();
                Dispatch::reply(Message::Heartbeat(crate::protocol::HeartbeatMessage {
                    header,
                    client_time: heartbeat.client_time,
                    server_time: Some(self.tau_now()),
                }))
            }
            Message::NodeStatus(_) | Message::MasterElection(_) => {
                // Cluster traffic is routed by the owner of this session;
                // nothing to answer here.
                Dispatch::none()
            }
            Message::ClockSyncResponse(_) => {
                tracing::debug!("ignoring unsolicited clock_sync_response");
                Dispatch::none()
            }
            Message::Error(error) => {
                tracing::warn!(
                    code = ?error.code,
                    message = %error.message,
                    "peer reported error"
                );
                Dispatch::none()
            }
        }
    }

    fn handle_hello(&mut self, hello: HelloMessage) -> Dispatch {
        if self.peer.is_some() {
            // Second hello: refuse, session state intact.
            return Dispatch::reply(
                self.error_reply(ErrorCode::InvalidState, "session already established"),
            );
        }

        if !versions_compatible(crate::PROTOCOL_VERSION, &hello.protocol_version) {
            tracing::warn!(theirs = %hello.protocol_version, "protocol version mismatch");
            let reply = self.error_reply(
                ErrorCode::VersionMismatch,
                &format!(
                    "speaking {}, got {}",
                    crate::PROTOCOL_VERSION,
                    hello.protocol_version
                ),
            );
            return Dispatch {
                replies: vec![reply],
                close: true,
                ..Dispatch::default()
            };
        }

        if let Some(expected) = &self.expected_token {
            if hello.auth_token.as_deref() != Some(expected.as_str()) {
                let reply =
                    self.error_reply(ErrorCode::AuthRejected, "token invalid or missing");
                return Dispatch {
                    replies: vec![reply],
                    close: true,
                    ..Dispatch::default()
                };
            }
        }

        // Unknown capability names are ignored by contract.
        tracing::info!(
            peer = %hello.header.node_id,
            node_type = ?hello.node_type,
            capabilities = ?hello.capabilities,
            "session established"
        );
        self.peer = Some(PeerInfo {
            node_id: hello.header.node_id,
            node_type: hello.node_type,
            capabilities: hello.capabilities,
        });

        let header = self.next_header();
        Dispatch::reply(Message::Hello(HelloMessage {
            header,
            protocol_version: crate::PROTOCOL_VERSION.to_string(),
            capabilities: CAPABILITIES.iter().map(ToString::to_string).collect(),
            node_type: self.role,
            auth_token: None,
            cluster_info: Some(self.cluster.to_cluster_info()),
        }))
    }

    fn handle_clock_sync(&mut self, probe: &crate::protocol::ClockSyncMessage) -> Dispatch {
        if !self.clock_sync_limiter.try_acquire(local_now()) {
            return Dispatch::reply(self.rate_limit_reply("clock_sync"));
        }

        let t2 = self.tau_now();
        let header = self.next_header();
        // t3 read separately so it lands marginally after t2, matching the
        // wire contract's processing-time accounting.
        Dispatch::reply(Message::ClockSyncResponse(ClockSyncResponse {
            header,
            t1: probe.t1,
            t2,
            t3: self.tau_now(),
        }))
    }

    fn handle_media_control(
        &mut self,
        control: crate::protocol::MediaControlMessage,
    ) -> Dispatch {
        if !self.media_control_limiter.try_acquire(local_now()) {
            return Dispatch::reply(self.rate_limit_reply("media_control"));
        }

        if let Err(reason) = control.params.validate() {
            return Dispatch::reply(self.error_reply(ErrorCode::InvalidState, &reason));
        }

        let epsilon = self.config.schedule_epsilon.as_secs_f64();
        let now = self.tau_now();
        if control.start_at < now + epsilon {
            let late_by = now + epsilon - control.start_at;
            return Dispatch::reply(self.error_reply(
                ErrorCode::TooLate,
                &format!("start_at misses the {epsilon}s lead by {late_by:.3}s"),
            ));
        }

        Dispatch {
            broadcast: Some(Message::MediaControl(control)),
            ..Dispatch::default()
        }
    }

    /// Serve this session over a transport, fanning broadcasts through the
    /// shared channel all sibling sessions subscribe to.
    ///
    /// # Errors
    /// Returns [`SyncError::TransportClosed`] when the peer goes away.
    pub async fn serve(
        mut self,
        transport: Arc<dyn MessageTransport>,
        fanout: broadcast::Sender<Message>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut fanout_rx = fanout.subscribe();
        let mut heartbeat_ticker = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip it so the opening
        // heartbeat goes out one interval after the handshake.
        heartbeat_ticker.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat_ticker.tick() => {
                    if self.is_established() {
                        let heartbeat = Message::Heartbeat(crate::protocol::HeartbeatMessage {
                            header: self.next_header(),
                            client_time: local_now(),
                            server_time: None,
                        });
                        transport.send(heartbeat).await?;
                    }
                }
                incoming = transport.recv() => {
                    let Some(message) = incoming else {
                        return Err(SyncError::TransportClosed {
                            message: "peer closed".to_string(),
                        });
                    };
                    let dispatch = self.handle(message);
                    for reply in dispatch.replies {
                        transport.send(reply).await?;
                    }
                    if let Some(message) = dispatch.broadcast {
                        // No subscribers is fine.
                        let _ = fanout.send(message);
                    }
                    if dispatch.close {
                        return Ok(());
                    }
                }
                relayed = fanout_rx.recv() => {
                    if let (Ok(message), true) = (relayed, self.is_established()) {
                        transport.send(message).await?;
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn tau_now(&self) -> f64 {
        self.clock.lock().expect("clock poisoned").now()
    }

    fn next_header(&mut self) -> MessageHeader {
        self.sequence += 1;
        MessageHeader::new(self.node_id.clone(), self.sequence)
    }

    fn error_reply(&mut self, code: ErrorCode, message: &str) -> Message {
        let header = self.next_header();
        Message::Error(ErrorMessage {
            header,
            code,
            message: message.to_string(),
            details: None,
        })
    }

    fn rate_limit_reply(&mut self, class: &str) -> Message {
        let header = self.next_header();
        Message::Error(ErrorMessage {
            header,
            code: ErrorCode::RateLimited,
            message: format!("{class} rate limit exceeded"),
            details: None,
        })
    }

    /// Capability names the peer announced, once established.
    #[must_use]
    pub fn peer_capabilities(&self) -> &[String] {
        self.peer.as_ref().map_or(&[], |p| &p.capabilities)
    }
}

/// Endpoint-side message pump: clock replies to the driver, frames and
/// commands to the scheduler, topology to the re-bind manager.
pub struct Endpoint {
    node_id: NodeId,
    clock: SharedClock,
    driver: Arc<ProbeDriver>,
    scheduler: Arc<Scheduler>,
    rebind: Mutex<RebindManager>,
    master_health: Mutex<HeartbeatMonitor>,
    sequence: AtomicU64,
}

impl Endpoint {
    /// Wire an endpoint from its parts.
    #[must_use]
    pub fn new(
        node_id: NodeId,
        clock: SharedClock,
        driver: Arc<ProbeDriver>,
        scheduler: Arc<Scheduler>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            node_id,
            clock,
            driver,
            scheduler,
            rebind: Mutex::new(RebindManager::new()),
            master_health: Mutex::new(HeartbeatMonitor::new(
                config.heartbeat_interval.as_secs_f64(),
                config.heartbeat_miss_limit,
                local_now(),
            )),
            sequence: AtomicU64::new(0),
        }
    }

    /// The client hello that opens a session.
    #[must_use]
    pub fn make_hello(&self) -> Message {
        Message::Hello(HelloMessage {
            header: self.next_header(),
            protocol_version: crate::PROTOCOL_VERSION.to_string(),
            capabilities: CAPABILITIES.iter().map(ToString::to_string).collect(),
            node_type: NodeRole::Client,
            auth_token: None,
            cluster_info: None,
        })
    }

    /// A heartbeat stamped with the local clock; the reply's `server_time`
    /// feeds the quick sync path.
    #[must_use]
    pub fn make_heartbeat(&self) -> Message {
        Message::Heartbeat(crate::protocol::HeartbeatMessage {
            header: self.next_header(),
            client_time: local_now(),
            server_time: None,
        })
    }

    /// Handle one inbound message; returns replies to send.
    pub async fn handle_message(&self, message: Message) -> Vec<Message> {
        match message {
            Message::Hello(hello) => {
                if let Some(info) = &hello.cluster_info {
                    self.rebind.lock().expect("rebind lock").update_topology(info);
                }
                Vec::new()
            }
            Message::ClockSyncResponse(response) => {
                self.driver.handle_response(&response);
                Vec::new()
            }
            Message::ClockSync(probe) => {
                // Peers may probe us (replica warm-up); answer from our
                // disciplined estimate.
                let t2 = self.tau_now();
                vec![Message::ClockSyncResponse(ClockSyncResponse {
                    header: self.next_header(),
                    t1: probe.t1,
                    t2,
                    t3: self.tau_now(),
                })]
            }
            Message::Heartbeat(heartbeat) => {
                self.master_health
                    .lock()
                    .expect("health lock")
                    .note_seen(local_now());
                if heartbeat.server_time.is_some() {
                    self.driver.handle_heartbeat_reply(&heartbeat);
                    return Vec::new();
                }
                vec![Message::Heartbeat(crate::protocol::HeartbeatMessage {
                    header: self.next_header(),
                    client_time: heartbeat.client_time,
                    server_time: Some(self.tau_now()),
                })]
            }
            Message::MediaControl(control) => self.handle_media_control(control).await,
            Message::MediaData(data) => {
                self.scheduler.ingest_frame(data.into_frame());
                Vec::new()
            }
            Message::NodeStatus(status) => {
                let score = candidate_score(&status.status);
                self.rebind.lock().expect("rebind lock").note_status(
                    &status.status.node_id,
                    status.status.role,
                    score,
                );
                Vec::new()
            }
            Message::MasterElection(election) => {
                self.rebind
                    .lock()
                    .expect("rebind lock")
                    .note_term(election.term);
                Vec::new()
            }
            Message::Error(error) => {
                tracing::warn!(
                    code = ?error.code,
                    message = %error.message,
                    "coordinator reported error"
                );
                Vec::new()
            }
        }
    }

    async fn handle_media_control(
        &self,
        control: crate::protocol::MediaControlMessage,
    ) -> Vec<Message> {
        if let Err(reason) = control.params.validate() {
            return vec![Message::Error(ErrorMessage {
                header: self.next_header(),
                code: ErrorCode::InvalidState,
                message: reason,
                details: None,
            })];
        }

        let action = ScheduledAction {
            id: control.header.id.clone(),
            action: control.action,
            track_id: control.track_id.clone(),
            start_at: control.start_at,
            params: control.params,
            sequence: control.header.sequence,
        };

        match self.scheduler.schedule_action(action).await {
            ScheduleOutcome::TooLate { by } => {
                vec![Message::Error(ErrorMessage {
                    header: self.next_header(),
                    code: ErrorCode::TooLate,
                    message: format!("action {} late by {by:.3}s", control.header.id),
                    details: None,
                })]
            }
            // Duplicate delivery is idempotent by contract; everything else
            // needs no reply.
            _ => Vec::new(),
        }
    }

    /// Send heartbeats on the configured cadence until `shutdown` flips.
    ///
    /// Replies carrying `server_time` come back through
    /// [`Endpoint::handle_message`] and feed the clock's quick path.
    pub async fn run_heartbeats(
        self: Arc<Self>,
        transport: Arc<dyn MessageTransport>,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if transport.send(self.make_heartbeat()).await.is_err() {
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
    }

    /// Whether the master's heartbeats are current.
    #[must_use]
    pub fn is_master_healthy(&self) -> bool {
        self.master_health
            .lock()
            .expect("health lock")
            .is_healthy(local_now())
    }

    /// The session died: cancel scheduled work and start failover.
    ///
    /// Returns replicas in probe order. The disciplined clock keeps its
    /// estimate as a warm start for the next master.
    pub async fn disconnect(&self) -> Vec<NodeId> {
        self.scheduler.disconnect().await;
        self.rebind.lock().expect("rebind lock").master_unreachable()
    }

    /// Buffer an outbound command while probing for a new master.
    pub fn buffer_command(&self, message: Message) {
        self.rebind.lock().expect("rebind lock").buffer_command(message);
    }

    /// A probed node answered; resume if it is a fresh master. Returns
    /// buffered commands to flush to it.
    #[must_use]
    pub fn try_resume(&self, node_id: &NodeId, role: NodeRole, term: u64) -> Option<Vec<Message>> {
        self.rebind
            .lock()
            .expect("rebind lock")
            .try_resume(node_id, role, term)
    }

    /// This endpoint's node id.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn tau_now(&self) -> f64 {
        self.clock.lock().expect("clock poisoned").now()
    }

    fn next_header(&self) -> MessageHeader {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        MessageHeader::new(self.node_id.clone(), sequence)
    }
}

/// Semver compatibility: major versions must match.
fn versions_compatible(ours: &str, theirs: &str) -> bool {
    match (major_of(ours), major_of(theirs)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn major_of(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}
