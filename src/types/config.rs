use std::time::Duration;

/// Configuration for endpoint and coordinator behavior
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between clock-sync probes (default: 1 second)
    pub probe_interval: Duration,

    /// EMA weight for offset fusion (default: 0.1)
    pub probe_alpha: f64,

    /// Capacity of the probe sample ring (default: 20)
    pub ring_capacity: usize,

    /// RTT rejection threshold as a multiple of the recent median (default: 3.0)
    pub rtt_reject_multiplier: f64,

    /// Heartbeat cadence (default: 5 seconds)
    pub heartbeat_interval: Duration,

    /// Consecutive missed heartbeats before a peer is unhealthy (default: 2)
    pub heartbeat_miss_limit: u32,

    /// Frames scheduled further ahead than this are rejected (default: 10 seconds)
    pub max_future: Duration,

    /// Per-track queue length that triggers pressure telemetry (default: 512)
    pub max_queue: usize,

    /// Cadence of network-quality sampling for the adaptive buffer (default: 200 ms)
    pub quality_sample_interval: Duration,

    /// Minimum lead time the coordinator requires on scheduled actions (default: 20 ms)
    pub schedule_epsilon: Duration,

    /// Window for best-effort execution of already-late actions (default: 100 ms)
    pub late_execution_window: Duration,

    /// Clock-sync probes accepted per second per session (default: 10)
    pub clock_sync_rate: u32,

    /// Media-control commands accepted per second per session (default: 100)
    pub media_control_rate: u32,

    /// New sessions accepted per source address (default: 10)
    pub sessions_per_address: u32,

    /// Silence from the master before an election starts (default: 3 seconds)
    pub election_timeout: Duration,

    /// How long a candidate gathers competing claims (default: 500 ms)
    pub election_gather: Duration,

    /// Node-status broadcast cadence (default: 2 seconds)
    pub status_interval: Duration,

    /// Hard floor for the live buffer depth (default: 30 ms)
    pub buffer_min: Duration,

    /// Hard ceiling for the live buffer depth (default: 500 ms)
    pub buffer_max: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(1),
            probe_alpha: 0.1,
            ring_capacity: 20,
            rtt_reject_multiplier: 3.0,
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_miss_limit: 2,
            max_future: Duration::from_secs(10),
            max_queue: 512,
            quality_sample_interval: Duration::from_millis(200),
            schedule_epsilon: Duration::from_millis(20),
            late_execution_window: Duration::from_millis(100),
            clock_sync_rate: 10,
            media_control_rate: 100,
            sessions_per_address: 10,
            election_timeout: Duration::from_secs(3),
            election_gather: Duration::from_millis(500),
            status_interval: Duration::from_secs(2),
            buffer_min: Duration::from_millis(30),
            buffer_max: Duration::from_millis(500),
        }
    }
}

impl SyncConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

/// Builder for `SyncConfig`
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the clock-sync probe interval
    #[must_use]
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Set the offset EMA weight
    #[must_use]
    pub fn probe_alpha(mut self, alpha: f64) -> Self {
        self.config.probe_alpha = alpha;
        self
    }

    /// Set the probe sample ring capacity
    #[must_use]
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.ring_capacity = capacity.max(1);
        self
    }

    /// Set the heartbeat cadence
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the furthest-future admission window
    #[must_use]
    pub fn max_future(mut self, window: Duration) -> Self {
        self.config.max_future = window;
        self
    }

    /// Set the per-track queue pressure threshold
    #[must_use]
    pub fn max_queue(mut self, frames: usize) -> Self {
        self.config.max_queue = frames.max(1);
        self
    }

    /// Set the election timeout
    #[must_use]
    pub fn election_timeout(mut self, timeout: Duration) -> Self {
        self.config.election_timeout = timeout;
        self
    }

    /// Set the candidate gather window
    #[must_use]
    pub fn election_gather(mut self, window: Duration) -> Self {
        self.config.election_gather = window;
        self
    }

    /// Set the live-buffer depth bounds
    #[must_use]
    pub fn buffer_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.config.buffer_min = min;
        self.config.buffer_max = max.max(min);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SyncConfig {
        self.config
    }
}
