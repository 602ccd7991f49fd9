//! Node identity, roles, and health reporting

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new random node ID
    #[must_use]
    pub fn random() -> Self {
        let id: u128 = rand::thread_rng().r#gen();
        Self(format!("{id:032x}"))
    }

    /// Create from string
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a node plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Authoritative time source and command origin
    Master,
    /// Warm standby subscribed to master state
    Replica,
    /// Subscriber only
    Client,
}

/// Network quality bands derived from RTT and packet loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    /// < 10 ms RTT, no loss
    Excellent,
    /// < 50 ms RTT, < 0.1 % loss
    Good,
    /// < 100 ms RTT, < 1 % loss
    Fair,
    /// < 200 ms RTT, < 5 % loss
    Poor,
    /// ≥ 200 ms RTT or ≥ 5 % loss
    Critical,
}

impl NetworkQuality {
    /// Classify observed RTT (milliseconds) and loss (percent)
    #[must_use]
    pub fn from_metrics(rtt_ms: f64, loss_percent: f64) -> Self {
        match (rtt_ms, loss_percent) {
            (r, l) if r < 10.0 && l == 0.0 => Self::Excellent,
            (r, l) if r < 50.0 && l < 0.1 => Self::Good,
            (r, l) if r < 100.0 && l < 1.0 => Self::Fair,
            (r, l) if r < 200.0 && l < 5.0 => Self::Poor,
            _ => Self::Critical,
        }
    }

    /// Future-buffer target for this quality band, in milliseconds
    #[must_use]
    pub fn buffer_target_ms(self) -> f64 {
        match self {
            Self::Excellent => 30.0,
            Self::Good => 80.0,
            Self::Fair => 120.0,
            Self::Poor => 180.0,
            Self::Critical => 250.0,
        }
    }

    /// Numeric score in [0, 1] used in election health scoring
    #[must_use]
    pub fn as_score(self) -> f64 {
        match self {
            Self::Excellent => 1.0,
            Self::Good => 0.75,
            Self::Fair => 0.5,
            Self::Poor => 0.25,
            Self::Critical => 0.0,
        }
    }

    /// One band worse, saturating at `Critical`
    #[must_use]
    pub fn degraded(self) -> Self {
        match self {
            Self::Excellent => Self::Good,
            Self::Good => Self::Fair,
            Self::Fair => Self::Poor,
            Self::Poor | Self::Critical => Self::Critical,
        }
    }
}

/// Periodic node health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Reporting node
    pub node_id: NodeId,
    /// Current role
    pub role: NodeRole,
    /// Sessions currently attached to this node
    pub connected_clients: u32,
    /// CPU utilisation in [0, 1]
    pub cpu: f64,
    /// Memory utilisation in [0, 1]
    pub mem: f64,
    /// Battery level in [0, 1]; present only on mobile endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    /// Observed network quality band
    pub net_quality: NetworkQuality,
    /// Average RTT in milliseconds
    #[serde(rename = "avg_rtt")]
    pub avg_rtt_ms: f64,
    /// Packet loss in percent
    #[serde(rename = "loss")]
    pub loss_percent: f64,
    /// Seconds since the node started
    pub uptime_seconds: u64,
}
