//! Message shapes

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::{Codec, MediaAction, MediaFrame, MediaParams, NodeId, NodeRole, NodeStatus};

/// Common header carried by every message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Opaque message id, unique per sender
    pub id: String,
    /// Sender's clock at send time, seconds
    pub timestamp: f64,
    /// Sending node
    pub node_id: NodeId,
    /// Per-sender monotone counter
    pub sequence: u64,
}

impl MessageHeader {
    /// Create a header with a fresh random id.
    #[must_use]
    pub fn new(node_id: NodeId, sequence: u64) -> Self {
        let id: u64 = rand::thread_rng().r#gen();
        Self {
            id: format!("{id:016x}"),
            timestamp: crate::clock::local_now(),
            node_id,
            sequence,
        }
    }
}

/// Every message in the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Session handshake
    Hello(HelloMessage),
    /// Clock probe request
    ClockSync(ClockSyncMessage),
    /// Clock probe reply
    ClockSyncResponse(ClockSyncResponse),
    /// Scheduled playback command
    MediaControl(MediaControlMessage),
    /// Timed media payload
    MediaData(MediaDataMessage),
    /// Liveness and quick clock estimate
    Heartbeat(HeartbeatMessage),
    /// Periodic health report
    NodeStatus(NodeStatusMessage),
    /// Coordinator election claim
    MasterElection(MasterElectionMessage),
    /// Error report
    Error(ErrorMessage),
}

impl Message {
    /// The common header of any message.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        match self {
            Message::Hello(m) => &m.header,
            Message::ClockSync(m) => &m.header,
            Message::ClockSyncResponse(m) => &m.header,
            Message::MediaControl(m) => &m.header,
            Message::MediaData(m) => &m.header,
            Message::Heartbeat(m) => &m.header,
            Message::NodeStatus(m) => &m.header,
            Message::MasterElection(m) => &m.header,
            Message::Error(m) => &m.header,
        }
    }

    /// The wire tag of this message.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::ClockSync(_) => "clock_sync",
            Message::ClockSyncResponse(_) => "clock_sync_response",
            Message::MediaControl(_) => "media_control",
            Message::MediaData(_) => "media_data",
            Message::Heartbeat(_) => "heartbeat",
            Message::NodeStatus(_) => "node_status",
            Message::MasterElection(_) => "master_election",
            Message::Error(_) => "error",
        }
    }
}

/// Cluster topology advertised in the server's hello
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Current master, if one is elected
    pub master_id: Option<NodeId>,
    /// Warm standbys, ordered by advertised score
    pub replica_ids: Vec<NodeId>,
    /// Election term the topology belongs to
    pub term: u64,
}

/// Session handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Common header
    pub header: MessageHeader,
    /// Semver protocol version
    pub protocol_version: String,
    /// Feature names; unknown entries are ignored
    pub capabilities: Vec<String>,
    /// Role the sender intends to play
    pub node_type: NodeRole,
    /// Optional credential
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Topology, present in server hellos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,
}

/// Clock probe request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSyncMessage {
    /// Common header
    pub header: MessageHeader,
    /// Sender's local time at send
    pub t1: f64,
}

/// Clock probe reply; `t4` is observed by the receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSyncResponse {
    /// Common header
    pub header: MessageHeader,
    /// Echo of the request's send time
    pub t1: f64,
    /// Peer's clock when the request arrived
    pub t2: f64,
    /// Peer's clock when this reply left
    pub t3: f64,
}

/// Scheduled playback command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaControlMessage {
    /// Common header
    pub header: MessageHeader,
    /// What to do
    pub action: MediaAction,
    /// Target track
    pub track_id: String,
    /// Execution instant on the shared clock
    pub start_at: f64,
    /// Optional parameters
    #[serde(default)]
    pub params: MediaParams,
}

/// Timed media payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDataMessage {
    /// Common header
    pub header: MessageHeader,
    /// Target track
    pub track_id: String,
    /// Strictly increasing per track
    pub chunk_index: u64,
    /// Presentation instant on the shared clock
    pub timestamp: f64,
    /// Chunk duration in seconds
    pub duration: f64,
    /// Payload encoding
    pub codec: Codec,
    /// Encoded payload, base64 on the wire
    #[serde(with = "base64_payload")]
    pub data: Bytes,
    /// Whether decode can start here
    pub is_keyframe: bool,
}

impl MediaDataMessage {
    /// View this chunk as a schedulable frame.
    #[must_use]
    pub fn into_frame(self) -> MediaFrame {
        MediaFrame {
            track_id: self.track_id,
            sequence: self.chunk_index,
            presentation: self.timestamp,
            duration: self.duration,
            codec: self.codec,
            is_keyframe: self.is_keyframe,
            payload: self.data,
        }
    }
}

/// Liveness message; replies echo `client_time` and add `server_time`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// Common header
    pub header: MessageHeader,
    /// Sender's clock when the heartbeat left
    pub client_time: f64,
    /// Responder's clock, present in replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<f64>,
}

/// Periodic health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatusMessage {
    /// Common header
    pub header: MessageHeader,
    /// The report itself
    #[serde(flatten)]
    pub status: NodeStatus,
}

/// Coordinator election claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterElectionMessage {
    /// Common header
    pub header: MessageHeader,
    /// Opaque election round id
    pub election_id: String,
    /// Sender's health score in [0, 1]
    pub candidate_score: f64,
    /// Master the sender last saw, if any
    pub current_master: Option<NodeId>,
    /// Monotone election counter
    pub term: u64,
}

/// Error report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Common header
    pub header: MessageHeader,
    /// Wire error code
    pub code: ErrorCode,
    /// Human-readable description
    pub message: String,
    /// Optional structured context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

mod base64_payload {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
