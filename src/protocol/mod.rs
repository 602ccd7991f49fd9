//! Wire protocol: JSON messages over a reliable framed stream.
//!
//! Every frame carries exactly one top-level message: an internally tagged
//! JSON object whose `type` field selects the shape. All timestamps on the
//! wire are seconds as IEEE-754 doubles; media payloads are base64.

mod codec;
mod messages;

pub use codec::{decode, encode};
pub use messages::{
    ClockSyncMessage, ClockSyncResponse, ClusterInfo, ErrorMessage, HeartbeatMessage,
    HelloMessage, MasterElectionMessage, MediaControlMessage, MediaDataMessage, Message,
    MessageHeader, NodeStatusMessage,
};
