//! Core types shared across the crate

mod config;
mod frame;
mod node;
mod track;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use frame::{Codec, MediaFrame};
pub use node::{NetworkQuality, NodeId, NodeRole, NodeStatus};
pub use track::{MediaAction, MediaParams, TrackState};
