//! # unison
//!
//! Synchronized media playback across heterogeneous endpoints.
//!
//! A coordinator broadcasts a shared virtual clock and schedules playback
//! actions against it; every endpoint disciplines its local monotonic clock
//! to the coordinator and fires scheduled audio/video/lighting events at the
//! agreed instant, typically within a few milliseconds across hundreds of
//! devices.
//!
//! ## Architecture
//!
//! - [`clock`] — the disciplined clock (offset + drift estimation from
//!   round-trip probes) and the probe driver that feeds it.
//! - [`buffer`] — the adaptive future buffer and release scheduler that sit
//!   between network jitter and the rendering deadline.
//! - [`protocol`] — the JSON wire messages and frame codec.
//! - [`session`] — handshake, command routing, heartbeats, rate limits.
//! - [`cluster`] — coordinator election, health scoring, client re-bind.
//!
//! ## Example
//!
//! ```rust
//! use unison::clock::DisciplinedClock;
//!
//! let mut clock = DisciplinedClock::new();
//! // One round-trip probe: t1/t4 on the local clock, t2/t3 on the peer's.
//! clock.submit_probe(0.0, 1000.05, 1000.05, 0.0);
//! assert!(clock.offset() > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Adaptive future buffer and release scheduling
pub mod buffer;
/// Cluster roles, election, and failover
pub mod cluster;
/// Clock discipline and sync probes
pub mod clock;
/// Error types
pub mod error;
/// Wire protocol messages and codec
pub mod protocol;
/// Rendering capability consumed by the scheduler
pub mod render;
/// Session handshake and command routing
pub mod session;
/// Test doubles and network simulation
pub mod testing;
/// Message transport seam
pub mod transport;
/// Core types
pub mod types;

// Re-exports
pub use buffer::{AdaptiveDepth, FutureBuffer, Scheduler};
pub use clock::DisciplinedClock;
pub use cluster::{ClusterView, ElectionMachine};
pub use error::{ErrorCode, SyncError};
pub use protocol::Message;
pub use render::Renderer;
pub use session::{Endpoint, Session};
pub use types::{MediaFrame, NetworkQuality, NodeId, NodeRole, SyncConfig, TrackState};

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: &str = "1.0.0";
