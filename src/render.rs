//! The rendering capability consumed by the scheduler.
//!
//! One seam covers native audio, DMX lighting, and UI animation: the
//! scheduler hands each due frame to a `Renderer` together with a local-time
//! deadline, and fine-grained alignment (audio-clock steering, lamp latency)
//! is the renderer's business.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::MediaFrame;

/// Emits media frames at local-time deadlines.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Submit a frame for emission at `deadline_local` (seconds on the local
    /// monotonic clock, same origin as [`crate::clock::local_now`]).
    ///
    /// # Errors
    /// Returns an error if the output device rejected the frame.
    async fn submit(&self, frame: MediaFrame, deadline_local: f64) -> Result<()>;

    /// Stop emission for a track and drop any device-side queue.
    ///
    /// # Errors
    /// Returns an error if the output device failed to stop.
    async fn stop(&self, track_id: &str) -> Result<()>;

    /// The renderer's local clock, seconds.
    fn now_local(&self) -> f64;
}
