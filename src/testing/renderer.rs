//! Recording renderer

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::render::Renderer;
use crate::types::MediaFrame;

/// A frame the mock renderer was asked to emit.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// The submitted frame
    pub frame: MediaFrame,
    /// The local-time deadline it was given
    pub deadline_local: f64,
}

/// Renderer that records every submission for assertions.
#[derive(Default)]
pub struct MockRenderer {
    submitted: Mutex<Vec<RenderedFrame>>,
    stopped: Mutex<Vec<String>>,
}

impl MockRenderer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions so far, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<RenderedFrame> {
        self.submitted.lock().expect("renderer lock").clone()
    }

    /// Track ids `stop` was called with, in order.
    #[must_use]
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().expect("renderer lock").clone()
    }

    /// Presentation timestamps of submitted frames for one track.
    #[must_use]
    pub fn presentations_for(&self, track_id: &str) -> Vec<f64> {
        self.submitted
            .lock()
            .expect("renderer lock")
            .iter()
            .filter(|r| r.frame.track_id == track_id)
            .map(|r| r.frame.presentation)
            .collect()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn submit(&self, frame: MediaFrame, deadline_local: f64) -> Result<()> {
        self.submitted.lock().expect("renderer lock").push(RenderedFrame {
            frame,
            deadline_local,
        });
        Ok(())
    }

    async fn stop(&self, track_id: &str) -> Result<()> {
        self.stopped
            .lock()
            .expect("renderer lock")
            .push(track_id.to_string());
        Ok(())
    }

    fn now_local(&self) -> f64 {
        crate::clock::local_now()
    }
}
