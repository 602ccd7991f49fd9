//! Message transport seam.
//!
//! The protocol assumes a reliable bidirectional stream of text frames, one
//! message per frame. This trait is the only surface the rest of the crate
//! sees; production code binds it to a socket, tests bind it to in-memory
//! channel pairs from [`crate::testing`].

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Message;

/// A reliable, ordered, bidirectional message channel.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Send one message.
    ///
    /// # Errors
    /// Returns [`crate::error::SyncError::TransportClosed`] if the peer is gone.
    async fn send(&self, message: Message) -> Result<()>;

    /// Receive the next message; `None` means the channel closed.
    async fn recv(&self) -> Option<Message>;
}
