//! Paired in-memory message transports

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::error::{Result, SyncError};
use crate::protocol::Message;
use crate::transport::MessageTransport;

/// One end of an in-memory transport pair.
pub struct ChannelTransport {
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
}

/// Create a connected pair of transports.
///
/// Messages sent on one end arrive on the other, in order. Dropping an end
/// closes the channel; the survivor sees `send` fail and `recv` return
/// `None`.
#[must_use]
pub fn transport_pair(capacity: usize) -> (ChannelTransport, ChannelTransport) {
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);

    (
        ChannelTransport {
            tx: a_tx,
            rx: Mutex::new(a_rx),
        },
        ChannelTransport {
            tx: b_tx,
            rx: Mutex::new(b_rx),
        },
    )
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| SyncError::TransportClosed {
                message: "peer dropped".to_string(),
            })
    }

    async fn recv(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }
}
