use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::Frame;
use crate::types::ConnectionId;

/// What happened to a single non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The recipient's outbound queue is full; this frame is dropped for it.
    Dropped,
    /// The transport is gone.
    Closed,
}

/// A non-owning handle to a live connection.
///
/// The transport owns the socket and drains `rx` into it from a writer
/// task. The registry only ever holds clones of this handle. Once the
/// writer task exits the receiver is dropped and the handle reports the
/// connection as no longer open.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    /// Create a handle and the queue its transport should drain.
    pub fn new(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame without waiting. Never blocks on a slow peer.
    pub fn try_deliver(&self, frame: Frame) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
