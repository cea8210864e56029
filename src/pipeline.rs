//! Message pipeline
//!
//! A bounded handoff from producer readers to the broadcaster. `send`
//! waits while the buffer is full, which throttles every producer behind a
//! slow broadcaster.

use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::message::Message;

/// Buffer slots used when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 1;

/// Producer-side handle, cloned into every producer reader
#[derive(Debug, Clone)]
pub struct PipelineSender {
    sender: mpsc::Sender<Message>,
}

impl PipelineSender {
    /// Enqueue a message, waiting for a free slot
    pub async fn send(&self, msg: Message) -> Result<(), RelayError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| RelayError::PipelineClosed)
    }
}

/// Broadcaster-side handle
#[derive(Debug)]
pub struct PipelineReceiver {
    receiver: mpsc::Receiver<Message>,
}

impl PipelineReceiver {
    /// Dequeue the next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

/// Create a pipeline with `capacity` buffer slots (at least one)
pub fn channel(capacity: usize) -> (PipelineSender, PipelineReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (PipelineSender { sender }, PipelineReceiver { receiver })
}
