//! Broadcaster
//!
//! The single task draining the pipeline. Every message is fanned out to the
//! registry, and write failures reported by writer tasks come back here to be
//! removed from the pool.

use std::sync::Arc;

use tracing::{debug, info};

use crate::connection::FailureReceiver;
use crate::message::Message;
use crate::pipeline::PipelineReceiver;
use crate::registry::Registry;

/// Fan-out loop state
pub struct Broadcaster {
    registry: Arc<Registry>,
    messages: PipelineReceiver,
    failures: FailureReceiver,
}

impl Broadcaster {
    /// Create a broadcaster over the given pipeline and failure channel
    pub fn new(registry: Arc<Registry>, messages: PipelineReceiver, failures: FailureReceiver) -> Self {
        Self {
            registry,
            messages,
            failures,
        }
    }

    /// Run until every pipeline sender is dropped
    pub async fn run(mut self) {
        info!("Broadcaster started");

        loop {
            tokio::select! {
                msg = self.messages.recv() => match msg {
                    Some(msg) => self.fan_out(&msg).await,
                    None => break,
                },
                Some(id) = self.failures.recv() => {
                    self.registry.remove(id).await;
                }
            }
        }

        info!("Broadcaster shutting down");
    }

    /// Deliver one message to the current pool
    async fn fan_out(&self, msg: &Message) {
        let stale = self.registry.broadcast(msg).await;
        debug!(name = %msg.name, stale = stale.len(), "message dispatched");

        for id in stale {
            self.registry.remove(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::pipeline;
    use crate::types::ConnectionId;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_fan_out_to_all_consumers() {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = pipeline::channel(1);
        let (_failures_tx, failures_rx) = mpsc::unbounded_channel();

        let mut queues = Vec::new();
        for _ in 0..3 {
            let (outbound, queue) = Outbound::channel();
            registry
                .register(ConnectionId::new(), "peer".into(), String::new(), outbound)
                .await
                .unwrap();
            queues.push(queue);
        }

        let task = tokio::spawn(Broadcaster::new(Arc::clone(&registry), rx, failures_rx).run());
        tx.send(Message::new("", "one")).await.unwrap();
        tx.send(Message::new("", "two")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        for queue in &mut queues {
            assert_eq!(queue.recv().await.unwrap(), "one\n");
            assert_eq!(queue.recv().await.unwrap(), "two\n");
        }
    }

    #[tokio::test]
    async fn test_reported_failure_removes_connection() {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = pipeline::channel(1);
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        let id = ConnectionId::new();
        let (outbound, _queue) = Outbound::channel();
        registry
            .register(id, "peer".into(), "alice".into(), outbound)
            .await
            .unwrap();

        let task = tokio::spawn(Broadcaster::new(Arc::clone(&registry), rx, failures_rx).run());
        failures_tx.send(id).unwrap();

        while !registry.is_empty().await {
            tokio::task::yield_now().await;
        }
        assert!(!registry.is_name_taken("alice").await);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_consumer_does_not_block_others() {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = pipeline::channel(1);
        let (_failures_tx, failures_rx) = mpsc::unbounded_channel();

        let (dead, dead_queue) = Outbound::channel();
        let (live, mut live_queue) = Outbound::channel();
        drop(dead_queue);
        registry.register(ConnectionId::new(), "peer".into(), String::new(), dead).await.unwrap();
        registry.register(ConnectionId::new(), "peer".into(), String::new(), live).await.unwrap();

        let task = tokio::spawn(Broadcaster::new(Arc::clone(&registry), rx, failures_rx).run());
        tx.send(Message::new("", "still here")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(live_queue.recv().await.unwrap(), "still here\n");
        assert_eq!(registry.len().await, 1);
    }
}
