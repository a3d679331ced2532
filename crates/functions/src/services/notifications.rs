//! Notification queue trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

/// Queue receiving order status notifications.
pub const ORDER_NOTIFICATIONS: &str = "order-notifications";
/// Queue receiving stock level changes.
pub const STOCK_UPDATES: &str = "stock-updates";

/// A set of named FIFO message queues.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Appends a message to `queue`, creating the queue if needed.
    async fn send(&self, queue: &str, message: Value);

    /// Removes and returns the oldest message on `queue`.
    async fn receive(&self, queue: &str) -> Option<Value>;

    /// Number of messages waiting on `queue`.
    async fn pending(&self, queue: &str) -> usize;
}

/// In-memory notification queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<Value>>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationQueue for InMemoryQueue {
    async fn send(&self, queue: &str, message: Value) {
        tracing::debug!(queue, "message enqueued");
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
    }

    async fn receive(&self, queue: &str) -> Option<Value> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    async fn pending(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn messages_come_out_in_order_per_queue() {
        let queue = InMemoryQueue::new();
        queue.send(ORDER_NOTIFICATIONS, json!({"n": 1})).await;
        queue.send(STOCK_UPDATES, json!({"n": 2})).await;
        queue.send(ORDER_NOTIFICATIONS, json!({"n": 3})).await;

        assert_eq!(queue.pending(ORDER_NOTIFICATIONS).await, 2);
        assert_eq!(queue.receive(ORDER_NOTIFICATIONS).await, Some(json!({"n": 1})));
        assert_eq!(queue.receive(ORDER_NOTIFICATIONS).await, Some(json!({"n": 3})));
        assert_eq!(queue.receive(ORDER_NOTIFICATIONS).await, None);
        assert_eq!(queue.receive(STOCK_UPDATES).await, Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn unknown_queue_is_empty() {
        let queue = InMemoryQueue::new();
        assert_eq!(queue.pending("nope").await, 0);
        assert!(queue.receive("nope").await.is_none());
    }
}
