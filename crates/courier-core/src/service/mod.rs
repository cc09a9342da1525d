//! QueueService - キュー設定の解決 + キュー I/O の抽象化
//!
//! 設定まわり（default マージ、"default" の拒否、suppression フラグ）は
//! provided method として trait 側に実装し、バックエンドは I/O だけを実装する。

pub mod memory;

use async_trait::async_trait;

use crate::config::{QueueConfig, QueueRegistry, WorkerBinding};
use crate::domain::Message;
use crate::error::{CourierError, QueueOperation};

pub use self::memory::InMemoryQueueService;

#[async_trait]
pub trait QueueService: Send + Sync {
    /// Resolved configuration of every requestable queue.
    fn queues(&self) -> &QueueRegistry;

    /// `default` and unknown identifiers fail with [`CourierError::Validation`].
    fn queue_config(&self, queue_id: &str) -> Result<&QueueConfig, CourierError> {
        self.queues().get(queue_id)
    }

    /// The `worker` section; empty when not configured.
    fn queue_worker_config(&self, queue_id: &str) -> Result<WorkerBinding, CourierError> {
        Ok(self.queue_config(queue_id)?.worker.clone())
    }

    fn is_queue_queueing_error_suppression(&self, queue_id: &str) -> Result<bool, CourierError> {
        Ok(self.queue_config(queue_id)?.queue.error.suppression)
    }

    fn is_queue_dequeueing_error_suppression(&self, queue_id: &str) -> Result<bool, CourierError> {
        Ok(self.queue_config(queue_id)?.dequeue.error.suppression)
    }

    fn is_queue_deleting_error_suppression(&self, queue_id: &str) -> Result<bool, CourierError> {
        Ok(self.queue_config(queue_id)?.delete.error.suppression)
    }

    fn is_error_suppressed(
        &self,
        queue_id: &str,
        operation: QueueOperation,
    ) -> Result<bool, CourierError> {
        match operation {
            QueueOperation::Enqueue => self.is_queue_queueing_error_suppression(queue_id),
            QueueOperation::Dequeue => self.is_queue_dequeueing_error_suppression(queue_id),
            QueueOperation::Delete => self.is_queue_deleting_error_suppression(queue_id),
        }
    }

    /// Store a message; returns it with its identifier assigned.
    async fn enqueue(&self, message: Message) -> Result<Message, CourierError>;

    /// Receive up to the queue's configured batch size. Empty when idle.
    async fn dequeue(&self, queue_id: &str) -> Result<Vec<Message>, CourierError>;

    /// Acknowledge a dequeued message.
    async fn delete(&self, message: &Message) -> Result<(), CourierError>;
}
