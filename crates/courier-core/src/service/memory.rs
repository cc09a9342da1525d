//! InMemoryQueueService - 開発用・テスト用のキューバックエンド
//!
//! # 実装詳細
//! - queue ごとの ready キュー（`VecDeque<Message>`）
//! - dequeue 済みで未 delete のメッセージは receipt handle ごとに in-flight へ
//! - I/O 失敗は queue ごとの suppression フラグに従って warn ログ or エラー

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::QueueService;
use crate::config::{CourierConfig, QueueRegistry};
use crate::domain::{Message, RECEIPT_HANDLE_ATTRIBUTE};
use crate::error::{CourierError, QueueOperation};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};

/// `dequeue.parameters` key for the batch size. Defaults to 1.
pub const MAX_MESSAGES: &str = "max_messages";

#[derive(Default)]
struct QueueState {
    ready: HashMap<String, VecDeque<Message>>,
    /// receipt handle -> delivered message
    in_flight: HashMap<String, Message>,
}

pub struct InMemoryQueueService {
    queues: QueueRegistry,
    ids: Arc<dyn IdGenerator>,
    state: Mutex<QueueState>,
}

impl InMemoryQueueService {
    pub fn new(queues: QueueRegistry) -> Self {
        Self {
            queues,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn from_config(config: &CourierConfig) -> Result<Self, CourierError> {
        Ok(Self::new(config.queue_registry()?))
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Messages waiting to be dequeued.
    pub async fn ready_len(&self, queue_id: &str) -> usize {
        self.state
            .lock()
            .await
            .ready
            .get(queue_id)
            .map_or(0, VecDeque::len)
    }

    /// Messages dequeued but not deleted yet.
    pub async fn in_flight_len(&self, queue_id: &str) -> usize {
        self.state
            .lock()
            .await
            .in_flight
            .values()
            .filter(|m| m.queue_identifier() == queue_id)
            .count()
    }

    /// Return undeleted deliveries of `queue_id` to the ready queue so they
    /// are redelivered.
    pub async fn release_in_flight(&self, queue_id: &str) -> usize {
        let mut state = self.state.lock().await;
        let receipts: Vec<String> = state
            .in_flight
            .iter()
            .filter(|(_, m)| m.queue_identifier() == queue_id)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in &receipts {
            if let Some(message) = state.in_flight.remove(receipt) {
                state
                    .ready
                    .entry(queue_id.to_string())
                    .or_default()
                    .push_back(message);
            }
        }
        receipts.len()
    }

    /// Report an I/O failure, honouring the queue's suppression flag.
    fn io_failure(
        &self,
        queue_id: &str,
        operation: QueueOperation,
        reason: String,
    ) -> Result<(), CourierError> {
        if self.is_error_suppressed(queue_id, operation)? {
            warn!(queue = queue_id, %operation, %reason, "suppressed queue error");
            return Ok(());
        }
        Err(CourierError::Queue {
            queue: queue_id.to_string(),
            operation,
            reason,
        })
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    async fn enqueue(&self, mut message: Message) -> Result<Message, CourierError> {
        let queue_id = message.queue_identifier().to_string();
        self.queue_config(&queue_id)?;

        if let Some(existing) = message.identifier().map(str::to_string) {
            let reason = format!("message {existing} is already enqueued");
            self.io_failure(&queue_id, QueueOperation::Enqueue, reason)?;
            return Ok(message);
        }

        message.assign_identifier(self.ids.generate_message_id().to_string())?;
        self.state
            .lock()
            .await
            .ready
            .entry(queue_id.clone())
            .or_default()
            .push_back(message.clone());

        debug!(queue = %queue_id, message_id = ?message.identifier(), "enqueued");
        Ok(message)
    }

    async fn dequeue(&self, queue_id: &str) -> Result<Vec<Message>, CourierError> {
        let config = self.queue_config(queue_id)?;
        let max_messages = match config.dequeue.parameters.get(MAX_MESSAGES) {
            None => 1,
            Some(value) => match value.as_u64() {
                Some(n) if n > 0 => n as usize,
                _ => {
                    let reason = format!("invalid {MAX_MESSAGES}: {value}");
                    self.io_failure(queue_id, QueueOperation::Dequeue, reason)?;
                    return Ok(Vec::new());
                }
            },
        };

        let mut state = self.state.lock().await;
        let mut delivered = Vec::new();
        while delivered.len() < max_messages {
            let Some(message) = state.ready.get_mut(queue_id).and_then(VecDeque::pop_front) else {
                break;
            };
            let receipt = self.ids.generate_receipt_handle().to_string();
            let message = message.with_attribute(RECEIPT_HANDLE_ATTRIBUTE, json!(receipt));
            state.in_flight.insert(receipt, message.clone());
            delivered.push(message);
        }

        debug!(queue = queue_id, count = delivered.len(), "dequeued");
        Ok(delivered)
    }

    async fn delete(&self, message: &Message) -> Result<(), CourierError> {
        let queue_id = message.queue_identifier();
        self.queue_config(queue_id)?;

        let removed = match message.receipt_handle() {
            Some(receipt) => self.state.lock().await.in_flight.remove(receipt).is_some(),
            None => false,
        };
        if !removed {
            let reason = format!("message {:?} is not in flight", message.identifier());
            return self.io_failure(queue_id, QueueOperation::Delete, reason);
        }

        debug!(queue = queue_id, message_id = ?message.identifier(), "deleted");
        Ok(())
    }
}
