//! QueueJob - Message 1 件を処理し、結果に応じて delete する Job
//!
//! - Worker は生成時に queue 設定から解決する（設定ミスは dequeue 後すぐ表面化）
//! - delete は `successful == Some(true)` かつ `delete.enabled` のときだけ
//! - 失敗したジョブは設定に関わらず delete しない（at-least-once）

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, debug, error, info, info_span};

use super::{Job, JobCore, JobEnv};
use crate::domain::Message;
use crate::error::CourierError;
use crate::service::QueueService;
use crate::worker::{Worker, WorkerFactory};

/// Worker parameter carrying the message export view.
pub const MESSAGE_PARAMETER: &str = "message";

pub struct QueueJob {
    core: JobCore,
    service: Arc<dyn QueueService>,
    message: Message,
    worker_type: String,
    worker: Box<dyn Worker>,
    deleted: bool,
}

impl QueueJob {
    pub fn new(
        service: Arc<dyn QueueService>,
        message: Message,
        factory: &dyn WorkerFactory,
    ) -> Result<Self, CourierError> {
        Self::with_env(&JobEnv::system(), service, message, factory)
    }

    /// Resolve the queue's worker binding and build the worker.
    ///
    /// The worker receives the configured parameters plus
    /// [`MESSAGE_PARAMETER`] holding `message.to_value()`. A configured
    /// `message` parameter is rejected.
    pub fn with_env(
        env: &JobEnv,
        service: Arc<dyn QueueService>,
        message: Message,
        factory: &dyn WorkerFactory,
    ) -> Result<Self, CourierError> {
        let queue_id = message.queue_identifier();
        let binding = service.queue_worker_config(queue_id)?;
        let worker_type = binding
            .worker_type()
            .ok_or_else(|| {
                CourierError::configuration(queue_id, "worker", "worker type is not configured")
            })?
            .to_string();

        let mut parameters = binding.parameters;
        if parameters.contains_key(MESSAGE_PARAMETER) {
            return Err(CourierError::configuration(
                queue_id,
                "worker.parameters.message",
                "reserved for the dequeued message",
            ));
        }
        parameters.insert(MESSAGE_PARAMETER.to_string(), message.to_value());
        let worker = factory.create_worker(&worker_type, &parameters)?;

        Ok(Self {
            core: JobCore::new(env),
            service,
            message,
            worker_type,
            worker,
            deleted: false,
        })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn worker_type(&self) -> &str {
        &self.worker_type
    }

    /// Delete the message iff the job succeeded and the queue has
    /// `delete.enabled`. Returns whether a delete was issued.
    pub async fn remove_from_queue(&mut self) -> Result<bool, CourierError> {
        if self.deleted {
            return Ok(false);
        }
        let queue_id = self.message.queue_identifier();
        let delete_enabled = self.service.queue_config(queue_id)?.delete.enabled;

        if self.core.is_successful() != Some(true) || !delete_enabled {
            debug!(
                queue = queue_id,
                successful = ?self.core.is_successful(),
                delete_enabled,
                "message left in queue"
            );
            return Ok(false);
        }

        if let Err(err) = self.service.delete(&self.message).await {
            error!(queue = queue_id, message_id = ?self.message.identifier(), error = %err, "delete failed");
            return Err(err);
        }
        self.deleted = true;
        info!(queue = queue_id, message_id = ?self.message.identifier(), "message deleted");
        Ok(true)
    }

    async fn run(&mut self) -> Result<bool, CourierError> {
        self.core.ensure_processable()?;
        self.core.begin();

        let worked = match self.validate_parameters() {
            Ok(()) => {
                self.core
                    .run_workers(std::slice::from_mut(&mut self.worker))
                    .await
            }
            Err(err) => Err(err),
        };
        // duration は delete の往復を含めない
        self.core.stop_clock();
        let result = match worked {
            Ok(successful) => self.remove_from_queue().await.map(|_| successful),
            Err(err) => Err(err),
        };
        // delete の成否に関わらず、ここで finished を確定させる
        self.core.finish();
        result
    }
}

#[async_trait]
impl Job for QueueJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn workers(&self) -> &[Box<dyn Worker>] {
        std::slice::from_ref(&self.worker)
    }

    /// Queue jobs take no required parameters.
    fn validate_parameters(&self) -> Result<(), CourierError> {
        Ok(())
    }

    fn validate_config(&mut self) -> Result<(), CourierError> {
        self.service.queue_config(self.message.queue_identifier())?;
        self.core.mark_config_validated();
        Ok(())
    }

    async fn process(&mut self) -> Result<bool, CourierError> {
        let span = info_span!(
            "queue_job",
            job_id = %self.core.id(),
            queue = %self.message.queue_identifier(),
            worker = %self.worker_type,
        );
        self.run().instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CourierConfig, QueueRegistry};
    use crate::worker::testing::{Script, ScriptedFactory};
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Service that only counts delete calls.
    struct CountingService {
        queues: QueueRegistry,
        deletes: AtomicUsize,
        fail_delete: bool,
        delete_delay: Option<Duration>,
    }

    impl CountingService {
        fn build(queues: Value, fail_delete: bool, delete_delay: Option<Duration>) -> Arc<Self> {
            let config = CourierConfig::from_value(json!({ "queues": queues })).unwrap();
            Arc::new(Self {
                queues: config.queue_registry().unwrap(),
                deletes: AtomicUsize::new(0),
                fail_delete,
                delete_delay,
            })
        }

        fn new(queues: Value) -> Arc<Self> {
            Self::build(queues, false, None)
        }

        fn failing(queues: Value) -> Arc<Self> {
            Self::build(queues, true, None)
        }

        fn slow(queues: Value, delay: Duration) -> Arc<Self> {
            Self::build(queues, false, Some(delay))
        }

        fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueueService for CountingService {
        fn queues(&self) -> &QueueRegistry {
            &self.queues
        }

        async fn enqueue(&self, message: Message) -> Result<Message, CourierError> {
            Ok(message)
        }

        async fn dequeue(&self, _queue_id: &str) -> Result<Vec<Message>, CourierError> {
            Ok(Vec::new())
        }

        async fn delete(&self, message: &Message) -> Result<(), CourierError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delete_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_delete {
                return Err(CourierError::Queue {
                    queue: message.queue_identifier().to_string(),
                    operation: crate::error::QueueOperation::Delete,
                    reason: "backend unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn orders(delete_enabled: bool) -> Value {
        json!({"orders": {
            "worker": {"type": "order"},
            "delete": {"enabled": delete_enabled}
        }})
    }

    fn message() -> Message {
        Message::new("orders", r#"{"order_id": 1}"#).unwrap()
    }

    #[rstest]
    #[case::success_enabled(true, true, 1)]
    #[case::success_disabled(true, false, 0)]
    #[case::failure_enabled(false, true, 0)]
    #[case::failure_disabled(false, false, 0)]
    #[tokio::test]
    async fn deletes_only_on_success_with_delete_enabled(
        #[case] worker_result: bool,
        #[case] delete_enabled: bool,
        #[case] expected_deletes: usize,
    ) {
        let service = CountingService::new(orders(delete_enabled));
        let factory = ScriptedFactory::new().with("order", Script::Return(worker_result));
        let mut job = QueueJob::new(service.clone(), message(), &factory).unwrap();

        let successful = job.process().await.unwrap();

        assert_eq!(successful, worker_result);
        assert_eq!(service.deletes(), expected_deletes);
        assert_eq!(factory.calls("order"), 1);
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn raising_worker_never_deletes() {
        let service = CountingService::new(orders(true));
        let factory = ScriptedFactory::new().with("order", Script::Raise("bad order".to_string()));
        let mut job = QueueJob::new(service.clone(), message(), &factory).unwrap();

        let err = job.process().await.unwrap_err();

        assert!(matches!(err, CourierError::Worker(_)));
        assert_eq!(service.deletes(), 0);
        assert_eq!(job.errors(), ["Encountered an error: bad order"]);
        assert_eq!(job.is_successful(), Some(false));
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn remove_from_queue_deletes_at_most_once() {
        let service = CountingService::new(orders(true));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));
        let mut job = QueueJob::new(service.clone(), message(), &factory).unwrap();

        job.process().await.unwrap();
        assert!(!job.remove_from_queue().await.unwrap());
        assert_eq!(service.deletes(), 1);
    }

    #[tokio::test]
    async fn delete_failure_propagates_after_bookkeeping() {
        let service = CountingService::failing(orders(true));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));
        let mut job = QueueJob::new(service.clone(), message(), &factory).unwrap();

        let err = job.process().await.unwrap_err();

        assert!(matches!(err, CourierError::Queue { .. }));
        assert!(job.is_finished());
        assert_eq!(job.is_successful(), Some(true));
        assert!(job.errors().is_empty());
    }

    #[tokio::test]
    async fn duration_excludes_the_delete_round_trip() {
        let service = CountingService::slow(orders(true), Duration::from_millis(300));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));
        let mut job = QueueJob::new(service.clone(), message(), &factory).unwrap();

        assert!(job.process().await.unwrap());

        assert_eq!(service.deletes(), 1);
        let duration = job.core().duration().unwrap();
        assert!(duration < 0.25, "duration {duration} includes the delete");
        assert!(job.is_finished());
    }

    #[test]
    fn configured_message_parameter_is_rejected() {
        let service = CountingService::new(json!({"orders": {
            "worker": {"type": "order", "parameters": {"message": "mine"}}
        }}));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));

        let err = QueueJob::new(service, message(), &factory).err().unwrap();

        assert!(matches!(
            err,
            CourierError::Configuration { ref scope, ref key, .. }
                if scope == "orders" && key == "worker.parameters.message"
        ));
        assert_eq!(factory.calls("order"), 0);
    }

    #[rstest]
    #[case::no_worker(json!({"orders": {}}))]
    #[case::no_type(json!({"orders": {"worker": {"parameters": {"x": 1}}}}))]
    #[case::empty_type(json!({"orders": {"worker": {"type": ""}}}))]
    fn missing_worker_type_fails_at_construction(#[case] queues: Value) {
        let service = CountingService::new(queues);
        let factory = ScriptedFactory::new();

        let err = QueueJob::new(service, message(), &factory).err().unwrap();

        assert!(matches!(
            err,
            CourierError::Configuration { ref scope, ref key, .. }
                if scope == "orders" && key == "worker"
        ));
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn unregistered_worker_type_fails_at_construction() {
        let service = CountingService::new(orders(true));
        let factory = ScriptedFactory::new();

        let err = QueueJob::new(service, message(), &factory).err().unwrap();
        assert!(matches!(err, CourierError::Configuration { ref key, .. } if key == "order"));
    }

    #[test]
    fn unknown_queue_fails_validation() {
        let service = CountingService::new(orders(true));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));
        let stray = Message::new("payments", "{}").unwrap();

        let err = QueueJob::new(service, stray, &factory).err().unwrap();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[tokio::test]
    async fn tracker_data_has_core_keys() {
        let service = CountingService::new(orders(false));
        let factory = ScriptedFactory::new().with("order", Script::Return(true));
        let mut job = QueueJob::new(service, message(), &factory).unwrap();
        job.validate_config().unwrap();
        job.process().await.unwrap();

        let data = job.tracker_data();
        for key in ["id", "start", "duration", "successful", "finished", "errors", "parameters"] {
            assert!(data.contains_key(key), "missing {key}");
        }
        assert_eq!(data["finished"], json!(true));
    }
}
