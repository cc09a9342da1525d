//! Job - 1 回の process() ライフサイクル
//!
//! - [`JobCore`]: id / 時刻 / parameters / errors / successful / finished
//! - [`SimpleJob`]: `job.types` の supported テーブルから Worker 列を解決
//! - [`QueueJob`]: Message の queue 設定から Worker を解決し、成功時に delete

pub mod lifecycle;
pub mod queue;
pub mod simple;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{DataMap, JobId};
use crate::error::CourierError;
use crate::worker::Worker;

pub use self::lifecycle::{JobCore, JobEnv, JobPhase, WORKER_ERROR_PREFIX};
pub use self::queue::{MESSAGE_PARAMETER, QueueJob};
pub use self::simple::{SIMPLE_IDENTIFIER, SimpleJob};

/// Common job surface.
///
/// `process()` returns the aggregated success flag. On `Err` the job is still
/// finished and queryable: inspect `errors()` / `tracker_data()` afterwards.
#[async_trait]
pub trait Job: Send {
    fn core(&self) -> &JobCore;

    fn core_mut(&mut self) -> &mut JobCore;

    /// Resolved workers, in invocation order.
    fn workers(&self) -> &[Box<dyn Worker>];

    fn validate_parameters(&self) -> Result<(), CourierError>;

    fn validate_config(&mut self) -> Result<(), CourierError>;

    async fn process(&mut self) -> Result<bool, CourierError>;

    fn id(&self) -> JobId {
        self.core().id()
    }

    fn set_parameters(&mut self, parameters: DataMap) {
        self.core_mut().set_parameters(parameters);
    }

    fn parameters(&self) -> &DataMap {
        self.core().parameters()
    }

    fn set_context(&mut self, context: DataMap) {
        self.core_mut().set_context(context);
    }

    fn add_context(&mut self, key: &str, value: Value) {
        self.core_mut().add_context(key, value);
    }

    fn set_output(&mut self, output: DataMap) {
        self.core_mut().set_output(output);
    }

    fn add_output(&mut self, key: &str, value: Value) {
        self.core_mut().add_output(key, value);
    }

    fn errors(&self) -> &[String] {
        self.core().errors()
    }

    fn is_successful(&self) -> Option<bool> {
        self.core().is_successful()
    }

    fn is_finished(&self) -> bool {
        self.core().is_finished()
    }

    /// Job fields, then each worker's tracker data (worker keys win).
    fn tracker_data(&self) -> DataMap {
        let mut data = self.core().tracker_data();
        for worker in self.workers() {
            data.extend(worker.tracker_data());
        }
        data
    }
}
