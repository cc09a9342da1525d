//! JobCore - Job 共通のライフサイクルと記録
//!
//! 状態遷移:
//! - Created -> ParametersSet -> ConfigValidated -> Processing -> Finished
//! - validate_* は省略・順不同で呼べる。process() は一度だけ。
//!
//! Worker が Err を返した場合も、errors / successful / duration / finished を
//! 確定させてからエラーを呼び出し元へ返す。

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::domain::{DataMap, JobId};
use crate::error::CourierError;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::worker::{Worker, WorkerError};

/// Prefix of the job error entry recorded when a worker raises.
pub const WORKER_ERROR_PREFIX: &str = "Encountered an error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Created,
    ParametersSet,
    ConfigValidated,
    Processing,
    Finished,
}

/// Clock and ID source shared by the jobs a driver creates.
#[derive(Clone)]
pub struct JobEnv {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl JobEnv {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    pub fn system() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }
}

impl Default for JobEnv {
    fn default() -> Self {
        Self::system()
    }
}

pub struct JobCore {
    id: JobId,
    clock: Arc<dyn Clock>,
    phase: JobPhase,
    start: Option<DateTime<Utc>>,
    started_at: Option<Instant>,
    /// Seconds.
    duration: Option<f64>,
    parameters: DataMap,
    context: DataMap,
    output: DataMap,
    errors: Vec<String>,
    successful: Option<bool>,
    finished: bool,
}

impl JobCore {
    pub fn new(env: &JobEnv) -> Self {
        Self {
            id: env.ids.generate_job_id(),
            clock: Arc::clone(&env.clock),
            phase: JobPhase::Created,
            start: None,
            started_at: None,
            duration: None,
            parameters: DataMap::new(),
            context: DataMap::new(),
            output: DataMap::new(),
            errors: Vec::new(),
            successful: None,
            finished: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn parameters(&self) -> &DataMap {
        &self.parameters
    }

    pub fn context(&self) -> &DataMap {
        &self.context
    }

    pub fn output(&self) -> &DataMap {
        &self.output
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// `None` until the job has run its workers.
    pub fn is_successful(&self) -> Option<bool> {
        self.successful
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Replace parameters. Checked lazily by `validate_parameters()`.
    pub fn set_parameters(&mut self, parameters: DataMap) {
        self.parameters = parameters;
        if self.phase == JobPhase::Created {
            self.phase = JobPhase::ParametersSet;
        }
    }

    pub fn set_context(&mut self, context: DataMap) {
        self.context = context;
    }

    pub fn add_context(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    pub fn set_output(&mut self, output: DataMap) {
        self.output = output;
    }

    pub fn add_output(&mut self, key: impl Into<String>, value: Value) {
        self.output.insert(key.into(), value);
    }

    pub fn require_parameter(&self, key: &str) -> Result<&Value, CourierError> {
        self.parameters
            .get(key)
            .ok_or_else(|| CourierError::missing_parameter(key))
    }

    pub(crate) fn mark_config_validated(&mut self) {
        if self.phase < JobPhase::ConfigValidated {
            self.phase = JobPhase::ConfigValidated;
        }
    }

    pub(crate) fn ensure_processable(&self) -> Result<(), CourierError> {
        if self.phase >= JobPhase::Processing {
            return Err(CourierError::InvalidState(format!(
                "job {} has already been processed",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn begin(&mut self) {
        self.phase = JobPhase::Processing;
        self.start = Some(self.clock.now());
        self.started_at = Some(Instant::now());
        debug!(job_id = %self.id, "job started");
    }

    /// Run every worker in order and AND their results.
    ///
    /// A worker returning `false` does not stop the remaining workers; a
    /// worker raising does.
    pub(crate) async fn run_workers(
        &mut self,
        workers: &mut [Box<dyn Worker>],
    ) -> Result<bool, CourierError> {
        let mut successful = true;
        for (index, worker) in workers.iter_mut().enumerate() {
            match worker.work().await {
                Ok(ok) => {
                    self.errors.extend(worker.errors().iter().cloned());
                    if !ok {
                        warn!(job_id = %self.id, worker = index, "worker reported failure");
                    }
                    successful &= ok;
                }
                Err(err) => {
                    self.record_worker_error(&err);
                    warn!(job_id = %self.id, worker = index, error = %err, "worker raised");
                    return Err(CourierError::Worker(err));
                }
            }
        }
        self.successful = Some(successful);
        Ok(successful)
    }

    fn record_worker_error(&mut self, err: &WorkerError) {
        self.errors.push(format!("{WORKER_ERROR_PREFIX}{err}"));
        self.successful = Some(false);
    }

    /// Record the duration. Later calls keep the first measurement.
    pub(crate) fn stop_clock(&mut self) {
        if self.duration.is_none() {
            self.duration = self.started_at.map(|t| t.elapsed().as_secs_f64());
        }
    }

    /// Commit duration and `finished`. Runs on every exit of `process()`
    /// after the once-only check, including validation failures.
    pub(crate) fn finish(&mut self) {
        self.stop_clock();
        self.finished = true;
        self.phase = JobPhase::Finished;
        info!(
            job_id = %self.id,
            successful = ?self.successful,
            duration = ?self.duration,
            errors = self.errors.len(),
            "job finished"
        );
    }

    /// Job-level tracker fields.
    pub fn tracker_data(&self) -> DataMap {
        let mut data = DataMap::new();
        data.insert("id".to_string(), json!(self.id.to_string()));
        data.insert(
            "start".to_string(),
            json!(self.start.map(|s| s.to_rfc3339_opts(SecondsFormat::Millis, true))),
        );
        data.insert("duration".to_string(), json!(self.duration));
        data.insert("successful".to_string(), json!(self.successful));
        data.insert("finished".to_string(), json!(self.finished));
        data.insert(
            "parameters".to_string(),
            json!(Value::Object(self.parameters.clone()).to_string()),
        );
        data.insert("errors".to_string(), json!(self.errors));
        data
    }
}

impl fmt::Debug for JobCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCore")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("successful", &self.successful)
            .field("finished", &self.finished)
            .field("errors", &self.errors)
            .finish()
    }
}
