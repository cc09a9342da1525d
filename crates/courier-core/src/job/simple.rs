//! SimpleJob - `simple_identifier` で選ばれた Worker 列を順に実行する Job

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, debug, info_span};

use super::{Job, JobCore, JobEnv};
use crate::config::JobTypes;
use crate::domain::DataMap;
use crate::error::CourierError;
use crate::worker::{Worker, WorkerFactory};

/// Required parameter naming an entry of `parameters.supported`.
pub const SIMPLE_IDENTIFIER: &str = "simple_identifier";

pub struct SimpleJob {
    core: JobCore,
    job_type: String,
    types: Arc<JobTypes>,
    factory: Arc<dyn WorkerFactory>,
    workers: Vec<Box<dyn Worker>>,
    workers_built: bool,
}

impl SimpleJob {
    pub fn new(
        job_type: impl Into<String>,
        types: Arc<JobTypes>,
        factory: Arc<dyn WorkerFactory>,
    ) -> Self {
        Self::with_env(&JobEnv::system(), job_type, types, factory)
    }

    pub fn with_env(
        env: &JobEnv,
        job_type: impl Into<String>,
        types: Arc<JobTypes>,
        factory: Arc<dyn WorkerFactory>,
    ) -> Self {
        Self {
            core: JobCore::new(env),
            job_type: job_type.into(),
            types,
            factory,
            workers: Vec::new(),
            workers_built: false,
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn simple_identifier(&self) -> Result<&str, CourierError> {
        self.core
            .require_parameter(SIMPLE_IDENTIFIER)?
            .as_str()
            .ok_or_else(|| CourierError::InvalidJobParameter {
                key: SIMPLE_IDENTIFIER.to_string(),
                reason: "must be a string".to_string(),
            })
    }

    /// Resolve `job.types.<type>.parameters.supported.<simple_identifier>`
    /// and build its workers.
    pub fn build_workers(&mut self) -> Result<(), CourierError> {
        let identifier = self.simple_identifier()?.to_string();
        let specs = self
            .types
            .job_type(&self.job_type)?
            .supported(&self.job_type, &identifier)?;

        let workers = specs
            .iter()
            .map(|spec| {
                self.factory
                    .create_worker(&spec.worker_type, &spec.parameters)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            job_id = %self.core.id(),
            job_type = %self.job_type,
            simple_identifier = %identifier,
            workers = workers.len(),
            "workers built"
        );
        self.workers = workers;
        self.workers_built = true;
        Ok(())
    }

    async fn run(&mut self) -> Result<bool, CourierError> {
        self.core.ensure_processable()?;
        self.core.begin();

        // 検証エラーは ledger に積まないが、finished は必ず確定させる
        let result = match self.prepare() {
            Ok(()) => self.core.run_workers(&mut self.workers).await,
            Err(err) => Err(err),
        };
        self.core.finish();
        result
    }

    fn prepare(&mut self) -> Result<(), CourierError> {
        self.validate_parameters()?;
        if !self.workers_built {
            self.build_workers()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Job for SimpleJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut JobCore {
        &mut self.core
    }

    fn workers(&self) -> &[Box<dyn Worker>] {
        &self.workers
    }

    fn set_parameters(&mut self, parameters: DataMap) {
        // simple_identifier が変わり得るので、解決済みの Worker は捨てる
        self.core.set_parameters(parameters);
        self.workers.clear();
        self.workers_built = false;
    }

    fn validate_parameters(&self) -> Result<(), CourierError> {
        self.simple_identifier().map(|_| ())
    }

    fn validate_config(&mut self) -> Result<(), CourierError> {
        self.build_workers()?;
        self.core.mark_config_validated();
        Ok(())
    }

    async fn process(&mut self) -> Result<bool, CourierError> {
        let span = info_span!("simple_job", job_id = %self.core.id(), job_type = %self.job_type);
        self.run().instrument(span).await
    }
}
