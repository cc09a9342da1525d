//! Configuration.
//!
//! Loaded once (JSON) and turned into typed structs:
//! - `queues.<id>` -> [`QueueConfig`] (merged with `queues.default`)
//! - `job.types.<id>` -> [`JobTypeSpec`]

pub mod job;
pub mod merge;
pub mod queue;

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::DataMap;
use crate::error::CourierError;

pub use self::job::{JobClass, JobTypeSpec, JobTypes, JobsConfig, WorkerSpec};
pub use self::merge::deep_merge;
pub use self::queue::{
    DEFAULT_QUEUE, DeleteConfig, ErrorPolicy, OperationConfig, QueueConfig, QueueRegistry,
    WorkerBinding,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Raw queue entries; resolved by [`CourierConfig::queue_registry`].
    #[serde(default)]
    pub queues: DataMap,
    #[serde(default)]
    pub job: JobsConfig,
}

impl CourierConfig {
    pub fn from_value(value: Value) -> Result<Self, CourierError> {
        serde_json::from_value(value)
            .map_err(|e| CourierError::configuration("config", "root", e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, CourierError> {
        serde_json::from_str(s)
            .map_err(|e| CourierError::configuration("config", "root", e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn queue_registry(&self) -> Result<QueueRegistry, CourierError> {
        QueueRegistry::from_queues(&self.queues)
    }

    /// Every worker type referenced by queues and job types.
    pub fn referenced_worker_types(&self) -> Result<BTreeSet<String>, CourierError> {
        let mut types = BTreeSet::new();
        for (_, queue) in self.queue_registry()?.iter() {
            if let Some(worker_type) = queue.worker.worker_type() {
                types.insert(worker_type.to_string());
            }
        }
        for (_, spec) in self.job.types.iter() {
            for supported in spec.parameters.supported.values() {
                for worker in &supported.parameters.workers {
                    types.insert(worker.worker_type.clone());
                }
            }
        }
        Ok(types)
    }
}
