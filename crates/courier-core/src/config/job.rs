//! Job type table (`job.types`).
//!
//! ```json
//! {"types": {"simple": {
//!     "class": "simple",
//!     "parameters": {"supported": {
//!         "foo_job": {"parameters": {"workers": [{"type": "foo", "parameters": {}}]}}
//!     }}
//! }}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DataMap;
use crate::error::CourierError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    #[serde(default)]
    pub types: JobTypes,
}

/// Job type identifier -> definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobTypes(BTreeMap<String, JobTypeSpec>);

impl JobTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, spec: JobTypeSpec) {
        self.0.insert(id.into(), spec);
    }

    pub fn job_type(&self, id: &str) -> Result<&JobTypeSpec, CourierError> {
        self.0.get(id).ok_or_else(|| {
            CourierError::configuration("job.types", id, "job type is not configured")
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobTypeSpec)> {
        self.0.iter().map(|(id, spec)| (id.as_str(), spec))
    }
}

/// Which job implementation a type entry drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobTypeSpec {
    pub class: JobClass,
    #[serde(default)]
    pub parameters: JobTypeParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobTypeParameters {
    #[serde(default)]
    pub supported: BTreeMap<String, SupportedJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportedJob {
    #[serde(default)]
    pub parameters: SupportedJobParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportedJobParameters {
    /// Run in order.
    #[serde(default)]
    pub workers: Vec<WorkerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSpec {
    #[serde(rename = "type")]
    pub worker_type: String,
    #[serde(default)]
    pub parameters: DataMap,
}

impl WorkerSpec {
    pub fn new(worker_type: impl Into<String>) -> Self {
        Self {
            worker_type: worker_type.into(),
            parameters: DataMap::new(),
        }
    }
}

impl JobTypeSpec {
    pub fn simple() -> Self {
        Self {
            class: JobClass::Simple,
            parameters: JobTypeParameters::default(),
        }
    }

    pub fn with_supported(mut self, key: impl Into<String>, workers: Vec<WorkerSpec>) -> Self {
        self.parameters.supported.insert(
            key.into(),
            SupportedJob {
                parameters: SupportedJobParameters { workers },
            },
        );
        self
    }

    /// Worker list of a supported entry.
    pub fn supported(&self, job_type: &str, key: &str) -> Result<&[WorkerSpec], CourierError> {
        self.parameters
            .supported
            .get(key)
            .map(|entry| entry.parameters.workers.as_slice())
            .ok_or_else(|| {
                CourierError::configuration(
                    format!("job.types.{job_type}.parameters.supported"),
                    key,
                    "unsupported simple identifier",
                )
            })
    }
}
