//! WorkerRegistry - worker type → constructor 関数のテーブル
//!
//! リフレクションではなく明示的なテーブルで Worker を構築します。
//! 起動時に登録（mutable）、実行時は共有参照のみ（immutable）。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Worker, WorkerError, WorkerFactory};
use crate::config::CourierConfig;
use crate::domain::DataMap;
use crate::error::CourierError;

/// Builds a worker from its configured parameters.
pub type WorkerConstructor =
    Arc<dyn Fn(&DataMap) -> Result<Box<dyn Worker>, WorkerError> + Send + Sync>;

/// A worker that knows its own type identifier.
///
/// ```ignore
/// struct Resize { width: u32 }
///
/// impl NamedWorker for Resize {
///     const TYPE: &'static str = "image.resize";
///     fn from_parameters(p: &DataMap) -> Result<Self, WorkerError> { ... }
/// }
///
/// registry.register_named::<Resize>()?;
/// ```
pub trait NamedWorker: Worker + Sized + 'static {
    const TYPE: &'static str;

    fn from_parameters(parameters: &DataMap) -> Result<Self, WorkerError>;
}

#[derive(Clone, Default)]
pub struct WorkerRegistry {
    constructors: HashMap<String, WorkerConstructor>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(
        &mut self,
        worker_type: impl Into<String>,
        constructor: F,
    ) -> Result<(), CourierError>
    where
        F: Fn(&DataMap) -> Result<Box<dyn Worker>, WorkerError> + Send + Sync + 'static,
    {
        let worker_type = worker_type.into();
        if self.constructors.contains_key(&worker_type) {
            return Err(CourierError::DuplicateWorker(worker_type));
        }
        self.constructors.insert(worker_type, Arc::new(constructor));
        Ok(())
    }

    pub fn register_named<W: NamedWorker>(&mut self) -> Result<(), CourierError> {
        self.register(W::TYPE, |parameters| {
            let worker = W::from_parameters(parameters)?;
            Ok(Box::new(worker) as Box<dyn Worker>)
        })
    }

    pub fn contains(&self, worker_type: &str) -> bool {
        self.constructors.contains_key(worker_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Fail-fast check: every worker type the config references is registered.
    pub fn expect_types(&self, config: &CourierConfig) -> Result<(), CourierError> {
        let missing: Vec<String> = config
            .referenced_worker_types()?
            .into_iter()
            .filter(|t| !self.contains(t))
            .collect();
        if !missing.is_empty() {
            return Err(CourierError::configuration(
                "workers",
                missing.join(","),
                "worker types are referenced but not registered",
            ));
        }
        Ok(())
    }
}

impl WorkerFactory for WorkerRegistry {
    fn create_worker(
        &self,
        worker_type: &str,
        parameters: &DataMap,
    ) -> Result<Box<dyn Worker>, CourierError> {
        let constructor = self.constructors.get(worker_type).ok_or_else(|| {
            CourierError::configuration("workers", worker_type, "worker type is not registered")
        })?;
        constructor(parameters).map_err(|e| {
            CourierError::configuration("workers", worker_type, format!("cannot build worker: {e}"))
        })
    }
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}
