//! Test doubles for workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{Worker, WorkerError, WorkerFactory, WorkerRegistry};
use crate::domain::DataMap;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Return(bool),
    Raise(String),
}

/// Worker whose result is fixed up front and whose calls are counted.
pub(crate) struct ScriptedWorker {
    script: Script,
    calls: Arc<AtomicUsize>,
    errors: Vec<String>,
    tracker: DataMap,
}

impl ScriptedWorker {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
            errors: Vec::new(),
            tracker: DataMap::new(),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::new(Script::Return(true))
    }

    pub(crate) fn with_calls(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.calls = calls;
        self
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub(crate) fn with_tracker(mut self, key: impl Into<String>, value: Value) -> Self {
        self.tracker.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn work(&mut self) -> Result<bool, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Return(ok) => Ok(*ok),
            Script::Raise(message) => Err(WorkerError::msg(message.clone())),
        }
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn tracker_data(&self) -> DataMap {
        self.tracker.clone()
    }
}

/// Registry with scripted worker types sharing one call counter per type.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    registry: WorkerRegistry,
    calls: Vec<(String, Arc<AtomicUsize>)>,
}

impl ScriptedFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, worker_type: &str, script: Script) -> Self {
        self.with_worker(worker_type, move |calls| {
            ScriptedWorker::new(script.clone()).with_calls(calls)
        })
    }

    pub(crate) fn with_worker<F>(mut self, worker_type: &str, build: F) -> Self
    where
        F: Fn(Arc<AtomicUsize>) -> ScriptedWorker + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&calls);
        self.registry
            .register(worker_type, move |_| {
                Ok(Box::new(build(Arc::clone(&shared))) as Box<dyn Worker>)
            })
            .expect("scripted worker types are unique");
        self.calls.push((worker_type.to_string(), calls));
        self
    }

    pub(crate) fn calls(&self, worker_type: &str) -> usize {
        self.calls
            .iter()
            .find(|(t, _)| t == worker_type)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl WorkerFactory for ScriptedFactory {
    fn create_worker(
        &self,
        worker_type: &str,
        parameters: &DataMap,
    ) -> Result<Box<dyn Worker>, crate::error::CourierError> {
        self.registry.create_worker(worker_type, parameters)
    }
}
