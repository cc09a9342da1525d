//! Worker - Job から呼ばれる 1 つの具体的な仕事
//!
//! - [`Worker`]: object-safe な実行 trait（`Box<dyn Worker>` で保持）
//! - [`WorkerFactory`]: worker type 文字列 + parameters から Worker を構築
//! - [`WorkerRegistry`]: constructor 関数テーブルによる `WorkerFactory` 実装

pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::DataMap;
use crate::error::CourierError;

pub use self::registry::{NamedWorker, WorkerConstructor, WorkerRegistry};

/// Domain error raised by a worker.
pub struct WorkerError(Box<dyn std::error::Error + Send + Sync>);

impl WorkerError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

impl fmt::Debug for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// One discrete piece of work.
///
/// `work()` returns `Ok(false)` for an ordinary unsuccessful run and `Err` for
/// an exceptional one; the job treats both as failure but only `Err` aborts
/// the remaining workers.
#[async_trait]
pub trait Worker: Send {
    async fn work(&mut self) -> Result<bool, WorkerError>;

    /// Diagnostics collected during `work()`.
    fn errors(&self) -> &[String] {
        &[]
    }

    /// Extra keys merged into the job's tracker data.
    fn tracker_data(&self) -> DataMap {
        DataMap::new()
    }
}

/// Resolves a worker type identifier into a constructed worker.
pub trait WorkerFactory: Send + Sync {
    /// Unknown types fail with [`CourierError::Configuration`].
    fn create_worker(
        &self,
        worker_type: &str,
        parameters: &DataMap,
    ) -> Result<Box<dyn Worker>, CourierError>;
}

/// Decode worker parameters into a typed struct.
pub fn decode_parameters<T: DeserializeOwned>(parameters: &DataMap) -> Result<T, WorkerError> {
    serde_json::from_value(serde_json::Value::Object(parameters.clone()))
        .map_err(|e| WorkerError::msg(format!("json decode: {e}")))
}
