use std::fmt;

use thiserror::Error;

use crate::worker::WorkerError;

/// Queue I/O operation, used to pick the matching error-suppression flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    Enqueue,
    Dequeue,
    Delete,
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueOperation::Enqueue => "enqueue",
            QueueOperation::Dequeue => "dequeue",
            QueueOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CourierError {
    /// A job type, worker type or queue binding cannot be resolved from config.
    #[error("configuration error at {scope}.{key}: {reason}")]
    Configuration {
        scope: String,
        key: String,
        reason: String,
    },

    #[error("invalid job parameter {key}: {reason}")]
    InvalidJobParameter { key: String, reason: String },

    /// Reserved or unknown queue identifier, malformed message, ...
    #[error("validation failed: {0}")]
    Validation(String),

    /// Raised by a worker during `work()`. Already recorded on the job.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("queue {operation} failed for queue={queue}: {reason}")]
    Queue {
        queue: String,
        operation: QueueOperation,
        reason: String,
    },

    #[error("invalid job state: {0}")]
    InvalidState(String),

    #[error("duplicate worker for type={0}")]
    DuplicateWorker(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CourierError {
    pub fn configuration(
        scope: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CourierError::Configuration {
            scope: scope.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_parameter(key: impl Into<String>) -> Self {
        CourierError::InvalidJobParameter {
            key: key.into(),
            reason: "parameter is required".to_string(),
        }
    }
}
