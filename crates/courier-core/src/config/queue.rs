//! Per-queue configuration.
//!
//! Each entry under `queues` is merged on top of `queues.default` and then
//! parsed strictly, once, when the registry is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::merge::deep_merge;
use crate::domain::DataMap;
use crate::error::CourierError;

/// Reserved merge base. Never requestable as a queue.
pub const DEFAULT_QUEUE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub worker: WorkerBinding,
    /// Enqueue-time settings.
    pub queue: OperationConfig,
    pub dequeue: OperationConfig,
    pub delete: DeleteConfig,
}

/// Worker bound to a queue. `type` may be absent in config; `QueueJob`
/// rejects such a binding when it is constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerBinding {
    #[serde(rename = "type")]
    pub worker_type: Option<String>,
    pub parameters: DataMap,
}

impl WorkerBinding {
    /// The configured worker type, treating `""` as absent.
    pub fn worker_type(&self) -> Option<&str> {
        self.worker_type.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationConfig {
    /// Accepted for every operation; only `delete.enabled` changes behaviour.
    pub enabled: bool,
    /// Backend-specific parameters (e.g. `max_messages` for dequeue).
    pub parameters: DataMap,
    pub error: ErrorPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteConfig {
    /// Delete the message after a successful job. Off unless configured.
    pub enabled: bool,
    pub parameters: DataMap,
    pub error: ErrorPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorPolicy {
    /// When true the backend swallows (and logs) I/O failures of the operation.
    pub suppression: bool,
}

/// Resolved queue configurations keyed by queue identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueRegistry {
    queues: BTreeMap<String, QueueConfig>,
}

impl QueueRegistry {
    /// Merge every entry with `default` and parse it.
    pub fn from_queues(raw: &DataMap) -> Result<Self, CourierError> {
        let base = raw
            .get(DEFAULT_QUEUE)
            .cloned()
            .unwrap_or_else(|| Value::Object(DataMap::new()));

        let mut queues = BTreeMap::new();
        for (id, entry) in raw {
            if id == DEFAULT_QUEUE {
                continue;
            }
            let merged = deep_merge(&base, entry);
            let config: QueueConfig = serde_json::from_value(merged)
                .map_err(|e| CourierError::configuration("queues", id, e.to_string()))?;
            queues.insert(id.clone(), config);
        }
        Ok(Self { queues })
    }

    /// Look up a requestable queue.
    pub fn get(&self, id: &str) -> Result<&QueueConfig, CourierError> {
        if id == DEFAULT_QUEUE {
            return Err(CourierError::Validation(format!(
                "queue identifier '{DEFAULT_QUEUE}' is reserved"
            )));
        }
        self.queues
            .get(id)
            .ok_or_else(|| CourierError::Validation(format!("unknown queue identifier '{id}'")))
    }

    pub fn queue_ids(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueueConfig)> {
        self.queues.iter().map(|(id, config)| (id.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn registry(value: Value) -> Result<QueueRegistry, CourierError> {
        let Value::Object(raw) = value else {
            panic!("queues must be an object");
        };
        QueueRegistry::from_queues(&raw)
    }

    #[test]
    fn queue_entry_inherits_default() {
        let reg = registry(json!({
            "default": {
                "delete": {"enabled": true},
                "dequeue": {"parameters": {"a": 1, "b": 2}},
            },
            "orders": {
                "worker": {"type": "order"},
                "dequeue": {"parameters": {"b": 3}},
            },
        }))
        .unwrap();

        let orders = reg.get("orders").unwrap();
        assert_eq!(orders.worker.worker_type(), Some("order"));
        assert!(orders.delete.enabled);
        assert_eq!(
            Value::Object(orders.dequeue.parameters.clone()),
            json!({"a": 1, "b": 3})
        );
    }

    #[test]
    fn enabled_is_accepted_under_every_operation() {
        let reg = registry(json!({
            "default": {"queue": {"enabled": true}},
            "orders": {
                "dequeue": {"enabled": true},
                "delete": {"enabled": true},
            },
        }))
        .unwrap();

        let orders = reg.get("orders").unwrap();
        assert!(orders.queue.enabled);
        assert!(orders.dequeue.enabled);
        assert!(orders.delete.enabled);
    }

    #[test]
    fn queue_entry_overrides_default_flags() {
        let reg = registry(json!({
            "default": {"delete": {"enabled": true, "error": {"suppression": true}}},
            "audit": {"delete": {"enabled": false}},
        }))
        .unwrap();

        let audit = reg.get("audit").unwrap();
        assert!(!audit.delete.enabled);
        assert!(audit.delete.error.suppression);
    }

    #[rstest]
    #[case::reserved("default")]
    #[case::unknown("missing")]
    fn unrequestable_queue_is_a_validation_error(#[case] id: &str) {
        let reg = registry(json!({"default": {}, "orders": {}})).unwrap();

        let err = reg.get(id).unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[test]
    fn suppression_and_delete_default_to_false() {
        let reg = registry(json!({"orders": {}})).unwrap();
        let orders = reg.get("orders").unwrap();

        assert!(!orders.queue.error.suppression);
        assert!(!orders.dequeue.error.suppression);
        assert!(!orders.delete.error.suppression);
        assert!(!orders.delete.enabled);
        assert_eq!(orders.worker, WorkerBinding::default());
    }

    #[test]
    fn unknown_keys_are_rejected_at_load() {
        let err = registry(json!({"orders": {"delet": {"enabled": true}}})).unwrap_err();
        assert!(matches!(
            err,
            CourierError::Configuration { ref key, .. } if key == "orders"
        ));
    }

    #[test]
    fn empty_worker_type_counts_as_absent() {
        let reg = registry(json!({"orders": {"worker": {"type": ""}}})).unwrap();
        assert_eq!(reg.get("orders").unwrap().worker.worker_type(), None);
    }
}
