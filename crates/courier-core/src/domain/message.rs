//! Message - キューから取り出される 1 件分の仕事
//!
//! `queue_identifier` は生成時に決まり、以後変わらない。
//! `identifier` は enqueue 時にバックエンドが一度だけ割り当てる。

use serde_json::{Value, json};

use super::DataMap;
use crate::error::CourierError;

/// Attribute under which a backend stores the receipt handle of a delivery.
pub const RECEIPT_HANDLE_ATTRIBUTE: &str = "receipt_handle";

/// Metadata key used by [`Message::decode_body_into_metadata`].
pub const DECODED_BODY_METADATA: &str = "body";

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    identifier: Option<String>,
    queue_identifier: String,
    body: String,
    /// Backend metadata (receipt handles, delivery counts, ...).
    attributes: DataMap,
    /// Transient data that the queue never persists.
    metadata: DataMap,
}

impl Message {
    pub fn new(
        queue_identifier: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, CourierError> {
        let queue_identifier = queue_identifier.into();
        if queue_identifier.is_empty() {
            return Err(CourierError::Validation(
                "message queue identifier must not be empty".to_string(),
            ));
        }
        Ok(Self {
            identifier: None,
            queue_identifier,
            body: body.into(),
            attributes: DataMap::new(),
            metadata: DataMap::new(),
        })
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Assign the backend identifier. Only the first assignment is accepted.
    pub fn assign_identifier(&mut self, identifier: impl Into<String>) -> Result<(), CourierError> {
        if let Some(existing) = &self.identifier {
            return Err(CourierError::Validation(format!(
                "message already has identifier {existing}"
            )));
        }
        self.identifier = Some(identifier.into());
        Ok(())
    }

    /// Parse the body as JSON and keep it in metadata. Returns false when the
    /// body is not JSON; the message is left untouched in that case.
    pub fn decode_body_into_metadata(&mut self) -> bool {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(decoded) => {
                self.metadata
                    .insert(DECODED_BODY_METADATA.to_string(), decoded);
                true
            }
            Err(_) => false,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn queue_identifier(&self) -> &str {
        &self.queue_identifier
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attributes(&self) -> &DataMap {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn metadata(&self) -> &DataMap {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn receipt_handle(&self) -> Option<&str> {
        self.attribute(RECEIPT_HANDLE_ATTRIBUTE)
            .and_then(Value::as_str)
    }

    /// Export view: `{messageIdentifier, queueIdentifier, body, attributes, metadata}`.
    pub fn to_value(&self) -> Value {
        json!({
            "messageIdentifier": self.identifier,
            "queueIdentifier": self.queue_identifier,
            "body": self.body,
            "attributes": self.attributes,
            "metadata": self.metadata,
        })
    }
}
