//! Domain model (IDs, messages).

pub mod ids;
pub mod message;

pub use ids::{JobId, MessageId, ReceiptHandle};
pub use message::{Message, RECEIPT_HANDLE_ATTRIBUTE};

/// Free-form string-keyed data: parameters, context, output, tracker data,
/// message attributes and metadata.
pub type DataMap = serde_json::Map<String, serde_json::Value>;
