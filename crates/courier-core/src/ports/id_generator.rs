//! IdGenerator port - ID 生成の抽象化
//!
//! Job / Message / receipt handle の ID を生成します。
//! テスト容易性のために trait として抽象化しています。

use crate::domain::ids::{JobId, MessageId, ReceiptHandle};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator produces identifiers usable across processes.
///
/// `Send + Sync` を要求（複数ジョブから共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;

    fn generate_message_id(&self) -> MessageId;

    fn generate_receipt_handle(&self) -> ReceiptHandle;
}

/// ULID generator whose timestamp component comes from a `Clock`.
///
/// With a `FixedClock` the timestamp part is deterministic; the random part
/// still keeps IDs unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        JobId::from(self.next_ulid())
    }

    fn generate_message_id(&self) -> MessageId {
        MessageId::from(self.next_ulid())
    }

    fn generate_receipt_handle(&self) -> ReceiptHandle {
        ReceiptHandle::from(self.next_ulid())
    }
}
