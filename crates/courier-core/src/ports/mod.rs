//! Ports - 抽象化レイヤー
//!
//! 時刻と ID 生成は trait で差し替え可能にしておき、
//! テストでは `FixedClock` を使って決定的にします。

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
