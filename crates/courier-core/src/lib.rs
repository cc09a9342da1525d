//! courier-core
//!
//! Job lifecycle + queue-backed dispatch.
//!
//! # モジュール構成
//! - **domain**: ids, Message
//! - **config**: 型付き設定（queues / job.types）と default マージ
//! - **worker**: Worker trait, WorkerFactory, WorkerRegistry
//! - **service**: QueueService trait と InMemoryQueueService
//! - **job**: JobCore, SimpleJob, QueueJob
//! - **ports**: Clock, IdGenerator
//! - **observability**: tracing subscriber の初期化

pub mod config;
pub mod domain;
pub mod error;
pub mod job;
pub mod observability;
pub mod ports;
pub mod service;
pub mod worker;

pub use config::{CourierConfig, QueueConfig, QueueRegistry};
pub use domain::{DataMap, JobId, Message};
pub use error::{CourierError, QueueOperation};
pub use job::{Job, JobEnv, QueueJob, SimpleJob};
pub use service::{InMemoryQueueService, QueueService};
pub use worker::{NamedWorker, Worker, WorkerError, WorkerFactory, WorkerRegistry};
