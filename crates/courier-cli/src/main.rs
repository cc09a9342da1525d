use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use courier_core::job::SIMPLE_IDENTIFIER;
use courier_core::worker::decode_parameters;
use courier_core::{
    CourierConfig, CourierError, DataMap, InMemoryQueueService, Job, Message, NamedWorker,
    QueueJob, QueueService, SimpleJob, Worker, WorkerError, WorkerRegistry, observability,
};

/// 引数で設定ファイルが渡されなかったときのデモ設定
const DEMO_CONFIG: &str = r#"{
  "queues": {
    "default": {
      "delete": {"enabled": true},
      "dequeue": {"parameters": {"max_messages": 10}}
    },
    "greetings": {"worker": {"type": "hello"}},
    "audit": {
      "worker": {"type": "hello", "parameters": {"greeting": "Audited"}},
      "delete": {"enabled": false}
    }
  },
  "job": {"types": {"simple": {
    "class": "simple",
    "parameters": {"supported": {
      "nightly": {"parameters": {"workers": [
        {"type": "tick", "parameters": {"label": "compact"}},
        {"type": "tick", "parameters": {"label": "report"}}
      ]}}
    }}
  }}}
}"#;

/// 各 queue に投入するデモ用 body（成功 / 失敗 / worker の例外）
const DEMO_BODIES: [&str; 3] = [r#"{"name": "Alice"}"#, r#"{"name": ""}"#, "not json"];

#[derive(Debug, Deserialize)]
struct HelloMessage {
    body: String,
}

#[derive(Debug, Deserialize)]
struct HelloParameters {
    #[serde(default = "default_greeting")]
    greeting: String,
    message: HelloMessage,
}

fn default_greeting() -> String {
    "Hello".to_string()
}

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

/// body の JSON から name を取り出して挨拶する。name が空なら失敗扱い
struct HelloWorker {
    greeting: String,
    body: String,
    errors: Vec<String>,
}

#[async_trait]
impl Worker for HelloWorker {
    async fn work(&mut self) -> Result<bool, WorkerError> {
        let p: HelloPayload = serde_json::from_str(&self.body)
            .map_err(|e| WorkerError::msg(format!("json decode: {e}")))?;

        if p.name.trim().is_empty() {
            self.errors.push("name is empty".to_string());
            return Ok(false);
        }
        println!("{}, {}!", self.greeting, p.name);
        Ok(true)
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl NamedWorker for HelloWorker {
    const TYPE: &'static str = "hello";

    fn from_parameters(parameters: &DataMap) -> Result<Self, WorkerError> {
        let p: HelloParameters = decode_parameters(parameters)?;
        Ok(Self {
            greeting: p.greeting,
            body: p.message.body,
            errors: Vec::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickParameters {
    label: String,
}

struct TickWorker {
    label: String,
}

#[async_trait]
impl Worker for TickWorker {
    async fn work(&mut self) -> Result<bool, WorkerError> {
        info!(label = %self.label, "tick");
        Ok(true)
    }

    fn tracker_data(&self) -> DataMap {
        let mut data = DataMap::new();
        data.insert("last_label".to_string(), json!(self.label));
        data
    }
}

impl NamedWorker for TickWorker {
    const TYPE: &'static str = "tick";

    fn from_parameters(parameters: &DataMap) -> Result<Self, WorkerError> {
        let p: TickParameters = decode_parameters(parameters)?;
        Ok(Self { label: p.label })
    }
}

fn load_config() -> Result<CourierConfig, CourierError> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading config");
            CourierConfig::from_path(path)
        }
        None => CourierConfig::from_json_str(DEMO_CONFIG),
    }
}

fn print_tracker(label: &str, data: DataMap) {
    let rendered = serde_json::to_string(&Value::Object(data)).unwrap_or_default();
    println!("{label}: {rendered}");
}

/// queue から取れるだけ取り、1 件ずつ QueueJob で処理する
async fn drain_queue(
    service: &Arc<InMemoryQueueService>,
    registry: &WorkerRegistry,
    queue_id: &str,
) -> Result<(), CourierError> {
    for mut message in service.dequeue(queue_id).await? {
        if !message.decode_body_into_metadata() {
            warn!(queue = queue_id, message_id = ?message.identifier(), "body is not JSON");
        }
        // worker 未設定の queue は飛ばして続ける
        let mut job = match QueueJob::new(service.clone(), message, registry) {
            Ok(job) => job,
            Err(e) => {
                warn!(queue = queue_id, error = %e, "cannot build queue job");
                continue;
            }
        };
        match job.process().await {
            Ok(successful) => info!(queue = queue_id, successful, "queue job done"),
            Err(e) => warn!(queue = queue_id, error = %e, "queue job failed"),
        }
        print_tracker("queue job", job.tracker_data());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    observability::init();

    // (A) 設定と WorkerRegistry を用意（参照されている type が全部あるか先に確認）
    let config = load_config()?;
    let mut registry = WorkerRegistry::new();
    registry.register_named::<HelloWorker>()?;
    registry.register_named::<TickWorker>()?;
    registry.expect_types(&config)?;

    // (B) 設定にある全 queue にデモ用メッセージを投入
    let service = Arc::new(InMemoryQueueService::from_config(&config)?);
    let queue_ids: Vec<String> = service.queues().queue_ids().map(str::to_string).collect();
    for queue_id in &queue_ids {
        for body in DEMO_BODIES {
            service.enqueue(Message::new(queue_id.as_str(), body)?).await?;
        }
    }

    // (C) dequeue -> QueueJob -> 成功なら delete
    for queue_id in &queue_ids {
        drain_queue(&service, &registry, queue_id).await?;
        let in_flight = service.in_flight_len(queue_id).await;
        info!(queue = %queue_id, in_flight, "unacknowledged deliveries");
    }

    // (D) job.types の supported ごとに SimpleJob を 1 回ずつ
    let types = Arc::new(config.job.types.clone());
    let factory = Arc::new(registry);
    for (job_type, spec) in config.job.types.iter() {
        for identifier in spec.parameters.supported.keys() {
            let mut job = SimpleJob::new(job_type, Arc::clone(&types), factory.clone());
            let mut parameters = DataMap::new();
            parameters.insert(SIMPLE_IDENTIFIER.to_string(), json!(identifier));
            job.set_parameters(parameters);
            match job.process().await {
                Ok(successful) => info!(job_type, %identifier, successful, "simple job done"),
                Err(e) => warn!(job_type, %identifier, error = %e, "simple job failed"),
            }
            print_tracker("simple job", job.tracker_data());
        }
    }

    Ok(())
}
