//! In-memory stand-in for the task API used by unit tests

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

use crate::client::{
    self, Ack, ApiError, Collection, DeadLetterEntry, Entity, HttpMethod, MutationOp,
    MutationResponse, Page, ReplayOutcome, Resource, ResourceApi, Run, RunStatus, Task,
    AnalyticsSummary,
};

#[derive(Debug, Default)]
struct FakeServer {
    tasks: Vec<Task>,
    runs: Vec<Run>,
    dlq: Vec<DeadLetterEntry>,
    next_id: i64,
}

impl FakeServer {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn task_mut(&mut self, id: i64) -> client::Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(not_found)
    }

    fn summary(&self) -> AnalyticsSummary {
        let successes = self
            .runs
            .iter()
            .filter(|run| run.status == RunStatus::Success)
            .count() as u64;
        let total_runs = self.runs.len() as u64;
        AnalyticsSummary {
            total_tasks: self.tasks.len() as u64,
            total_runs,
            successes,
            failures: total_runs - successes,
            success_rate: if total_runs > 0 {
                successes as f64 * 100.0 / total_runs as f64
            } else {
                0.0
            },
            average_latency_ms: 0.0,
        }
    }
}

fn not_found() -> ApiError {
    ApiError::from_status(
        reqwest::StatusCode::NOT_FOUND,
        Some("Task not found".to_string()),
    )
}

fn page_of<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset).take(page.limit).collect()
}

fn timestamp(id: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(id)
}

/// Behaves like a tiny scheduler API: tasks ordered by id, runs and DLQ
/// newest first, deletes cascade.
#[derive(Default)]
pub struct FakeApi {
    server: Mutex<FakeServer>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    read_failures: Mutex<VecDeque<ApiError>>,
    write_failures: Mutex<VecDeque<ApiError>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_task(&self, url: &str, enabled: bool) -> Task {
        let mut server = self.server.lock().unwrap();
        let id = server.next_id();
        let task = Task {
            id,
            user_id: Some("dev_user".to_string()),
            url: url.to_string(),
            method: HttpMethod::Get,
            schedule_cron: None,
            enabled,
            created_at: timestamp(id),
        };
        server.tasks.push(task.clone());
        task
    }

    pub fn seed_run(&self, task_id: i64, status: RunStatus, latency_ms: i64) -> Run {
        let mut server = self.server.lock().unwrap();
        let id = server.next_id();
        let run = Run {
            id,
            task_id,
            status,
            latency_ms: Some(latency_ms),
            response_code: (status == RunStatus::Success).then_some(200),
            error: (status == RunStatus::Failure).then(|| "boom".to_string()),
            created_at: timestamp(id),
            failure_class: None,
            failure_explanation: None,
        };
        server.runs.push(run.clone());
        run
    }

    pub fn seed_dead_letter(&self, task_id: i64, error: &str) -> DeadLetterEntry {
        let mut server = self.server.lock().unwrap();
        let id = server.next_id();
        let entry = DeadLetterEntry {
            id,
            task_id,
            error: error.to_string(),
            created_at: timestamp(id),
        };
        server.dlq.push(entry.clone());
        entry
    }

    /// The next read computes its response immediately but only returns it
    /// once the returned sender fires (or is dropped)
    pub fn hold_next_read(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.read_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn fail_next_read(&self, err: ApiError) {
        self.read_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_write(&self, err: ApiError) {
        self.write_failures.lock().unwrap().push_back(err);
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn task_count(&self) -> usize {
        self.server.lock().unwrap().tasks.len()
    }

    async fn finish_read<T>(&self, result: client::Result<T>) -> client::Result<T> {
        let gate = self.read_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    fn begin_read(&self) -> Option<ApiError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn list(&self, resource: Resource, page: Page) -> client::Result<Collection> {
        let result = match self.begin_read() {
            Some(err) => Err(err),
            None => {
                let server = self.server.lock().unwrap();
                match resource {
                    Resource::Tasks => Ok(Collection::Tasks(page_of(server.tasks.iter().cloned(), page))),
                    Resource::Runs { task_id } => {
                        if server.tasks.iter().all(|task| task.id != task_id) {
                            Err(not_found())
                        } else {
                            Ok(Collection::Runs(page_of(
                                server.runs.iter().rev().filter(|run| run.task_id == task_id).cloned(),
                                page,
                            )))
                        }
                    }
                    Resource::DeadLetters { task_id } => {
                        if server.tasks.iter().all(|task| task.id != task_id) {
                            Err(not_found())
                        } else {
                            Ok(Collection::DeadLetters(page_of(
                                server.dlq.iter().rev().filter(|entry| entry.task_id == task_id).cloned(),
                                page,
                            )))
                        }
                    }
                    Resource::Analytics => Err(ApiError::Unsupported("list analytics".into())),
                }
            }
        };
        self.finish_read(result).await
    }

    async fn get(&self, resource: Resource, id: Option<i64>) -> client::Result<Entity> {
        let result = match self.begin_read() {
            Some(err) => Err(err),
            None => {
                let mut server = self.server.lock().unwrap();
                match (resource, id) {
                    (Resource::Tasks, Some(id)) => server.task_mut(id).map(|task| Entity::Task(task.clone())),
                    (Resource::Analytics, None) => Ok(Entity::Summary(server.summary())),
                    _ => Err(ApiError::Unsupported("get".into())),
                }
            }
        };
        self.finish_read(result).await
    }

    async fn mutate(
        &self,
        resource: Resource,
        id: Option<i64>,
        op: MutationOp,
        payload: Value,
    ) -> client::Result<MutationResponse> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.write_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut server = self.server.lock().unwrap();
        match (resource, id, op) {
            (Resource::Tasks, None, MutationOp::Create) => {
                let id = server.next_id();
                let task = Task {
                    id,
                    user_id: Some("dev_user".to_string()),
                    url: payload["url"].as_str().unwrap_or_default().to_string(),
                    method: serde_json::from_value(payload["method"].clone())?,
                    schedule_cron: payload["schedule_cron"].as_str().map(str::to_owned),
                    enabled: payload["enabled"].as_bool().unwrap_or(true),
                    created_at: timestamp(id),
                };
                server.tasks.push(task.clone());
                Ok(MutationResponse::Task(task))
            }
            (Resource::Tasks, Some(id), MutationOp::Update) => {
                let task = server.task_mut(id)?;
                if let Some(enabled) = payload["enabled"].as_bool() {
                    task.enabled = enabled;
                }
                if let Some(url) = payload["url"].as_str() {
                    task.url = url.to_string();
                }
                Ok(MutationResponse::Task(task.clone()))
            }
            (Resource::Tasks, Some(id), MutationOp::Delete) => {
                server.task_mut(id)?;
                server.tasks.retain(|task| task.id != id);
                server.runs.retain(|run| run.task_id != id);
                server.dlq.retain(|entry| entry.task_id != id);
                Ok(MutationResponse::Ack(Ack { ok: true }))
            }
            (Resource::DeadLetters { task_id }, Some(dlq_id), MutationOp::Replay) => {
                server.task_mut(task_id)?;
                let before = server.dlq.len();
                server.dlq.retain(|entry| entry.id != dlq_id);
                if server.dlq.len() == before {
                    return Err(ApiError::from_status(
                        reqwest::StatusCode::NOT_FOUND,
                        Some("DLQ entry not found".to_string()),
                    ));
                }
                let run_id = server.next_id();
                server.runs.push(Run {
                    id: run_id,
                    task_id,
                    status: RunStatus::Success,
                    latency_ms: Some(120),
                    response_code: Some(200),
                    error: None,
                    created_at: timestamp(run_id),
                    failure_class: None,
                    failure_explanation: None,
                });
                Ok(MutationResponse::Replay(ReplayOutcome {
                    ok: true,
                    response_code: Some(200),
                    error: None,
                    latency_ms: Some(120),
                }))
            }
            _ => Err(ApiError::Unsupported(format!("{} {}", op, resource))),
        }
    }
}

/// Poll until `condition` holds, yielding to spawned tasks in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
