//! Typed request/response boundary to the task scheduler API.
//!
//! [`ResourceApi`] is the seam the cache and dispatcher talk to. It performs
//! exactly one request per call: no caching, no retries.

pub mod error;
pub mod http;
pub mod models;
pub mod utils;
pub mod validation;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub use error::ApiError;
pub use http::HttpResourceClient;
pub use models::{
    Ack, AnalyticsSummary, DeadLetterEntry, HeadersMap, HttpMethod, ReplayOutcome, Run, RunStatus,
    Task, TaskCreate, TaskUpdate,
};
pub use validation::{TaskForm, ValidationError};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Remote resource families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Tasks,
    Runs { task_id: i64 },
    DeadLetters { task_id: i64 },
    Analytics,
}

impl Resource {
    /// Collection path relative to the API base
    pub fn path(&self) -> String {
        match self {
            Resource::Tasks => "tasks/".to_string(),
            Resource::Runs { task_id } => format!("tasks/{}/runs", task_id),
            Resource::DeadLetters { task_id } => format!("tasks/{}/dlq", task_id),
            Resource::Analytics => "analytics/summary".to_string(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Tasks => f.write_str("tasks"),
            Resource::Runs { task_id } => write!(f, "runs:{}", task_id),
            Resource::DeadLetters { task_id } => write!(f, "dlq:{}", task_id),
            Resource::Analytics => f.write_str("analytics"),
        }
    }
}

/// Limit/offset window of a list request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    Tasks(Vec<Task>),
    Runs(Vec<Run>),
    DeadLetters(Vec<DeadLetterEntry>),
}

impl Collection {
    pub fn len(&self) -> usize {
        match self {
            Collection::Tasks(rows) => rows.len(),
            Collection::Runs(rows) => rows.len(),
            Collection::DeadLetters(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Task(Task),
    Summary(AnalyticsSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    Update,
    Delete,
    Replay,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationOp::Create => "create",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
            MutationOp::Replay => "replay",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationResponse {
    Task(Task),
    Ack(Ack),
    Replay(ReplayOutcome),
}

/// Remote API contract: list, get and mutate
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch one page of a collection
    async fn list(&self, resource: Resource, page: Page) -> Result<Collection>;

    /// Fetch a single entity; `id` is `None` for singleton resources
    async fn get(&self, resource: Resource, id: Option<i64>) -> Result<Entity>;

    /// Perform a write against the resource
    async fn mutate(
        &self,
        resource: Resource,
        id: Option<i64>,
        op: MutationOp,
        payload: Value,
    ) -> Result<MutationResponse>;
}
