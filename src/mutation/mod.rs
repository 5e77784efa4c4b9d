//! Writes against the task API and the cache keys each one invalidates.
//!
//! Mutations are never applied optimistically. The cache only learns about a
//! write through the prefixes in [`Mutation::invalidates`], and only after
//! the server accepted it.

mod dispatcher;

pub use dispatcher::MutationDispatcher;

use serde_json::Value;
use std::fmt;

use crate::cache::KeyPrefix;
use crate::client::{self, MutationOp, Resource, TaskForm, TaskUpdate};

/// A user-initiated write
#[derive(Debug, Clone)]
pub enum Mutation {
    CreateTask(TaskForm),
    /// Full edit from the task form
    UpdateTask { id: i64, form: TaskForm },
    SetEnabled { id: i64, enabled: bool },
    DeleteTask { id: i64 },
    ReplayDeadLetter { task_id: i64, dlq_id: i64 },
}

impl Mutation {
    pub fn op(&self) -> MutationOp {
        match self {
            Mutation::CreateTask(_) => MutationOp::Create,
            Mutation::UpdateTask { .. } | Mutation::SetEnabled { .. } => MutationOp::Update,
            Mutation::DeleteTask { .. } => MutationOp::Delete,
            Mutation::ReplayDeadLetter { .. } => MutationOp::Replay,
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Mutation::ReplayDeadLetter { task_id, .. } => Resource::DeadLetters { task_id: *task_id },
            _ => Resource::Tasks,
        }
    }

    /// Id of the entity the request addresses
    pub fn target(&self) -> Option<i64> {
        match self {
            Mutation::CreateTask(_) => None,
            Mutation::UpdateTask { id, .. }
            | Mutation::SetEnabled { id, .. }
            | Mutation::DeleteTask { id } => Some(*id),
            Mutation::ReplayDeadLetter { dlq_id, .. } => Some(*dlq_id),
        }
    }

    /// Safe to resend after a network failure
    pub fn is_idempotent(&self) -> bool {
        matches!(self.op(), MutationOp::Update | MutationOp::Delete)
    }

    /// Validate the input and build the request body
    pub fn payload(&self) -> client::Result<Value> {
        let payload = match self {
            Mutation::CreateTask(form) => serde_json::to_value(form.to_create()?)?,
            Mutation::UpdateTask { form, .. } => serde_json::to_value(form.to_update()?)?,
            Mutation::SetEnabled { enabled, .. } => {
                serde_json::to_value(TaskUpdate::enabled(*enabled))?
            }
            Mutation::DeleteTask { .. } => Value::Null,
            Mutation::ReplayDeadLetter { .. } => Value::Object(Default::default()),
        };
        Ok(payload)
    }

    /// Key prefixes made stale by a successful write
    pub fn invalidates(&self) -> Vec<KeyPrefix> {
        match self {
            Mutation::CreateTask(_) | Mutation::UpdateTask { .. } | Mutation::SetEnabled { .. } => {
                vec![KeyPrefix::tasks()]
            }
            Mutation::DeleteTask { id } => vec![
                KeyPrefix::tasks(),
                KeyPrefix::runs(*id),
                KeyPrefix::dead_letters(*id),
            ],
            Mutation::ReplayDeadLetter { task_id, .. } => vec![
                KeyPrefix::dead_letters(*task_id),
                KeyPrefix::runs(*task_id),
            ],
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::CreateTask(form) => write!(f, "create task {}", form.url.trim()),
            Mutation::UpdateTask { id, .. } => write!(f, "update task {}", id),
            Mutation::SetEnabled { id, enabled: true } => write!(f, "enable task {}", id),
            Mutation::SetEnabled { id, enabled: false } => write!(f, "disable task {}", id),
            Mutation::DeleteTask { id } => write!(f, "delete task {}", id),
            Mutation::ReplayDeadLetter { task_id, dlq_id } => {
                write!(f, "replay dlq {} of task {}", dlq_id, task_id)
            }
        }
    }
}
