use crate::models::{OwnerId, TaskId, TaskItem, TaskState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened to a task, published fire-and-forget to whoever
/// is listening. Delivery is at-least-once and ordered per task, never
/// reordered or deduplicated across the whole event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was inserted, whether by `create` or as a node of `create_hierarchy`.
    Created { task: TaskItem },
    /// A `Queued` task's priority or payload was changed via `update`.
    Updated { task: TaskItem },
    /// A task was removed from the repository, individually or as part of a subtree delete.
    Deleted { task_id: TaskId, owner_id: OwnerId },
    /// A task's progress changed, either reported directly by its executor
    /// or derived from a weighted average of its children.
    Progress {
        task_id: TaskId,
        root_task_id: TaskId,
        progress: f64,
        details: Option<String>,
        payload: Option<String>,
        /// `true` when this progress was computed from children rather than
        /// reported by the task's own executor.
        is_aggregated: bool,
        at: DateTime<Utc>,
    },
    /// A task transitioned from one state to another.
    StateChanged {
        task_id: TaskId,
        root_task_id: TaskId,
        from: TaskState,
        to: TaskState,
        details: Option<String>,
        at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Created { task } | TaskEvent::Updated { task } => task.id,
            TaskEvent::Deleted { task_id, .. } => *task_id,
            TaskEvent::Progress { task_id, .. } | TaskEvent::StateChanged { task_id, .. } => *task_id,
        }
    }

    pub fn root_task_id(&self) -> TaskId {
        match self {
            TaskEvent::Created { task } | TaskEvent::Updated { task } => task.root_task_id,
            TaskEvent::Deleted { task_id, .. } => *task_id,
            TaskEvent::Progress { root_task_id, .. } | TaskEvent::StateChanged { root_task_id, .. } => {
                *root_task_id
            }
        }
    }
}

/// Fan-out sink for [`TaskEvent`]s.
///
/// Publication is fire-and-forget: a `publish` call that finds no
/// subscribers is not an error, and a slow or absent subscriber never blocks
/// the dispatcher.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: TaskEvent);
}

/// An [`EventPublisher`] that discards everything. Useful for embedders that
/// don't want an event stream and for benchmarks that don't want the
/// overhead of one.
#[derive(Debug, Default, Clone)]
pub struct NullEventPublisher;

#[async_trait]
impl EventPublisher for NullEventPublisher {
    async fn publish(&self, _event: TaskEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn event_accessors_match_constructed_fields() {
        let task_id = Uuid::now_v7();
        let root_task_id = Uuid::now_v7();
        let event = TaskEvent::Progress {
            task_id,
            root_task_id,
            progress: 42.0,
            details: None,
            payload: None,
            is_aggregated: false,
            at: Utc::now(),
        };
        assert_eq!(event.task_id(), task_id);
        assert_eq!(event.root_task_id(), root_task_id);
    }

    #[tokio::test]
    async fn null_publisher_accepts_any_event() {
        let publisher = NullEventPublisher;
        publisher
            .publish(TaskEvent::Deleted { task_id: Uuid::now_v7(), owner_id: "alice".to_string() })
            .await;
    }
}
