//! Builder pattern implementations for easy test data construction.
//!
//! Provides fluent builders for `TaskItem` and request types so tests don't
//! repeat all of `TaskItem`'s fields when only one or two matter.

use chrono::{DateTime, Utc};
use engine_core::models::{NewTaskRequest, TaskFilter, TaskId, TaskItem, TaskState};

/// Builder for constructing `TaskItem` instances in tests.
pub struct TaskItemBuilder {
    task: TaskItem,
}

impl Default for TaskItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskItemBuilder {
    pub fn new() -> Self {
        let req = NewTaskRequest::new("echo", "test-payload");
        Self {
            task: TaskItem::from_request(req, "test-owner".to_string(), None, None),
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task.task_type = task_type.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.task.owner_id = owner.into();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.task.group_id = group_id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.task.state = state;
        if state.is_terminal() && self.task.completed_at.is_none() {
            self.task.completed_at = Some(Utc::now());
        }
        self
    }

    pub fn with_parent(mut self, parent: &TaskItem) -> Self {
        self.task.parent_task_id = Some(parent.id);
        self.task.root_task_id = parent.root_task_id;
        self.task.owner_id = parent.owner_id.clone();
        self.task.group_id = parent.group_id.clone();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.task.weight = weight;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn build(self) -> TaskItem {
        self.task
    }
}

/// Builder for constructing `NewTaskRequest` instances in tests.
pub struct NewTaskRequestBuilder {
    request: NewTaskRequest,
}

impl Default for NewTaskRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: NewTaskRequest::new("echo", "test-payload"),
        }
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.request.task_type = task_type.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.request.payload = payload.into();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.request.group_id = Some(group_id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.request.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.request.weight = Some(weight);
        self
    }

    pub fn build(self) -> NewTaskRequest {
        self.request
    }
}

/// Builder for constructing `TaskFilter` instances in tests.
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl Default for TaskFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        Self {
            filter: TaskFilter::default(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.filter.owner = Some(owner.into());
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.filter.state = Some(state);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.filter.group_id = Some(group_id.into());
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_item_builder_applies_overrides() {
        let task = TaskItemBuilder::new()
            .with_task_type("countdown")
            .with_priority(7)
            .with_state(TaskState::Completed)
            .build();
        assert_eq!(task.task_type, "countdown");
        assert_eq!(task.priority, 7);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn child_builder_inherits_parent_tree_fields() {
        let parent = TaskItemBuilder::new().with_group("g1").build();
        let child = TaskItemBuilder::new().with_parent(&parent).build();
        assert_eq!(child.parent_task_id, Some(parent.id));
        assert_eq!(child.root_task_id, parent.root_task_id);
        assert_eq!(child.group_id, "g1");
    }
}
