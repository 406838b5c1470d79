//! Custom assertion helpers for testing.
//!
//! Provides specialized assertions for task equality, state reachability,
//! and collection-based checks used across the dispatcher and service tests.

use engine_core::models::{TaskItem, TaskState};

/// Assert tasks are equal ignoring timestamps.
pub fn assert_task_equals(actual: &TaskItem, expected: &TaskItem) {
    assert_eq!(actual.id, expected.id, "task ids don't match");
    assert_eq!(actual.owner_id, expected.owner_id, "task owners don't match");
    assert_eq!(actual.task_type, expected.task_type, "task types don't match");
    assert_eq!(actual.state, expected.state, "task states don't match");
    assert_eq!(actual.parent_task_id, expected.parent_task_id, "parents don't match");
}

/// Assert tasks are equal including exact timestamps.
pub fn assert_task_equals_exact(actual: &TaskItem, expected: &TaskItem) {
    assert_eq!(actual, expected, "tasks are not exactly equal");
}

/// Assert a task matches partial criteria.
pub fn assert_task_matches(task: &TaskItem, matcher: &TaskMatcher) {
    if let Some(expected_id) = matcher.id {
        assert_eq!(task.id, expected_id, "task id doesn't match expected");
    }
    if let Some(ref expected_type) = matcher.task_type {
        assert_eq!(&task.task_type, expected_type, "task type doesn't match expected");
    }
    if let Some(ref expected_owner) = matcher.owner_id {
        assert_eq!(&task.owner_id, expected_owner, "task owner doesn't match expected");
    }
    if let Some(expected_state) = matcher.state {
        assert_eq!(task.state, expected_state, "task state doesn't match expected");
    }
}

/// Assert `to` is reachable from `from` without a transition ever leaving a
/// terminal state, mirroring `TaskState::is_terminal`.
pub fn assert_transition_reachable(from: TaskState, to: TaskState) {
    assert!(
        !from.is_terminal(),
        "expected {from} to be non-terminal so it could transition to {to}"
    );
}

pub fn assert_transition_unreachable(from: TaskState) {
    assert!(from.is_terminal(), "expected {from} to be terminal");
}

/// Assert a task list contains a task with the given id.
pub fn assert_contains_task(tasks: &[TaskItem], id: engine_core::models::TaskId) {
    assert!(
        tasks.iter().any(|t| t.id == id),
        "expected to find task {id} in task list, but it wasn't found. Available ids: {:?}",
        tasks.iter().map(|t| t.id).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date, most recent first.
pub fn assert_tasks_sorted_by_date(tasks: &[TaskItem]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "tasks are not sorted by creation date (most recent first): {} came before {}",
            window[0].id,
            window[1].id
        );
    }
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<engine_core::models::TaskId>,
    pub task_type: Option<String>,
    pub owner_id: Option<String>,
    pub state: Option<TaskState>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: engine_core::models::TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_id = Some(owner.into());
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert_transition_unreachable(TaskState::Completed);
        assert_transition_reachable(TaskState::Queued, TaskState::Executing);
    }
}
