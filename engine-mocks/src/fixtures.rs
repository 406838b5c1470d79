//! Standard test fixtures for consistent testing.
//!
//! Pre-built tasks and requests covering the common scenarios: a bare leaf
//! task, a task in each lifecycle state, and small parent/child trees.

use engine_core::models::{NewTaskRequest, TaskItem, TaskState};

/// A basic leaf task with sensible defaults.
pub fn create_test_task() -> TaskItem {
    TaskItem::from_request(
        NewTaskRequest::new("echo", "{}"),
        "test-owner".to_string(),
        None,
        None,
    )
}

/// A task with a specific state, with timestamps stamped as that state implies.
pub fn create_test_task_with_state(state: TaskState) -> TaskItem {
    let mut task = create_test_task();
    if state == TaskState::Queued {
        return task;
    }
    task.transition(TaskState::Executing, None);
    if state != TaskState::Executing {
        task.transition(state, None);
    }
    task
}

/// A task owned by `owner`.
pub fn create_test_task_with_owner(owner: &str) -> TaskItem {
    let mut task = create_test_task();
    task.owner_id = owner.to_string();
    task
}

/// `count` unique leaf tasks, distributed across 3 owners and 4 states.
pub fn create_test_tasks(count: usize) -> Vec<TaskItem> {
    (0..count)
        .map(|i| {
            let mut task = TaskItem::from_request(
                NewTaskRequest::new("echo", format!("payload-{i}")),
                format!("owner-{}", i % 3),
                None,
                None,
            );
            match i % 4 {
                0 => {}
                1 => {
                    task.transition(TaskState::Executing, None);
                }
                2 => {
                    task.transition(TaskState::Executing, None);
                    task.transition(TaskState::Completed, None);
                }
                _ => {
                    task.transition(TaskState::Executing, None);
                    task.transition(TaskState::Errored, None);
                }
            }
            task
        })
        .collect()
}

/// One task in each possible lifecycle state.
pub fn create_tasks_in_all_states() -> Vec<TaskItem> {
    [
        TaskState::Queued,
        TaskState::Executing,
        TaskState::Completed,
        TaskState::Cancelled,
        TaskState::Errored,
        TaskState::Terminated,
    ]
    .into_iter()
    .map(create_test_task_with_state)
    .collect()
}

/// A root task with `child_count` queued children.
pub fn create_task_tree(child_count: usize) -> (TaskItem, Vec<TaskItem>) {
    let root = TaskItem::from_request(
        NewTaskRequest::new("parallel-fanout", "{}"),
        "test-owner".to_string(),
        None,
        None,
    );
    let children = (0..child_count)
        .map(|i| TaskItem::child_from_request(NewTaskRequest::new("echo", format!("child-{i}")), &root))
        .collect();
    (root, children)
}

/// A standard creation request for testing.
pub fn create_new_task_request() -> NewTaskRequest {
    NewTaskRequest::new("echo", "{\"message\":\"hello\"}")
}

/// A creation request with a specific task type.
pub fn create_new_task_request_with_type(task_type: &str) -> NewTaskRequest {
    let mut req = create_new_task_request();
    req.task_type = task_type.to_string();
    req
}
