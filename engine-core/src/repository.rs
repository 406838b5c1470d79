use crate::{
    error::Result,
    models::{GroupId, OwnerId, TaskFilter, TaskId, TaskItem, TaskState},
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Storage interface for task persistence.
///
/// Implementations must be thread-safe and support concurrent access from
/// the dispatcher's worker tasks and the task service's request handlers
/// alike. Hierarchy-aware operations (`get_children`, `get_descendants`,
/// `delete_subtree`) exist because the dispatcher needs to walk and mutate
/// whole subtrees without the caller re-deriving the tree from scratch.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task. Errors if a task with the same id already exists.
    async fn put(&self, task: TaskItem) -> Result<TaskItem>;

    /// Insert an entire subtree atomically: either every task lands or none does.
    async fn add_batch(&self, tasks: Vec<TaskItem>) -> Result<Vec<TaskItem>>;

    /// Fetch a task by id.
    async fn get(&self, id: TaskId) -> Result<Option<TaskItem>>;

    /// Replace a task's stored value. The caller is responsible for the
    /// state-transition and terminal-state invariants; this is a raw write.
    async fn update(&self, task: TaskItem) -> Result<TaskItem>;

    /// Permanently remove a single task. Does not touch its children.
    async fn delete(&self, id: TaskId) -> Result<()>;

    /// Remove a task and its entire subtree, children before parents.
    async fn delete_subtree(&self, id: TaskId) -> Result<Vec<TaskId>>;

    /// List tasks owned by `owner`, optionally narrowed by `filter`.
    async fn get_by_owner(&self, owner: &OwnerId, filter: &TaskFilter) -> Result<Vec<TaskItem>>;

    /// Direct children of `id`, in no particular order.
    async fn get_children(&self, id: TaskId) -> Result<Vec<TaskItem>>;

    /// Every descendant of `id`, gathered breadth-first.
    async fn get_descendants(&self, id: TaskId) -> Result<Vec<TaskItem>>;

    /// Number of direct children of `id`.
    async fn child_count(&self, id: TaskId) -> Result<usize>;

    /// Aggregate counters for monitoring.
    async fn get_stats(&self) -> Result<RepositoryStats>;

    /// Confirm the repository is reachable and able to serve requests.
    async fn health_check(&self) -> Result<()>;
}

/// Aggregate counters for monitoring, returned by `TaskRepository::get_stats`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepositoryStats {
    pub total_tasks: u64,
    pub tasks_by_state: HashMap<TaskState, u64>,
    pub tasks_by_group: HashMap<GroupId, u64>,
    pub latest_created: Option<chrono::DateTime<chrono::Utc>>,
    pub latest_completed: Option<chrono::DateTime<chrono::Utc>>,
}
