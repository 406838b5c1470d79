//! Mock implementation of `TaskRepository`.
//!
//! Provides a thread-safe mock repository with:
//! - Error injection capabilities
//! - Call tracking for verification
//! - The same hierarchy semantics as the real store, kept deliberately
//!   simple (linear scans) since test fixtures are small

use async_trait::async_trait;
use engine_core::{
    error::{EngineError, Result},
    models::{OwnerId, TaskFilter, TaskId, TaskItem},
    repository::{RepositoryStats, TaskRepository},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock implementation of `TaskRepository` for testing.
///
/// Features:
/// - Thread-safe concurrent access
/// - Error injection for failure testing
/// - Call history tracking for verification
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<TaskId, TaskItem>>>,
    error_injection: Arc<Mutex<Option<EngineError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskRepository {
    /// Create a new empty mock repository.
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock repository pre-populated with `tasks`.
    pub fn with_tasks(tasks: Vec<TaskItem>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tasks: Arc::new(Mutex::new(map)),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Inject an error to be returned by the next call.
    pub fn inject_error(&self, error: EngineError) {
        *self.error_injection.lock() = Some(error);
    }

    /// Clear any pending error injection.
    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    /// History of called methods, in call order.
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    /// Panics if `method` was never called. Useful to assert a hook fired.
    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. call history: {history:?}"
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record_call(&self, method: &str) {
        self.call_history.lock().push(format!("{method}()"));
    }

    fn record_call_with_params(&self, method: &str, params: &str) {
        self.call_history.lock().push(format!("{method}({params})"));
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn put(&self, task: TaskItem) -> Result<TaskItem> {
        self.record_call_with_params("put", &format!("id={}", task.id));
        self.check_error_injection()?;
        self.tasks.lock().insert(task.id, task.clone());
        Ok(task)
    }

    async fn add_batch(&self, tasks: Vec<TaskItem>) -> Result<Vec<TaskItem>> {
        self.record_call_with_params("add_batch", &format!("count={}", tasks.len()));
        self.check_error_injection()?;
        let mut guard = self.tasks.lock();
        for task in &tasks {
            guard.insert(task.id, task.clone());
        }
        Ok(tasks)
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskItem>> {
        self.record_call_with_params("get", &format!("id={id}"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn update(&self, task: TaskItem) -> Result<TaskItem> {
        self.record_call_with_params("update", &format!("id={}", task.id));
        self.check_error_injection()?;
        let mut guard = self.tasks.lock();
        if !guard.contains_key(&task.id) {
            return Err(EngineError::not_found(task.id));
        }
        guard.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.record_call_with_params("delete", &format!("id={id}"));
        self.check_error_injection()?;
        self.tasks.lock().remove(&id).ok_or_else(|| EngineError::not_found(id))?;
        Ok(())
    }

    async fn delete_subtree(&self, id: TaskId) -> Result<Vec<TaskId>> {
        self.record_call_with_params("delete_subtree", &format!("id={id}"));
        self.check_error_injection()?;

        let descendants = self.get_descendants(id).await?;
        let mut removal_order: Vec<TaskId> = descendants.iter().map(|t| t.id).collect();
        removal_order.push(id);
        removal_order.reverse();

        let mut guard = self.tasks.lock();
        for task_id in &removal_order {
            guard.remove(task_id);
        }
        Ok(removal_order)
    }

    async fn get_by_owner(&self, owner: &OwnerId, filter: &TaskFilter) -> Result<Vec<TaskItem>> {
        self.record_call_with_params("get_by_owner", owner);
        self.check_error_injection()?;
        let guard = self.tasks.lock();
        let mut results: Vec<TaskItem> = guard
            .values()
            .filter(|t| &t.owner_id == owner)
            .filter(|t| filter.state.map_or(true, |s| t.state == s))
            .filter(|t| filter.group_id.as_ref().map_or(true, |g| &t.group_id == g))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn get_children(&self, id: TaskId) -> Result<Vec<TaskItem>> {
        self.record_call_with_params("get_children", &format!("id={id}"));
        self.check_error_injection()?;
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.parent_task_id == Some(id))
            .cloned()
            .collect())
    }

    async fn get_descendants(&self, id: TaskId) -> Result<Vec<TaskItem>> {
        self.record_call_with_params("get_descendants", &format!("id={id}"));
        self.check_error_injection()?;

        let mut out = Vec::new();
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            let guard = self.tasks.lock();
            for parent_id in frontier {
                for task in guard.values().filter(|t| t.parent_task_id == Some(parent_id)) {
                    out.push(task.clone());
                    next_frontier.push(task.id);
                }
            }
            drop(guard);
            frontier = next_frontier;
        }
        Ok(out)
    }

    async fn child_count(&self, id: TaskId) -> Result<usize> {
        self.record_call_with_params("child_count", &format!("id={id}"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().values().filter(|t| t.parent_task_id == Some(id)).count())
    }

    async fn get_stats(&self) -> Result<RepositoryStats> {
        self.record_call("get_stats");
        self.check_error_injection()?;

        let guard = self.tasks.lock();
        let mut stats = RepositoryStats {
            total_tasks: guard.len() as u64,
            ..Default::default()
        };
        for task in guard.values() {
            *stats.tasks_by_state.entry(task.state).or_insert(0) += 1;
            *stats.tasks_by_group.entry(task.group_id.clone()).or_insert(0) += 1;
        }
        stats.latest_created = guard.values().map(|t| t.created_at).max();
        stats.latest_completed = guard.values().filter_map(|t| t.completed_at).max();
        Ok(stats)
    }

    async fn health_check(&self) -> Result<()> {
        self.record_call("health_check");
        self.check_error_injection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::models::NewTaskRequest;

    #[tokio::test]
    async fn records_call_history() {
        let repo = MockTaskRepository::new();
        let task = TaskItem::from_request(NewTaskRequest::new("echo", "hi"), "alice".into(), None, None);
        repo.put(task.clone()).await.unwrap();
        repo.get(task.id).await.unwrap();
        repo.assert_called("put");
        repo.assert_called("get");
    }

    #[tokio::test]
    async fn injected_error_is_returned_once() {
        let repo = MockTaskRepository::new();
        repo.inject_error(EngineError::repository("boom"));
        let task = TaskItem::from_request(NewTaskRequest::new("echo", "hi"), "alice".into(), None, None);
        assert!(repo.put(task.clone()).await.is_err());
        assert!(repo.put(task).await.is_ok());
    }
}
