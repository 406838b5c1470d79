use async_trait::async_trait;
use engine_core::{
    error::{EngineError, Result},
    models::{GroupId, OwnerId, TaskFilter, TaskId, TaskItem},
    repository::{RepositoryStats, TaskRepository},
};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory, process-local `TaskRepository`.
///
/// Tasks live in a `HashMap` behind a single `RwLock`; a secondary
/// `parent_id -> Vec<child_id>` index avoids scanning the whole map for
/// hierarchy queries, which the dispatcher's parent path runs on every
/// poll tick. Neither map survives a process restart.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<TaskId, TaskItem>>,
    children: RwLock<HashMap<TaskId, Vec<TaskId>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a store pre-populated with `tasks`, rebuilding the child index.
    pub fn with_tasks(tasks: Vec<TaskItem>) -> Self {
        let repo = Self::new();
        let mut children = HashMap::new();
        let mut map = HashMap::new();
        for task in tasks {
            if let Some(parent_id) = task.parent_task_id {
                children.entry(parent_id).or_insert_with(Vec::new).push(task.id);
            }
            map.insert(task.id, task);
        }
        *repo.tasks.blocking_write() = map;
        *repo.children.blocking_write() = children;
        repo
    }

    async fn index_child(&self, task: &TaskItem) {
        if let Some(parent_id) = task.parent_task_id {
            self.children.write().await.entry(parent_id).or_insert_with(Vec::new).push(task.id);
        }
    }

    async fn unindex_child(&self, task: &TaskItem) {
        if let Some(parent_id) = task.parent_task_id {
            if let Some(siblings) = self.children.write().await.get_mut(&parent_id) {
                siblings.retain(|id| *id != task.id);
            }
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn put(&self, task: TaskItem) -> Result<TaskItem> {
        debug!(task_id = %task.id, task_type = %task.task_type, "storing new task");
        self.index_child(&task).await;
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn add_batch(&self, tasks: Vec<TaskItem>) -> Result<Vec<TaskItem>> {
        let mut guard = self.tasks.write().await;
        let mut children_guard = self.children.write().await;
        for task in &tasks {
            if let Some(parent_id) = task.parent_task_id {
                children_guard.entry(parent_id).or_insert_with(Vec::new).push(task.id);
            }
            guard.insert(task.id, task.clone());
        }
        Ok(tasks)
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskItem>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, task: TaskItem) -> Result<TaskItem> {
        let mut guard = self.tasks.write().await;
        if !guard.contains_key(&task.id) {
            return Err(EngineError::not_found(task.id));
        }
        guard.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        let removed = self.tasks.write().await.remove(&id);
        if let Some(task) = removed {
            self.unindex_child(&task).await;
            self.children.write().await.remove(&id);
            Ok(())
        } else {
            Err(EngineError::not_found(id))
        }
    }

    async fn delete_subtree(&self, id: TaskId) -> Result<Vec<TaskId>> {
        let root = self.get(id).await?;
        let descendants = self.get_descendants(id).await?;
        // Delete leaves first: reverse BFS order is a valid leaves-first order
        // since every descendant appears after its parent in BFS.
        let mut removal_order: Vec<TaskId> = descendants.iter().map(|t| t.id).collect();
        removal_order.push(id);
        removal_order.reverse();

        let mut guard = self.tasks.write().await;
        let mut children_guard = self.children.write().await;
        for task_id in &removal_order {
            guard.remove(task_id);
            children_guard.remove(task_id);
        }
        drop(guard);
        drop(children_guard);

        if let Some(root_task) = root {
            self.unindex_child(&root_task).await;
        }

        Ok(removal_order)
    }

    async fn get_by_owner(&self, owner: &OwnerId, filter: &TaskFilter) -> Result<Vec<TaskItem>> {
        let guard = self.tasks.read().await;
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
        let child_ids = self.children.read().await.get(&id).cloned().unwrap_or_default();
        let guard = self.tasks.read().await;
        Ok(child_ids.iter().filter_map(|cid| guard.get(cid).cloned()).collect())
    }

    async fn get_descendants(&self, id: TaskId) -> Result<Vec<TaskItem>> {
        let mut out = Vec::new();
        let mut queue: VecDeque<TaskId> = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            let child_ids = self.children.read().await.get(&current).cloned().unwrap_or_default();
            let guard = self.tasks.read().await;
            for child_id in child_ids {
                if let Some(child) = guard.get(&child_id) {
                    out.push(child.clone());
                    queue.push_back(child_id);
                }
            }
        }
        Ok(out)
    }

    async fn child_count(&self, id: TaskId) -> Result<usize> {
        Ok(self.children.read().await.get(&id).map_or(0, |c| c.len()))
    }

    async fn get_stats(&self) -> Result<RepositoryStats> {
        let guard = self.tasks.read().await;
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::models::NewTaskRequest;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let repo = InMemoryTaskRepository::new();
        let task = TaskItem::from_request(
            NewTaskRequest::new("echo", "hi"),
            "alice".to_string(),
            None,
            None,
        );
        repo.put(task.clone()).await.unwrap();
        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[tokio::test]
    async fn delete_subtree_removes_all_descendants() {
        let repo = InMemoryTaskRepository::new();
        let parent = TaskItem::from_request(
            NewTaskRequest::new("sequential-relay", "{}"),
            "alice".to_string(),
            None,
            None,
        );
        repo.put(parent.clone()).await.unwrap();

        let child = TaskItem::child_from_request(NewTaskRequest::new("echo", "a"), &parent);
        repo.put(child.clone()).await.unwrap();
        let grandchild = TaskItem::child_from_request(NewTaskRequest::new("echo", "b"), &child);
        repo.put(grandchild.clone()).await.unwrap();

        let removed = repo.delete_subtree(parent.id).await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(repo.get(parent.id).await.unwrap().is_none());
        assert!(repo.get(child.id).await.unwrap().is_none());
        assert!(repo.get(grandchild.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_children_is_scoped_to_direct_children() {
        let repo = InMemoryTaskRepository::new();
        let parent = TaskItem::from_request(
            NewTaskRequest::new("parallel-fanout", "{}"),
            "alice".to_string(),
            None,
            None,
        );
        repo.put(parent.clone()).await.unwrap();
        let child = TaskItem::child_from_request(NewTaskRequest::new("echo", "a"), &parent);
        repo.put(child.clone()).await.unwrap();
        let grandchild = TaskItem::child_from_request(NewTaskRequest::new("echo", "b"), &child);
        repo.put(grandchild).await.unwrap();

        let children = repo.get_children(parent.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
    }
}
