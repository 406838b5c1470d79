//! `TaskService`: the public, owner-scoped API in front of the repository
//! and queue. A thin typed wrapper translating request structs into
//! repository calls and publishing the resulting events — the dispatcher is
//! the only other writer of task state, and only while a task is `Executing`.

use crate::aggregator::aggregate_from_child;
use crate::queue::TaskQueue;
use crate::running::RunningTasks;
use chrono::Utc;
use engine_core::error::{EngineError, Result};
use engine_core::events::{EventPublisher, TaskEvent};
use engine_core::models::{
    HierarchyRequest, NewTaskRequest, OwnerId, TaskFilter, TaskId, TaskItem, TaskState,
    UpdateTaskRequest,
};
use engine_core::repository::TaskRepository;
use std::sync::Arc;

pub struct TaskService<R: TaskRepository> {
    repo: Arc<R>,
    publisher: Arc<dyn EventPublisher>,
    queue: Arc<TaskQueue>,
    running: Arc<RunningTasks>,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(
        repo: Arc<R>,
        publisher: Arc<dyn EventPublisher>,
        queue: Arc<TaskQueue>,
        running: Arc<RunningTasks>,
    ) -> Self {
        Self { repo, publisher, queue, running }
    }

    /// Create a single task. If `req.parent_task_id` is set the parent must
    /// exist and share `owner_id`; the new task inherits `root_task_id`,
    /// `auth_token`, and `track_history` from it.
    pub async fn create(
        &self,
        req: NewTaskRequest,
        owner_id: OwnerId,
        auth_token: Option<String>,
    ) -> Result<TaskItem> {
        let parent_id = req.parent_task_id;
        let task = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .repo
                    .get(parent_id)
                    .await?
                    .ok_or_else(|| EngineError::invalid_request("parent task not found"))?;
                if parent.owner_id != owner_id {
                    return Err(EngineError::invalid_request("parent task has a different owner"));
                }
                TaskItem::child_from_request(req, &parent)
            }
            None => TaskItem::from_request(req, owner_id, None, auth_token),
        };

        let created = self.repo.put(task).await?;
        self.queue.enqueue(created.id, created.group_id.clone(), created.priority);
        self.publisher.publish(TaskEvent::Created { task: created.clone() }).await;
        Ok(created)
    }

    /// Materialize an entire tree atomically, assigning every non-root node
    /// `root_task_id = root.id`. Only the root is enqueued; the dispatcher's
    /// parent path enqueues the rest as it orchestrates.
    pub async fn create_hierarchy(
        &self,
        request: HierarchyRequest,
        owner_id: OwnerId,
        auth_token: Option<String>,
    ) -> Result<TaskItem> {
        let nodes = materialize_hierarchy(&request, &owner_id, &auth_token, None);
        let root = nodes[0].clone();
        let inserted = self.repo.add_batch(nodes).await?;
        self.queue.enqueue(root.id, root.group_id.clone(), root.priority);
        for node in &inserted {
            self.publisher.publish(TaskEvent::Created { task: node.clone() }).await;
        }
        Ok(root)
    }

    /// Returns `None` if the task doesn't exist or isn't owned by `owner`.
    pub async fn get(&self, id: TaskId, owner: &OwnerId) -> Result<Option<TaskItem>> {
        match self.repo.get(id).await? {
            Some(task) if &task.owner_id == owner => Ok(Some(task)),
            _ => Ok(None),
        }
    }

    pub async fn list_owner_tasks(&self, owner: &OwnerId) -> Result<Vec<TaskItem>> {
        let mut tasks = self.repo.get_by_owner(owner, &TaskFilter::default()).await?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Update priority and/or payload. Fails unless the task is `Queued`.
    pub async fn update(
        &self,
        id: TaskId,
        owner: &OwnerId,
        req: UpdateTaskRequest,
    ) -> Result<TaskItem> {
        let mut task = self.owned_task(id, owner).await?;
        if task.state != TaskState::Queued {
            return Err(EngineError::unexpected_state(id, TaskState::Queued, task.state));
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        if let Some(payload) = req.payload {
            task.payload = payload;
        }
        task.updated_at = Utc::now();
        let updated = self.repo.update(task).await?;
        self.publisher.publish(TaskEvent::Updated { task: updated.clone() }).await;
        Ok(updated)
    }

    /// Cancel a task: tombstone it if still `Queued`, fire its cancellation
    /// token if `Executing`. A no-op on a task already in a terminal state.
    pub async fn cancel(&self, id: TaskId, owner: &OwnerId) -> Result<TaskItem> {
        self.owned_task(id, owner).await?;
        self.cancel_with_details(id, "Cancelled by user request").await
    }

    /// Cancel every descendant leaves-first, then the node itself.
    pub async fn cancel_subtree(&self, id: TaskId, owner: &OwnerId) -> Result<Vec<TaskItem>> {
        self.owned_task(id, owner).await?;
        let descendants = self.repo.get_descendants(id).await?;
        let mut results = Vec::with_capacity(descendants.len() + 1);
        for descendant in descendants.into_iter().rev() {
            results.push(self.cancel_with_details(descendant.id, "Cancelled (cascade from parent)").await?);
        }
        results.push(self.cancel_with_details(id, "Cancelled by user request (with subtree)").await?);
        Ok(results)
    }

    /// Cancel if still alive, then remove. Publishes `Deleted`.
    pub async fn delete(&self, id: TaskId, owner: &OwnerId) -> Result<()> {
        let task = self.owned_task(id, owner).await?;
        if !task.is_terminal() {
            self.cancel_with_details(id, "Cancelled by user request").await?;
        }
        self.repo.delete(id).await?;
        self.publisher.publish(TaskEvent::Deleted { task_id: id, owner_id: owner.clone() }).await;
        Ok(())
    }

    /// Cancel the subtree, then remove it atomically. Publishes `Deleted` per node.
    pub async fn delete_subtree(&self, id: TaskId, owner: &OwnerId) -> Result<Vec<TaskId>> {
        self.owned_task(id, owner).await?;
        self.cancel_subtree(id, owner).await?;
        let removed = self.repo.delete_subtree(id).await?;
        for removed_id in &removed {
            self.publisher
                .publish(TaskEvent::Deleted { task_id: *removed_id, owner_id: owner.clone() })
                .await;
        }
        Ok(removed)
    }

    /// Attach a dynamically-created child to an `Executing` parent.
    pub async fn add_subtask(&self, parent_id: TaskId, req: NewTaskRequest) -> Result<TaskItem> {
        let parent = self
            .repo
            .get(parent_id)
            .await?
            .ok_or_else(|| EngineError::not_found(parent_id))?;
        if parent.state != TaskState::Executing {
            return Err(EngineError::unexpected_state(parent_id, TaskState::Executing, parent.state));
        }
        let child = TaskItem::child_from_request(req, &parent);
        let created = self.repo.put(child).await?;
        self.queue.enqueue(created.id, created.group_id.clone(), created.priority);
        self.publisher.publish(TaskEvent::Created { task: created.clone() }).await;
        aggregate_from_child(self.repo.as_ref(), self.publisher.as_ref(), created.id).await?;
        Ok(created)
    }

    /// Same as `add_subtask`, in bulk; returns results in request order.
    pub async fn add_subtasks(
        &self,
        parent_id: TaskId,
        requests: Vec<NewTaskRequest>,
    ) -> Result<Vec<TaskItem>> {
        let mut created = Vec::with_capacity(requests.len());
        for req in requests {
            created.push(self.add_subtask(parent_id, req).await?);
        }
        Ok(created)
    }

    pub async fn set_output(&self, id: TaskId, output: impl Into<String>) -> Result<TaskItem> {
        let mut task = self.repo.get(id).await?.ok_or_else(|| EngineError::not_found(id))?;
        task.output = Some(output.into());
        task.updated_at = Utc::now();
        self.repo.update(task).await
    }

    /// Replace a `Queued` task's payload. Fails otherwise.
    pub async fn update_queued_payload(
        &self,
        id: TaskId,
        payload: impl Into<String>,
    ) -> Result<TaskItem> {
        let mut task = self.repo.get(id).await?.ok_or_else(|| EngineError::not_found(id))?;
        if task.state != TaskState::Queued {
            return Err(EngineError::unexpected_state(id, TaskState::Queued, task.state));
        }
        task.payload = payload.into();
        task.updated_at = Utc::now();
        self.repo.update(task).await
    }

    async fn owned_task(&self, id: TaskId, owner: &OwnerId) -> Result<TaskItem> {
        let task = self.repo.get(id).await?.ok_or_else(|| EngineError::not_found(id))?;
        if &task.owner_id != owner {
            return Err(EngineError::forbidden(owner.clone(), id));
        }
        Ok(task)
    }

    /// Shared cancellation path for `cancel`/`cancel_subtree`: a no-op (no
    /// state change, no event) if the task is already terminal.
    async fn cancel_with_details(&self, id: TaskId, details: &str) -> Result<TaskItem> {
        let mut task = self.repo.get(id).await?.ok_or_else(|| EngineError::not_found(id))?;
        if task.is_terminal() {
            return Ok(task);
        }
        match task.state {
            TaskState::Queued => self.queue.try_cancel(id),
            TaskState::Executing => {
                self.running.cancel(id).await;
            }
            _ => unreachable!("terminal states already returned above"),
        }
        let from = task.state;
        task.transition(TaskState::Cancelled, Some(details.to_string()));
        let updated = self.repo.update(task).await?;
        self.publisher
            .publish(TaskEvent::StateChanged {
                task_id: updated.id,
                root_task_id: updated.root_task_id,
                from,
                to: TaskState::Cancelled,
                details: updated.state_details.clone(),
                at: Utc::now(),
            })
            .await;
        Ok(updated)
    }
}

fn materialize_hierarchy(
    node: &HierarchyRequest,
    owner_id: &OwnerId,
    auth_token: &Option<String>,
    parent: Option<&TaskItem>,
) -> Vec<TaskItem> {
    let task = match parent {
        Some(parent) => TaskItem::child_from_request(node.root.clone(), parent),
        None => TaskItem::from_request(node.root.clone(), owner_id.clone(), None, auth_token.clone()),
    };
    let mut all = vec![task.clone()];
    for child in &node.children {
        all.extend(materialize_hierarchy(child, owner_id, auth_token, Some(&task)));
    }
    all
}
