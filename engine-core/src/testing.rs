//! Shared contract tests for [`TaskRepository`](crate::repository::TaskRepository)
//! implementations. Every backing store drives this suite against its own
//! instance so the in-memory store, the mock store, and any future store
//! behave identically from the dispatcher's point of view.

use crate::{
    models::{NewTaskRequest, TaskFilter, TaskItem, TaskState},
    repository::TaskRepository,
};
use std::sync::Arc;
use uuid::Uuid;

/// Run every contract test against `repo`. Intended to be called once per
/// implementation from that implementation's own test suite:
///
/// ```ignore
/// #[tokio::test]
/// async fn contract() {
///     let repo = Arc::new(InMemoryTaskRepository::new());
///     engine_core::testing::test_repository_contract(repo).await;
/// }
/// ```
pub async fn test_repository_contract<R: TaskRepository + 'static>(repo: Arc<R>) {
    test_health_check(repo.clone()).await;
    test_put_and_get(repo.clone()).await;
    test_get_missing_returns_none(repo.clone()).await;
    test_update_roundtrips(repo.clone()).await;
    test_delete_removes_task(repo.clone()).await;
    test_hierarchy_queries(repo.clone()).await;
    test_delete_subtree_removes_children_first(repo.clone()).await;
    test_add_batch_is_atomic_on_success(repo.clone()).await;
    test_get_by_owner_filters(repo.clone()).await;
    test_stats_reflect_inserts(repo).await;
}

fn root_task(task_type: &str, owner: &str) -> TaskItem {
    TaskItem::from_request(NewTaskRequest::new(task_type, "{}"), owner.to_string(), None, None)
}

async fn test_health_check<R: TaskRepository>(repo: Arc<R>) {
    assert!(repo.health_check().await.is_ok());
}

async fn test_put_and_get<R: TaskRepository>(repo: Arc<R>) {
    let task = root_task("echo", "owner-put-get");
    let created = repo.put(task.clone()).await.unwrap();
    assert_eq!(created.id, task.id);

    let fetched = repo.get(task.id).await.unwrap();
    assert_eq!(fetched, Some(created));
}

async fn test_get_missing_returns_none<R: TaskRepository>(repo: Arc<R>) {
    let missing = repo.get(Uuid::now_v7()).await.unwrap();
    assert!(missing.is_none());
}

async fn test_update_roundtrips<R: TaskRepository>(repo: Arc<R>) {
    let mut task = root_task("echo", "owner-update");
    repo.put(task.clone()).await.unwrap();

    task.transition(TaskState::Executing, None);
    let updated = repo.update(task.clone()).await.unwrap();
    assert_eq!(updated.state, TaskState::Executing);

    let fetched = repo.get(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.state, TaskState::Executing);
}

async fn test_delete_removes_task<R: TaskRepository>(repo: Arc<R>) {
    let task = root_task("echo", "owner-delete");
    repo.put(task.clone()).await.unwrap();
    repo.delete(task.id).await.unwrap();
    assert!(repo.get(task.id).await.unwrap().is_none());
}

async fn test_hierarchy_queries<R: TaskRepository>(repo: Arc<R>) {
    let parent = root_task("sequential-relay", "owner-hierarchy");
    repo.put(parent.clone()).await.unwrap();

    let child_a = TaskItem::child_from_request(NewTaskRequest::new("echo", "a"), &parent);
    let child_b = TaskItem::child_from_request(NewTaskRequest::new("echo", "b"), &parent);
    repo.put(child_a.clone()).await.unwrap();
    repo.put(child_b.clone()).await.unwrap();

    let grandchild = TaskItem::child_from_request(NewTaskRequest::new("echo", "c"), &child_a);
    repo.put(grandchild.clone()).await.unwrap();

    let children = repo.get_children(parent.id).await.unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(repo.child_count(parent.id).await.unwrap(), 2);

    let descendants = repo.get_descendants(parent.id).await.unwrap();
    assert_eq!(descendants.len(), 3);
    assert!(descendants.iter().any(|t| t.id == grandchild.id));
}

async fn test_delete_subtree_removes_children_first<R: TaskRepository>(repo: Arc<R>) {
    let parent = root_task("sequential-relay", "owner-subtree");
    repo.put(parent.clone()).await.unwrap();
    let child = TaskItem::child_from_request(NewTaskRequest::new("echo", "x"), &parent);
    repo.put(child.clone()).await.unwrap();

    let removed = repo.delete_subtree(parent.id).await.unwrap();
    assert_eq!(removed.len(), 2);
    assert!(repo.get(parent.id).await.unwrap().is_none());
    assert!(repo.get(child.id).await.unwrap().is_none());
}

async fn test_add_batch_is_atomic_on_success<R: TaskRepository>(repo: Arc<R>) {
    let parent = root_task("parallel-fanout", "owner-batch");
    let child_a = TaskItem::child_from_request(NewTaskRequest::new("echo", "a"), &parent);
    let child_b = TaskItem::child_from_request(NewTaskRequest::new("echo", "b"), &parent);

    let batch = vec![parent.clone(), child_a.clone(), child_b.clone()];
    let inserted = repo.add_batch(batch).await.unwrap();
    assert_eq!(inserted.len(), 3);

    assert!(repo.get(parent.id).await.unwrap().is_some());
    assert!(repo.get(child_a.id).await.unwrap().is_some());
    assert!(repo.get(child_b.id).await.unwrap().is_some());
}

async fn test_get_by_owner_filters<R: TaskRepository>(repo: Arc<R>) {
    let task = root_task("echo", "owner-filter-target");
    repo.put(task.clone()).await.unwrap();

    let other = root_task("echo", "owner-filter-other");
    repo.put(other).await.unwrap();

    let filter = TaskFilter::default();
    let owned = repo.get_by_owner(&"owner-filter-target".to_string(), &filter).await.unwrap();
    assert!(owned.iter().all(|t| t.owner_id == "owner-filter-target"));
    assert!(owned.iter().any(|t| t.id == task.id));
}

async fn test_stats_reflect_inserts<R: TaskRepository>(repo: Arc<R>) {
    let before = repo.get_stats().await.unwrap();
    let task = root_task("echo", "owner-stats");
    repo.put(task).await.unwrap();
    let after = repo.get_stats().await.unwrap();
    assert!(after.total_tasks > before.total_tasks);
}
