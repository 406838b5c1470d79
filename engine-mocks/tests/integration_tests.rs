//! Integration tests for the mocks crate: verifies the mock implementations
//! and test utilities behave the way the real engine crates expect.

use engine_core::{
    error::EngineError,
    events::EventPublisher,
    models::{TaskId, TaskState},
    repository::TaskRepository,
};
use engine_mocks::*;
use uuid::Uuid;

#[tokio::test]
async fn mock_repository_basic_operations() {
    let repo = MockTaskRepository::new();

    let task = create_new_task_request();
    let task = engine_core::models::TaskItem::from_request(task, "alice".to_string(), None, None);
    let created = repo.put(task.clone()).await.unwrap();

    assert_eq!(created.id, task.id);
    assert_eq!(created.state, TaskState::Queued);
    repo.assert_called("put");

    let retrieved = repo.get(task.id).await.unwrap().unwrap();
    assert_eq!(retrieved.id, task.id);
    repo.assert_called("get");
}

#[tokio::test]
async fn mock_repository_error_injection() {
    let repo = MockTaskRepository::new();
    let missing_id: TaskId = Uuid::now_v7();

    repo.inject_error(EngineError::not_found(missing_id));
    let result = repo.get(missing_id).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_not_found());

    repo.clear_error();
    let result = repo.get(missing_id).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mock_repository_hierarchy_queries() {
    let repo = MockTaskRepository::new();
    let (root, children) = create_task_tree(3);
    repo.put(root.clone()).await.unwrap();
    for child in &children {
        repo.put(child.clone()).await.unwrap();
    }

    let fetched_children = repo.get_children(root.id).await.unwrap();
    assert_eq!(fetched_children.len(), 3);
    assert_eq!(repo.child_count(root.id).await.unwrap(), 3);
}

#[tokio::test]
async fn mock_repository_delete_subtree_removes_everything() {
    let repo = MockTaskRepository::new();
    let (root, children) = create_task_tree(2);
    repo.put(root.clone()).await.unwrap();
    for child in &children {
        repo.put(child.clone()).await.unwrap();
    }

    let removed = repo.delete_subtree(root.id).await.unwrap();
    assert_eq!(removed.len(), 3);
    assert!(repo.get(root.id).await.unwrap().is_none());
}

#[tokio::test]
async fn mock_event_publisher_records_in_order() {
    let publisher = MockEventPublisher::new();
    let task = create_test_task();

    publisher
        .publish(engine_core::events::TaskEvent::StateChanged {
            task_id: task.id,
            root_task_id: task.root_task_id,
            from: TaskState::Queued,
            to: TaskState::Executing,
            details: None,
            at: chrono::Utc::now(),
        })
        .await;

    assert_eq!(publisher.events_for(task.id).len(), 1);
}

#[tokio::test]
async fn repository_contract_holds_for_the_mock() {
    let repo = std::sync::Arc::new(MockTaskRepository::new());
    engine_core::testing::test_repository_contract(repo).await;
}
