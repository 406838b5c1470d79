//! Weighted progress aggregation: every time a leaf reports progress or
//! reaches a terminal state, its ancestors' `progress` fields are recomputed
//! bottom-up. The walk is iterative, not recursive, since tree depth is
//! unbounded in principle.

use chrono::Utc;
use engine_core::error::Result;
use engine_core::events::{EventPublisher, TaskEvent};
use engine_core::models::{TaskId, TaskItem, TaskState};
use engine_core::repository::TaskRepository;

/// Recompute and publish progress for every ancestor of `child_id`, walking
/// up one level at a time until the root is reached.
pub async fn aggregate_from_child(
    repo: &dyn TaskRepository,
    publisher: &dyn EventPublisher,
    child_id: TaskId,
) -> Result<()> {
    let Some(child) = repo.get(child_id).await? else { return Ok(()) };
    let mut parent_id = child.parent_task_id;

    while let Some(id) = parent_id {
        let Some(mut parent) = repo.get(id).await? else { break };
        let children = repo.get_children(id).await?;
        parent.progress = weighted_progress(&children);
        parent.updated_at = Utc::now();
        let updated = repo.update(parent.clone()).await?;

        publisher
            .publish(TaskEvent::Progress {
                task_id: updated.id,
                root_task_id: updated.root_task_id,
                progress: updated.progress,
                details: Some(format!("Aggregated from {} children", children.len())),
                payload: None,
                is_aggregated: true,
                at: Utc::now(),
            })
            .await;

        parent_id = updated.parent_task_id;
    }
    Ok(())
}

/// `Σ (weight_i / total_weight) × contribution_i`, where a `Completed` child
/// always contributes 100 regardless of its last reported `progress` (and a
/// non-completed terminal child keeps its progress-at-failure).
fn weighted_progress(children: &[TaskItem]) -> f64 {
    let total_weight: f64 = children.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    children
        .iter()
        .map(|c| {
            let contribution = if c.state == TaskState::Completed { 100.0 } else { c.progress };
            (c.weight / total_weight) * contribution
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::models::NewTaskRequest;
    use engine_mocks::{MockEventPublisher, MockTaskRepository};

    fn child(weight: f64, progress: f64, state: TaskState, parent: &TaskItem) -> TaskItem {
        let mut task = TaskItem::child_from_request(
            NewTaskRequest::new("echo", "{}").with_weight(weight),
            parent,
        );
        task.progress = progress;
        task.state = state;
        task
    }

    #[tokio::test]
    async fn weighted_average_matches_completed_and_in_flight_children() {
        let repo = MockTaskRepository::new();
        let publisher = MockEventPublisher::new();

        let parent = TaskItem::from_request(
            NewTaskRequest::new("parallel-fanout", "{}"),
            "alice".into(),
            None,
            None,
        );
        repo.put(parent.clone()).await.unwrap();

        let a = child(1.0, 50.0, TaskState::Executing, &parent);
        let b = child(3.0, 0.0, TaskState::Completed, &parent);
        repo.put(a.clone()).await.unwrap();
        repo.put(b.clone()).await.unwrap();

        aggregate_from_child(&repo, &publisher, a.id).await.unwrap();

        let updated_parent = repo.get(parent.id).await.unwrap().unwrap();
        assert_eq!(updated_parent.progress, 87.5);
        assert_eq!(publisher.events_for(parent.id).len(), 1);
    }

    #[tokio::test]
    async fn zero_total_weight_yields_zero_progress() {
        let repo = MockTaskRepository::new();
        let publisher = MockEventPublisher::new();

        let parent = TaskItem::from_request(
            NewTaskRequest::new("parallel-fanout", "{}"),
            "alice".into(),
            None,
            None,
        );
        repo.put(parent.clone()).await.unwrap();
        let a = child(0.0, 50.0, TaskState::Executing, &parent);
        repo.put(a.clone()).await.unwrap();

        aggregate_from_child(&repo, &publisher, a.id).await.unwrap();
        let updated_parent = repo.get(parent.id).await.unwrap().unwrap();
        assert_eq!(updated_parent.progress, 0.0);
    }

    #[tokio::test]
    async fn root_task_has_no_ancestors_to_update() {
        let repo = MockTaskRepository::new();
        let publisher = MockEventPublisher::new();
        let root = TaskItem::from_request(NewTaskRequest::new("echo", "{}"), "alice".into(), None, None);
        repo.put(root.clone()).await.unwrap();

        aggregate_from_child(&repo, &publisher, root.id).await.unwrap();
        assert!(publisher.events().is_empty());
    }
}
