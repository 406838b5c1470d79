//! End-to-end scenarios against a real `Dispatcher` running over the
//! `MockTaskRepository`/`MockEventPublisher` pair, one test per scenario
//! named in the engine's testable-properties list.

use engine_core::events::TaskEvent;
use engine_core::models::{HierarchyRequest, NewTaskRequest, TaskId, TaskItem, TaskState};
use engine_dispatch::{Dispatcher, DispatcherConfig, GroupConfig, GroupGates, RunningTasks, TaskQueue, TaskService};
use engine_core::executor::ExecutorRegistry;
use engine_mocks::{
    CountdownExecutor, EchoExecutor, FlakyExecutor, MockEventPublisher, MockTaskRepository,
    ParallelFanOutExecutor, SequentialRelayExecutor, SleepExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const OWNER: &str = "scenario-owner";

struct Harness {
    service: TaskService<MockTaskRepository>,
    repo: Arc<MockTaskRepository>,
    publisher: Arc<MockEventPublisher>,
    dispatcher: Arc<Dispatcher<MockTaskRepository>>,
}

fn harness(config: DispatcherConfig) -> Harness {
    let repo = Arc::new(MockTaskRepository::new());
    let publisher = Arc::new(MockEventPublisher::new());
    let queue = Arc::new(TaskQueue::new());
    let running = Arc::new(RunningTasks::new());
    let gates = Arc::new(GroupGates::new(GroupConfig::new(32)));

    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(EchoExecutor));
    registry.register(Arc::new(CountdownExecutor));
    registry.register(Arc::new(SleepExecutor));
    registry.register(Arc::new(FlakyExecutor::new()));
    registry.register(Arc::new(SequentialRelayExecutor));
    registry.register(Arc::new(ParallelFanOutExecutor::new()));
    let registry = Arc::new(registry);

    let service = TaskService::new(
        repo.clone(),
        publisher.clone() as Arc<dyn engine_core::events::EventPublisher>,
        queue.clone(),
        running.clone(),
    );
    let dispatcher = Dispatcher::new(
        repo.clone(),
        registry,
        publisher.clone() as Arc<dyn engine_core::events::EventPublisher>,
        queue,
        gates,
        running,
        config,
    );

    Harness { service, repo, publisher, dispatcher }
}

async fn wait_for_terminal(repo: &MockTaskRepository, id: TaskId) -> TaskItem {
    timeout(Duration::from_secs(10), async {
        loop {
            if let Some(task) = repo.get(id).await.unwrap() {
                if task.is_terminal() {
                    return task;
                }
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("task did not reach a terminal state within the test budget")
}

use engine_core::repository::TaskRepository as _;

#[tokio::test]
async fn s1_leaf_success_reports_monotone_progress_to_completion() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let created = h
        .service
        .create(
            NewTaskRequest::new("countdown", "{\"durationInSeconds\":1}").with_priority(5),
            OWNER.to_string(),
            None,
        )
        .await
        .unwrap();

    let finished = wait_for_terminal(&h.repo, created.id).await;
    assert_eq!(finished.state, TaskState::Completed);
    assert_eq!(finished.progress, 100.0);

    let events = h.publisher.events_for(created.id);
    assert!(matches!(events.first(), Some(TaskEvent::Created { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        TaskEvent::StateChanged { to: TaskState::Executing, .. }
    )));

    let progress_values: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(progress_values.windows(2).all(|w| w[0] <= w[1]));

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test]
async fn s2_timeout_terminates_with_expected_details() {
    let config = DispatcherConfig {
        default_task_timeout: Duration::from_secs(1),
        queue_poll_interval: Duration::from_millis(50),
    };
    let h = harness(config);
    let run = tokio::spawn(h.dispatcher.clone().run());

    let created = h
        .service
        .create(NewTaskRequest::new("sleepy", "{\"durationInSeconds\":2}"), OWNER.to_string(), None)
        .await
        .unwrap();

    let finished = wait_for_terminal(&h.repo, created.id).await;
    assert_eq!(finished.state, TaskState::Terminated);
    assert_eq!(finished.state_details.as_deref(), Some("timed out or terminated"));

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test]
async fn s3_external_cancel_of_executing_task() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let created = h
        .service
        .create(NewTaskRequest::new("sleepy", "{\"durationInSeconds\":5}"), OWNER.to_string(), None)
        .await
        .unwrap();

    loop {
        if h.repo.get(created.id).await.unwrap().unwrap().state == TaskState::Executing {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    h.service.cancel(created.id, &OWNER.to_string()).await.unwrap();

    let finished = wait_for_terminal(&h.repo, created.id).await;
    assert_eq!(finished.state, TaskState::Cancelled);
    assert_eq!(finished.state_details.as_deref(), Some("Cancelled by user request"));

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test]
async fn s4_parallel_parent_aggregates_weighted_progress() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let tree = HierarchyRequest {
        root: NewTaskRequest::new("parallel-fanout", "{}").with_parallelism(true),
        children: vec![
            HierarchyRequest::leaf(
                NewTaskRequest::new("countdown", "{\"durationInSeconds\":2}").with_weight(1.0),
            ),
            HierarchyRequest::leaf(
                NewTaskRequest::new("countdown", "{\"durationInSeconds\":1}").with_weight(3.0),
            ),
        ],
    };
    let root = h.service.create_hierarchy(tree, OWNER.to_string(), None).await.unwrap();

    let finished = wait_for_terminal(&h.repo, root.id).await;
    assert_eq!(finished.state, TaskState::Completed);
    assert_eq!(finished.progress, 100.0);

    let saw_interim_87_5 = h.publisher.events_for(root.id).iter().any(|e| {
        matches!(e, TaskEvent::Progress { progress, is_aggregated: true, .. } if (*progress - 87.5).abs() < 0.01)
    });
    assert!(saw_interim_87_5, "expected an intermediate aggregated progress of 87.5");

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test]
async fn s5_sequential_parent_relays_output_between_children() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let tree = HierarchyRequest {
        root: NewTaskRequest::new("sequential-relay", "{}").with_parallelism(false),
        children: vec![
            HierarchyRequest::leaf(NewTaskRequest::new("echo", "42")),
            HierarchyRequest::leaf(NewTaskRequest::new("echo", "placeholder")),
        ],
    };
    let root = h.service.create_hierarchy(tree, OWNER.to_string(), None).await.unwrap();

    let finished = wait_for_terminal(&h.repo, root.id).await;
    assert_eq!(finished.state, TaskState::Completed);

    let children = h.repo.get_children(root.id).await.unwrap();
    let second = children.into_iter().find(|c| c.payload == "42").expect("Y relayed X's output as its payload");
    assert_eq!(second.output.as_deref(), Some("42"));

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test]
async fn s6_dynamic_subtask_retry_increases_child_count() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let tree = HierarchyRequest {
        root: NewTaskRequest::new("sequential-relay", "{}").with_parallelism(false),
        children: vec![HierarchyRequest::leaf(NewTaskRequest::new("flaky", "{\"attempt\":0}"))],
    };
    let root = h.service.create_hierarchy(tree, OWNER.to_string(), None).await.unwrap();

    let finished = wait_for_terminal(&h.repo, root.id).await;
    assert_eq!(finished.state, TaskState::Completed);

    let descendants = h.repo.get_descendants(root.id).await.unwrap();
    assert_eq!(descendants.len(), 2, "the retry clone should bring the child count to initial+1");
    assert!(descendants.iter().any(|c| c.state == TaskState::Errored));
    assert!(descendants.iter().any(|c| c.state == TaskState::Completed));

    h.dispatcher.shutdown();
    let _ = run.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s7_subtree_cancel_cascades_to_descendants_only() {
    let h = harness(DispatcherConfig::default());
    let run = tokio::spawn(h.dispatcher.clone().run());

    let grandchild = HierarchyRequest::leaf(NewTaskRequest::new("sleepy", "{\"durationInSeconds\":5}"));
    let middle = HierarchyRequest {
        root: NewTaskRequest::new("sequential-relay", "{}").with_parallelism(false),
        children: vec![grandchild],
    };
    let tree = HierarchyRequest {
        root: NewTaskRequest::new("sequential-relay", "{}").with_parallelism(false),
        children: vec![middle],
    };
    let root = h.service.create_hierarchy(tree, OWNER.to_string(), None).await.unwrap();

    let middle_task = h.repo.get_children(root.id).await.unwrap().into_iter().next().unwrap();

    // Give the tree a moment to start executing before cancelling the middle node.
    sleep(Duration::from_millis(200)).await;

    let results = h.service.cancel_subtree(middle_task.id, &OWNER.to_string()).await.unwrap();
    assert!(results.iter().all(|t| t.state == TaskState::Cancelled));

    let middle_final = results.iter().find(|t| t.id == middle_task.id).unwrap();
    assert_eq!(middle_final.state_details.as_deref(), Some("Cancelled by user request (with subtree)"));

    let descendant_final = results.iter().find(|t| t.id != middle_task.id).unwrap();
    assert_eq!(descendant_final.state_details.as_deref(), Some("Cancelled (cascade from parent)"));

    // Give the root's own worker several poll cycles to notice the cancelled
    // child and (wrongly, if the bug regresses) finalize itself. The root's
    // worker runs on a different thread from this assertion, so this is the
    // real race the multi-thread runtime is here to exercise.
    for _ in 0..10 {
        sleep(Duration::from_millis(100)).await;
        let root_now = h.repo.get(root.id).await.unwrap().unwrap();
        assert!(!root_now.is_terminal(), "cancelling the middle node must not touch the root");
    }

    h.dispatcher.shutdown();
    let _ = run.await;
}
