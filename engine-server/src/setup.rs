use anyhow::Result;
use async_trait::async_trait;
use engine_core::events::{EventPublisher, TaskEvent};
use engine_core::executor::ExecutorRegistry;
use engine_dispatch::{Dispatcher, DispatcherConfig, GroupGates, RunningTasks, TaskQueue, TaskService};
use engine_mocks::{
    CountdownExecutor, EchoExecutor, FlakyExecutor, ParallelFanOutExecutor, SequentialRelayExecutor,
    SleepExecutor,
};
use engine_store::InMemoryTaskRepository;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// An [`EventPublisher`] that logs every event through `tracing`, the only
/// event sink this binary needs since it has no subscribers of its own.
#[derive(Debug, Default, Clone)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: TaskEvent) {
        match event {
            TaskEvent::Created { task } => {
                info!(task_id = %task.id, task_type = %task.task_type, "task created")
            }
            TaskEvent::Updated { task } => info!(task_id = %task.id, "task updated"),
            TaskEvent::Deleted { task_id, owner_id } => {
                info!(task_id = %task_id, owner_id = %owner_id, "task deleted")
            }
            TaskEvent::Progress { task_id, progress, is_aggregated, .. } => {
                info!(task_id = %task_id, progress, is_aggregated, "task progress")
            }
            TaskEvent::StateChanged { task_id, from, to, details, .. } => {
                info!(task_id = %task_id, ?from, ?to, details = ?details, "task state changed")
            }
        }
    }
}

/// Build the registry of built-in executors (`--demo` mode and the
/// integration tests both exercise every one of these task types).
pub fn create_registry() -> Arc<ExecutorRegistry> {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(EchoExecutor));
    registry.register(Arc::new(CountdownExecutor));
    registry.register(Arc::new(SleepExecutor));
    registry.register(Arc::new(FlakyExecutor::new()));
    registry.register(Arc::new(SequentialRelayExecutor));
    registry.register(Arc::new(ParallelFanOutExecutor::new()));
    Arc::new(registry)
}

/// Everything the dispatch loop and service API need, wired from `config`.
pub struct App<R: engine_core::repository::TaskRepository> {
    pub service: TaskService<R>,
    pub dispatcher: Arc<Dispatcher<R>>,
}

/// Wire an in-memory repository, the built-in executors, and the dispatcher
/// together. The only writer config supplies is `config` itself; callers own
/// spawning `dispatcher.clone().run()` and calling `dispatcher.shutdown()`.
pub fn initialize_app(config: &Config) -> Result<App<InMemoryTaskRepository>> {
    info!("initializing application");

    let repo = Arc::new(InMemoryTaskRepository::new());
    let publisher: Arc<dyn EventPublisher> = Arc::new(TracingEventPublisher);
    let queue = Arc::new(TaskQueue::new());
    let running = Arc::new(RunningTasks::new());
    let gates = Arc::new(GroupGates::new(config.group_config()));
    let registry = create_registry();

    let service = TaskService::new(repo.clone(), publisher.clone(), queue.clone(), running.clone());
    let dispatcher = Dispatcher::new(
        repo,
        registry,
        publisher,
        queue,
        gates,
        running,
        config.dispatcher_config(),
    );

    info!("application initialized successfully");
    Ok(App { service, dispatcher })
}
