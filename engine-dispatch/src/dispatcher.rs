//! The dispatch loop and its per-task worker routines: Leaf Path and Parent
//! Path. One dispatch loop consumes the queue and spawns an independently
//! scheduled worker per dequeued task; concurrency is bounded implicitly by
//! the per-group gates, so the dispatch loop itself never blocks on one.

use crate::aggregator::aggregate_from_child;
use crate::gates::GroupGates;
use crate::queue::TaskQueue;
use crate::running::RunningTasks;
use async_trait::async_trait;
use chrono::Utc;
use engine_core::events::{EventPublisher, TaskEvent};
use engine_core::executor::{executor_not_found, ExecutorRegistry, ProgressSink};
use engine_core::models::{GroupId, TaskId, TaskItem, TaskState};
use engine_core::repository::TaskRepository;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};

/// Tunables named in SPEC_FULL §6's configuration table.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub default_task_timeout: Duration,
    pub queue_poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_task_timeout: Duration::from_secs(60 * 60),
            queue_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Owns every piece the worker routines share: the repository, the executor
/// registry, the event sink, the queue they pull from, the per-group gates,
/// and the map of running tasks' cancellation tokens.
pub struct Dispatcher<R: TaskRepository> {
    repo: Arc<R>,
    registry: Arc<ExecutorRegistry>,
    publisher: Arc<dyn EventPublisher>,
    queue: Arc<TaskQueue>,
    gates: Arc<GroupGates>,
    running: Arc<RunningTasks>,
    config: DispatcherConfig,
    shutdown: CancellationToken,
}

impl<R: TaskRepository + 'static> Dispatcher<R> {
    pub fn new(
        repo: Arc<R>,
        registry: Arc<ExecutorRegistry>,
        publisher: Arc<dyn EventPublisher>,
        queue: Arc<TaskQueue>,
        gates: Arc<GroupGates>,
        running: Arc<RunningTasks>,
        config: DispatcherConfig,
    ) -> Arc<Self> {
        Arc::new(Self { repo, registry, publisher, queue, gates, running, config, shutdown: CancellationToken::new() })
    }

    /// Signal the dispatch loop and every in-flight worker to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.queue.notify_all();
    }

    /// Run the single dispatch loop. Returns once `shutdown` fires and the
    /// queue has nothing left to hand out. Spawned workers may still be
    /// winding down when this returns; callers that need a hard join should
    /// track the `JoinHandle`s themselves.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.queue.dequeue(&self.shutdown).await {
                None => return,
                Some((task_id, group_id)) => {
                    let dispatcher = self.clone();
                    tokio::spawn(async move { dispatcher.run_worker(task_id, group_id).await });
                }
            }
        }
    }

    #[instrument(skip(self), fields(task_id = %task_id, group_id = %group_id))]
    async fn run_worker(self: Arc<Self>, task_id: TaskId, group_id: GroupId) {
        let permit = self.gates.acquire(&group_id).await;

        let task = match self.repo.get(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(err) => {
                error!(%err, "failed to load dequeued task");
                return;
            }
        };
        if task.state == TaskState::Cancelled {
            return;
        }

        let children = match self.repo.get_children(task.id).await {
            Ok(children) => children,
            Err(err) => {
                error!(%err, "failed to load children for dequeued task");
                return;
            }
        };

        if children.is_empty() {
            self.run_leaf(task, permit).await;
        } else {
            drop(permit);
            self.run_parent(task, children).await;
        }
    }

    /// Execute a leaf task under a linked cancel signal (shutdown, explicit
    /// cancel, or timeout) and map the outcome to a terminal state.
    async fn run_leaf(self: &Arc<Self>, mut task: TaskItem, _permit: OwnedSemaphorePermit) {
        let Some(executor) = self.registry.get(&task.task_type) else {
            self.fail_unknown_executor(task).await;
            return;
        };

        let cancel_signal = CancellationToken::new();
        self.running.register(task.id, cancel_signal.clone()).await;
        let timed_out = Arc::new(AtomicBool::new(false));
        let watcher = self.spawn_cancel_watcher(cancel_signal.clone(), timed_out.clone());

        let from = task.state;
        task.transition(TaskState::Executing, None);
        let task = match self.repo.update(task).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, "failed to persist Executing transition");
                watcher.abort();
                self.running.unregister(task.id).await;
                return;
            }
        };
        self.publish_state_change(&task, from, TaskState::Executing, None).await;

        let sink: Arc<dyn ProgressSink> = Arc::new(DispatchProgressSink {
            repo: self.repo.clone(),
            publisher: self.publisher.clone(),
            registry: self.registry.clone(),
            task_id: task.id,
        });

        let outcome = executor.execute(&task, sink, cancel_signal.clone()).await;
        watcher.abort();
        self.running.unregister(task.id).await;

        let (terminal, details, output) = match outcome {
            _ if timed_out.load(Ordering::SeqCst) => {
                (TaskState::Terminated, Some("timed out or terminated".to_string()), None)
            }
            Ok(output) if !cancel_signal.is_cancelled() => (TaskState::Completed, None, Some(output)),
            Ok(_) => (TaskState::Cancelled, Some("Cancelled by user request".to_string()), None),
            Err(err) if !cancel_signal.is_cancelled() => {
                (TaskState::Errored, Some(err.to_string()), None)
            }
            Err(_) => (TaskState::Cancelled, Some("Cancelled by user request".to_string()), None),
        };

        self.finish_task(task.id, terminal, details, output).await;
    }

    /// Write the terminal state if the task isn't already terminal (e.g.
    /// already marked `Cancelled` by the service while the worker was still
    /// running), publish `StateChanged`, and notify the aggregator.
    async fn finish_task(
        &self,
        task_id: TaskId,
        terminal: TaskState,
        details: Option<String>,
        output: Option<String>,
    ) {
        let Ok(Some(mut task)) = self.repo.get(task_id).await else { return };
        let from = task.state;
        if terminal == TaskState::Completed {
            task.progress = 100.0;
        }
        if let Some(output) = output {
            task.output = Some(output);
        }
        let changed = task.transition(terminal, details.clone());
        let task = match self.repo.update(task).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, "failed to persist terminal state");
                return;
            }
        };
        if changed {
            self.publish_state_change(&task, from, task.state, details).await;
        }
        if let Err(err) = aggregate_from_child(self.repo.as_ref(), self.publisher.as_ref(), task.id).await {
            warn!(%err, "aggregator failed after terminal transition");
        }
    }

    async fn fail_unknown_executor(&self, mut task: TaskItem) {
        let from = task.state;
        let details = executor_not_found(&task.task_type);
        task.transition(TaskState::Errored, Some(details.clone()));
        if let Ok(task) = self.repo.update(task).await {
            self.publish_state_change(&task, from, TaskState::Errored, Some(details)).await;
            if let Err(err) = aggregate_from_child(self.repo.as_ref(), self.publisher.as_ref(), task.id).await {
                warn!(%err, "aggregator failed after unknown-executor error");
            }
        }
    }

    /// Trips `cancel_signal` when global shutdown fires or the configured
    /// timeout elapses, recording which one via `timed_out`. A no-op, aside
    /// from returning promptly, if `cancel_signal` is already cancelled
    /// (explicit cancel fired directly on the token the caller registered).
    fn spawn_cancel_watcher(
        &self,
        cancel_signal: CancellationToken,
        timed_out: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        let timeout = self.config.default_task_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(timeout) => {
                    timed_out.store(true, Ordering::SeqCst);
                    cancel_signal.cancel();
                }
                _ = shutdown.cancelled() => cancel_signal.cancel(),
                _ = cancel_signal.cancelled() => {}
            }
        })
    }

    /// Parent tasks release the gate before orchestrating: holding it would
    /// deadlock any subtree whose children share the parent's group.
    async fn run_parent(self: &Arc<Self>, mut parent: TaskItem, initial_children: Vec<TaskItem>) {
        let cancel_signal = CancellationToken::new();
        self.running.register(parent.id, cancel_signal.clone()).await;
        let timed_out = Arc::new(AtomicBool::new(false));
        let watcher = self.spawn_cancel_watcher(cancel_signal.clone(), timed_out.clone());

        let from = parent.state;
        parent.transition(TaskState::Executing, None);
        let mut parent = match self.repo.update(parent).await {
            Ok(parent) => parent,
            Err(err) => {
                warn!(%err, "failed to persist parent Executing transition");
                watcher.abort();
                self.running.unregister(parent.id).await;
                return;
            }
        };
        self.publish_state_change(&parent, from, TaskState::Executing, None).await;

        let parent_executor = self.registry.get(&parent.task_type);
        let mut last_known_state: HashMap<TaskId, TaskState> =
            initial_children.iter().map(|c| (c.id, c.state)).collect();
        let mut hook_processed: HashSet<TaskId> = HashSet::new();

        if parent.subtask_parallelism {
            for child in &initial_children {
                self.queue.enqueue(child.id, child.group_id.clone(), child.priority);
            }
        } else {
            self.run_sequential_children(&parent, initial_children, &parent_executor, &mut last_known_state, &mut hook_processed, &cancel_signal)
                .await;
        }

        loop {
            let children = match self.repo.get_children(parent.id).await {
                Ok(children) => children,
                Err(err) => {
                    error!(%err, "failed to poll children during parent orchestration");
                    break;
                }
            };
            if !children.is_empty() {
                self.process_terminal_transitions(&parent, &children, &parent_executor, &mut last_known_state, &mut hook_processed)
                    .await;
            }
            if !children.is_empty() && children.iter().all(|c| c.state.is_terminal()) {
                break;
            }
            if cancel_signal.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = sleep(self.config.queue_poll_interval) => {}
                _ = cancel_signal.cancelled() => break,
            }
        }
        watcher.abort();
        self.running.unregister(parent.id).await;

        let final_children = self.repo.get_children(parent.id).await.unwrap_or_default();
        let all_succeeded = !final_children.is_empty()
            && final_children.iter().all(|c| c.state == TaskState::Completed);
        let any_failed = final_children
            .iter()
            .any(|c| matches!(c.state, TaskState::Errored | TaskState::Terminated));

        if let Some(executor) = &parent_executor {
            if all_succeeded {
                executor.on_all_subtasks_success(&parent).await;
            }
        }

        let outcome = if timed_out.load(Ordering::SeqCst) {
            Some((TaskState::Terminated, Some("timed out or terminated".to_string())))
        } else if cancel_signal.is_cancelled() {
            Some((TaskState::Cancelled, Some("Cancelled by user request".to_string())))
        } else if all_succeeded {
            Some((TaskState::Completed, None))
        } else if any_failed {
            Some((
                TaskState::Errored,
                Some(format!(
                    "{} child task(s) did not complete successfully",
                    final_children.iter().filter(|c| c.state != TaskState::Completed).count()
                )),
            ))
        } else {
            // Every non-completed child is `Cancelled`, and neither shutdown, a
            // timeout, nor a cancel of this task itself is in play. A subtree
            // cancel that targeted a descendant (not this parent) doesn't
            // finalize the parent one way or the other; it's left exactly as
            // it was for whoever cancelled the child to deal with.
            None
        };

        let Some((terminal, details)) = outcome else { return };
        self.finish_task(parent.id, terminal, details, None).await;
    }

    /// Sequential mode: enqueue one child at a time, running it to
    /// completion (polling at `queue_poll_interval`) before firing its
    /// terminal hooks and advancing to the next sibling.
    #[allow(clippy::too_many_arguments)]
    async fn run_sequential_children(
        self: &Arc<Self>,
        parent: &TaskItem,
        mut pending: Vec<TaskItem>,
        parent_executor: &Option<Arc<dyn engine_core::executor::Executor>>,
        last_known_state: &mut HashMap<TaskId, TaskState>,
        hook_processed: &mut HashSet<TaskId>,
        cancel_signal: &CancellationToken,
    ) {
        if pending.is_empty() {
            return;
        }
        pending.reverse();
        let Some(mut current) = pending.pop() else { return };
        self.queue.enqueue(current.id, current.group_id.clone(), current.priority);

        loop {
            let Ok(Some(refreshed)) = self.repo.get(current.id).await else { break };
            current = refreshed;
            last_known_state.insert(current.id, current.state);

            if current.state.is_terminal() {
                if let Some(executor) = parent_executor {
                    executor
                        .on_subtask_state_change(parent, &current, TaskState::Executing, current.state)
                        .await;
                    let new_requests = executor.on_subtask_terminal(parent, &current).await;
                    if !new_requests.is_empty() {
                        if let Ok(added) = self.add_children(parent.id, new_requests).await {
                            for child in added.into_iter().rev() {
                                pending.push(child);
                            }
                        }
                    }
                    hook_processed.insert(current.id);

                    if let Some(next) = pending.last() {
                        if let Some(payload) = executor.rewrite_next_sibling_payload(parent, &current).await {
                            let _ = self.update_queued_payload(next.id, payload).await;
                        }
                    }
                } else {
                    hook_processed.insert(current.id);
                }

                match pending.pop() {
                    Some(next) => {
                        self.queue.enqueue(next.id, next.group_id.clone(), next.priority);
                        current = next;
                        continue;
                    }
                    None => break,
                }
            }

            if cancel_signal.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = sleep(self.config.queue_poll_interval) => {}
                _ = cancel_signal.cancelled() => break,
            }
        }
    }

    /// Parallel mode (and the post-sequential-phase watch loop): fire hooks
    /// for any direct child that has newly transitioned into a terminal
    /// state since the last poll.
    async fn process_terminal_transitions(
        self: &Arc<Self>,
        parent: &TaskItem,
        children: &[TaskItem],
        parent_executor: &Option<Arc<dyn engine_core::executor::Executor>>,
        last_known_state: &mut HashMap<TaskId, TaskState>,
        hook_processed: &mut HashSet<TaskId>,
    ) {
        for child in children {
            let prev = last_known_state.insert(child.id, child.state);
            let newly_terminal = child.state.is_terminal()
                && prev.map(|p| !p.is_terminal()).unwrap_or(true)
                && !hook_processed.contains(&child.id);
            if !newly_terminal {
                continue;
            }
            hook_processed.insert(child.id);
            if let Some(executor) = parent_executor {
                let from = prev.unwrap_or(TaskState::Executing);
                executor.on_subtask_state_change(parent, child, from, child.state).await;
                let new_requests = executor.on_subtask_terminal(parent, child).await;
                if !new_requests.is_empty() {
                    if let Ok(added) = self.add_children(parent.id, new_requests).await {
                        for grandchild in &added {
                            self.queue.enqueue(grandchild.id, grandchild.group_id.clone(), grandchild.priority);
                            last_known_state.insert(grandchild.id, grandchild.state);
                        }
                    }
                }
            }
        }
    }

    async fn add_children(
        &self,
        parent_id: TaskId,
        requests: Vec<engine_core::models::NewTaskRequest>,
    ) -> engine_core::error::Result<Vec<TaskItem>> {
        let Some(parent) = self.repo.get(parent_id).await? else {
            return Ok(Vec::new());
        };
        let mut created = Vec::with_capacity(requests.len());
        for req in requests {
            let child = TaskItem::child_from_request(req, &parent);
            let child = self.repo.put(child).await?;
            self.publisher.publish(TaskEvent::Created { task: child.clone() }).await;
            created.push(child);
        }
        Ok(created)
    }

    async fn update_queued_payload(&self, id: TaskId, payload: String) -> engine_core::error::Result<()> {
        let Some(mut task) = self.repo.get(id).await? else { return Ok(()) };
        if task.state != TaskState::Queued {
            return Ok(());
        }
        task.payload = payload;
        task.updated_at = Utc::now();
        self.repo.update(task).await?;
        Ok(())
    }

    async fn publish_state_change(
        &self,
        task: &TaskItem,
        from: TaskState,
        to: TaskState,
        details: Option<String>,
    ) {
        self.publisher
            .publish(TaskEvent::StateChanged {
                task_id: task.id,
                root_task_id: task.root_task_id,
                from,
                to,
                details,
                at: Utc::now(),
            })
            .await;
    }
}

/// Routes an executor's `progress.report` calls to a repository write, a
/// `Progress` event, the aggregator, and (if this task has a parent) the
/// parent executor's `on_subtask_progress` hook.
struct DispatchProgressSink<R: TaskRepository> {
    repo: Arc<R>,
    publisher: Arc<dyn EventPublisher>,
    registry: Arc<ExecutorRegistry>,
    task_id: TaskId,
}

#[async_trait]
impl<R: TaskRepository + 'static> ProgressSink for DispatchProgressSink<R> {
    async fn report(&self, progress: f64, details: Option<String>, payload: Option<String>) {
        let Ok(Some(mut task)) = self.repo.get(self.task_id).await else { return };
        task.progress = progress;
        task.progress_details = details.clone();
        task.progress_payload = payload.clone();
        task.updated_at = Utc::now();
        let Ok(task) = self.repo.update(task).await else { return };

        self.publisher
            .publish(TaskEvent::Progress {
                task_id: task.id,
                root_task_id: task.root_task_id,
                progress,
                details,
                payload,
                is_aggregated: false,
                at: Utc::now(),
            })
            .await;

        if let Err(err) = aggregate_from_child(self.repo.as_ref(), self.publisher.as_ref(), task.id).await {
            warn!(%err, "aggregator failed after leaf progress report");
        }

        if let Some(parent_id) = task.parent_task_id {
            if let Ok(Some(parent)) = self.repo.get(parent_id).await {
                if let Some(executor) = self.registry.get(&parent.task_type) {
                    executor.on_subtask_progress(&parent, &task).await;
                }
            }
        }
    }
}
