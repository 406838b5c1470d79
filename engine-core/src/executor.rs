use crate::models::{TaskItem, TaskState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sink an executor uses to publish incremental progress while running.
///
/// A trait rather than a bare channel so executors can be tested against a
/// recording fake without pulling in the dispatcher's real queue machinery.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Report progress in `[0, 100]`, with optional details and an opaque payload.
    async fn report(&self, progress: f64, details: Option<String>, payload: Option<String>);
}

/// Runs the work named by a task's `task_type`.
///
/// Implementations are registered under a string key in an
/// [`ExecutorRegistry`]. Every hook beyond `execute` has a default no-op
/// body: most task types are leaves and never see subtasks, so implementing
/// only `task_type` and `execute` is enough for the common case. Parent task
/// types override the hooks they care about instead of inheriting from some
/// base "parent executor" type.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The `task_type` this executor handles. Must be unique within a registry.
    fn task_type(&self) -> &str;

    /// Run the task to completion, a cancellation, or an error.
    ///
    /// `cancel_signal` fires when the task (or an ancestor) is cancelled;
    /// well-behaved executors select on it rather than polling.
    async fn execute(
        &self,
        task: &TaskItem,
        progress: Arc<dyn ProgressSink>,
        cancel_signal: CancellationToken,
    ) -> crate::error::Result<String>;

    /// Called when a direct child reports progress. Parent task types can
    /// use this to recompute their own `progress_payload` outside the
    /// default weighted-average aggregation.
    async fn on_subtask_progress(&self, _parent: &TaskItem, _child: &TaskItem) {}

    /// Called when a direct child's state changes. Fires only on transitions
    /// into a terminal state (never for `Queued -> Executing`), in both
    /// sequential and parallel parent modes, immediately before
    /// `on_subtask_terminal` for the same transition.
    async fn on_subtask_state_change(
        &self,
        _parent: &TaskItem,
        _child: &TaskItem,
        _from: TaskState,
        _to: TaskState,
    ) {
    }

    /// Called on every transition of a direct child into a terminal state.
    /// Returning new requests enqueues them as additional children of
    /// `parent` (used by executors that fan out work incrementally).
    async fn on_subtask_terminal(
        &self,
        _parent: &TaskItem,
        _child: &TaskItem,
    ) -> Vec<crate::models::NewTaskRequest> {
        Vec::new()
    }

    /// Called once, after every direct child of `parent` has completed
    /// successfully (not just reached a terminal state).
    async fn on_all_subtasks_success(&self, _parent: &TaskItem) {}

    /// Sequential parent mode only: called right after `on_subtask_terminal`
    /// for a child that just finished, before the next queued sibling (if
    /// any) is dispatched. Returning `Some(payload)` rewrites that sibling's
    /// payload via `update_queued_payload` — the only channel through which
    /// data flows from one child to the next in sequential mode.
    async fn rewrite_next_sibling_payload(
        &self,
        _parent: &TaskItem,
        _finished_child: &TaskItem,
    ) -> Option<String> {
        None
    }
}

/// Lookup table from `task_type` to the executor that handles it.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own `task_type()`. Replaces any
    /// previous registration for the same type.
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.task_type().to_string(), executor);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.executors.contains_key(task_type)
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("task_types", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Convenience alias used by callers that only need to name a task id
/// alongside an executor lookup failure.
pub fn executor_not_found(task_type: &str) -> String {
    format!("no executor registered for task_type '{task_type}'")
}

pub type ExecutorResult = crate::error::Result<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTaskRequest;

    struct NoopExecutor;

    #[async_trait]
    impl Executor for NoopExecutor {
        fn task_type(&self) -> &str {
            "noop"
        }

        async fn execute(
            &self,
            _task: &TaskItem,
            _progress: Arc<dyn ProgressSink>,
            _cancel_signal: CancellationToken,
        ) -> crate::error::Result<String> {
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn default_hooks_are_inert() {
        let executor = NoopExecutor;
        let req = NewTaskRequest::new("noop", "{}");
        let parent = TaskItem::from_request(req.clone(), "alice".into(), None, None);
        let child = TaskItem::child_from_request(req, &parent);

        executor.on_subtask_progress(&parent, &child).await;
        executor
            .on_subtask_state_change(&parent, &child, TaskState::Executing, TaskState::Completed)
            .await;
        let new_requests = executor.on_subtask_terminal(&parent, &child).await;
        assert!(new_requests.is_empty());
        executor.on_all_subtasks_success(&parent).await;
    }

    #[test]
    fn registry_round_trips_by_task_type() {
        let mut registry = ExecutorRegistry::new();
        assert!(!registry.contains("noop"));
        registry.register(Arc::new(NoopExecutor));
        assert!(registry.contains("noop"));
        assert!(registry.get("missing").is_none());
    }
}
