//! Scripted executors used by integration tests and the `--demo` CLI mode.
//!
//! Each one maps to a scenario exercised by `integration-tests`: `echo` is
//! the simplest possible leaf, `countdown` and `sleepy` exercise progress
//! reporting and cancellation, `flaky` exercises the retry path, and
//! `sequential-relay` / `parallel-fanout` exercise the two parent
//! orchestration modes and their hooks.

use async_trait::async_trait;
use engine_core::{
    error::{EngineError, Result},
    executor::{Executor, ProgressSink},
    models::{NewTaskRequest, TaskItem, TaskState},
};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct DurationPayload {
    #[serde(default = "default_duration_seconds", alias = "durationInSeconds")]
    duration_seconds: u64,
}

fn default_duration_seconds() -> u64 {
    1
}

fn parse_duration_seconds(payload: &str) -> u64 {
    serde_json::from_str::<DurationPayload>(payload)
        .map(|p| p.duration_seconds)
        .unwrap_or_else(|_| default_duration_seconds())
}

/// Counts down from its configured duration, reporting progress once a second.
pub struct CountdownExecutor;

#[async_trait]
impl Executor for CountdownExecutor {
    fn task_type(&self) -> &str {
        "countdown"
    }

    async fn execute(
        &self,
        task: &TaskItem,
        progress: Arc<dyn ProgressSink>,
        cancel_signal: CancellationToken,
    ) -> Result<String> {
        let total = parse_duration_seconds(&task.payload).max(1);
        for elapsed in 0..total {
            tokio::select! {
                _ = cancel_signal.cancelled() => return Err(EngineError::cancelled(task.id)),
                _ = sleep(Duration::from_secs(1)) => {}
            }
            let pct = ((elapsed + 1) as f64 / total as f64) * 100.0;
            progress.report(pct, Some(format!("{} of {total} seconds elapsed", elapsed + 1)), None).await;
        }
        Ok(format!("counted down from {total}"))
    }
}

/// Sleeps for its configured duration and completes with no progress reports.
/// Used to exercise both timeouts (a short `default_task_timeout` trips
/// before the sleep ends) and external cancellation of a long sleep.
pub struct SleepExecutor;

#[async_trait]
impl Executor for SleepExecutor {
    fn task_type(&self) -> &str {
        "sleepy"
    }

    async fn execute(
        &self,
        task: &TaskItem,
        _progress: Arc<dyn ProgressSink>,
        cancel_signal: CancellationToken,
    ) -> Result<String> {
        let seconds = parse_duration_seconds(&task.payload);
        tokio::select! {
            _ = cancel_signal.cancelled() => Err(EngineError::cancelled(task.id)),
            _ = sleep(Duration::from_secs(seconds)) => Ok("slept".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AttemptPayload {
    #[serde(default)]
    attempt: u32,
}

/// Fails on its first invocation and succeeds on every later one, as judged
/// by an `{"attempt": N}` marker in its payload (`0` on the first try). Used
/// together with `SequentialRelayExecutor`'s one-shot retry to exercise
/// dynamic subtask recovery.
pub struct FlakyExecutor {
    invocations: AtomicU32,
}

impl Default for FlakyExecutor {
    fn default() -> Self {
        Self { invocations: AtomicU32::new(0) }
    }
}

impl FlakyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for FlakyExecutor {
    fn task_type(&self) -> &str {
        "flaky"
    }

    async fn execute(
        &self,
        task: &TaskItem,
        _progress: Arc<dyn ProgressSink>,
        _cancel_signal: CancellationToken,
    ) -> Result<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let attempt = serde_json::from_str::<AttemptPayload>(&task.payload).unwrap_or_default().attempt;
        if attempt == 0 {
            Err(EngineError::executor_failure(task.id, "flaky executor fails on its first attempt"))
        } else {
            Ok(format!("succeeded on attempt {attempt}"))
        }
    }
}

/// Returns its payload verbatim as output. The simplest possible executor.
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    fn task_type(&self) -> &str {
        "echo"
    }

    async fn execute(
        &self,
        task: &TaskItem,
        _progress: Arc<dyn ProgressSink>,
        _cancel_signal: CancellationToken,
    ) -> Result<String> {
        Ok(task.payload.clone())
    }
}

/// A parent-type executor for sequential mode. Two independent behaviors,
/// both triggered from `on_subtask_terminal`/`rewrite_next_sibling_payload`:
/// - on a child `Completed`, its `output` is relayed into the next sibling's
///   payload (data-passing between sequential steps);
/// - on a child `Errored` whose payload doesn't already carry a nonzero
///   `attempt`, a retry clone is added with `attempt` incremented by one.
pub struct SequentialRelayExecutor;

#[async_trait]
impl Executor for SequentialRelayExecutor {
    fn task_type(&self) -> &str {
        "sequential-relay"
    }

    async fn execute(
        &self,
        _task: &TaskItem,
        _progress: Arc<dyn ProgressSink>,
        _cancel_signal: CancellationToken,
    ) -> Result<String> {
        // The parent itself does no work; its children carry the payload.
        Ok("relay started".to_string())
    }

    async fn on_subtask_terminal(&self, _parent: &TaskItem, child: &TaskItem) -> Vec<NewTaskRequest> {
        if child.state != TaskState::Errored {
            return Vec::new();
        }
        let attempt = serde_json::from_str::<AttemptPayload>(&child.payload).unwrap_or_default().attempt;
        if attempt > 0 {
            return Vec::new();
        }
        vec![NewTaskRequest::new(child.task_type.clone(), format!("{{\"attempt\":{}}}", attempt + 1))
            .with_priority(child.priority)]
    }

    async fn rewrite_next_sibling_payload(
        &self,
        _parent: &TaskItem,
        finished_child: &TaskItem,
    ) -> Option<String> {
        finished_child.output.clone()
    }
}

/// A parent-type executor whose children are all launched at once (the
/// dispatcher reads `subtask_parallelism` to decide that); it only needs
/// `on_all_subtasks_success` to know when the fan-out is done.
pub struct ParallelFanOutExecutor {
    completed: AtomicU32,
}

impl Default for ParallelFanOutExecutor {
    fn default() -> Self {
        Self { completed: AtomicU32::new(0) }
    }
}

impl ParallelFanOutExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions_observed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for ParallelFanOutExecutor {
    fn task_type(&self) -> &str {
        "parallel-fanout"
    }

    async fn execute(
        &self,
        _task: &TaskItem,
        _progress: Arc<dyn ProgressSink>,
        _cancel_signal: CancellationToken,
    ) -> Result<String> {
        Ok("fan-out started".to_string())
    }

    async fn on_all_subtasks_success(&self, _parent: &TaskItem) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}
