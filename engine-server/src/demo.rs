//! The `--demo` mode: builds a small task hierarchy exercising sequential
//! relay between two leaves, submits it, and polls until the root reaches a
//! terminal state.

use anyhow::{bail, Context, Result};
use engine_core::models::{HierarchyRequest, NewTaskRequest};
use engine_core::repository::TaskRepository;
use engine_dispatch::TaskService;
use std::time::Duration;
use tokio::time::sleep;

const DEMO_OWNER: &str = "demo-owner";

/// Submit a `sequential-relay` parent with two `echo` children, wait for it
/// to finish, and return a human-readable summary.
pub async fn run_demo<R: TaskRepository + 'static>(service: &TaskService<R>) -> Result<String> {
    let tree = HierarchyRequest {
        root: NewTaskRequest::new("sequential-relay", "{}"),
        children: vec![
            HierarchyRequest::leaf(NewTaskRequest::new("echo", "hello from step one")),
            HierarchyRequest::leaf(NewTaskRequest::new("echo", "placeholder, relayed over")),
        ],
    };

    let root = service
        .create_hierarchy(tree, DEMO_OWNER.to_string(), None)
        .await
        .context("failed to submit demo hierarchy")?;

    let root = wait_for_terminal(service, root.id).await?;

    Ok(format!(
        "demo hierarchy {} finished in state {:?} with output {:?}",
        root.id, root.state, root.output
    ))
}

async fn wait_for_terminal<R: TaskRepository + 'static>(
    service: &TaskService<R>,
    task_id: engine_core::models::TaskId,
) -> Result<engine_core::models::TaskItem> {
    for _ in 0..600 {
        match service.get(task_id, &DEMO_OWNER.to_string()).await? {
            Some(task) if task.state.is_terminal() => return Ok(task),
            Some(_) => sleep(Duration::from_millis(100)).await,
            None => bail!("demo task {task_id} disappeared while waiting for completion"),
        }
    }
    bail!("demo hierarchy did not reach a terminal state within the wait budget")
}
