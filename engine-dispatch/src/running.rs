//! Registry of cancellation tokens for tasks currently being worked on, so
//! the Task Service can cancel an `Executing` task without knowing which
//! worker routine is running it.

use engine_core::models::TaskId;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct RunningTasks {
    tokens: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl RunningTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, task_id: TaskId, token: CancellationToken) {
        self.tokens.lock().await.insert(task_id, token);
    }

    pub async fn unregister(&self, task_id: TaskId) {
        self.tokens.lock().await.remove(&task_id);
    }

    /// Fire the cancellation signal for `task_id`, if a worker currently owns one.
    /// Returns `false` if no worker is registered for it (e.g. it already finished).
    pub async fn cancel(&self, task_id: TaskId) -> bool {
        match self.tokens.lock().await.get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn cancel_trips_the_registered_token() {
        let running = RunningTasks::new();
        let task_id = Uuid::now_v7();
        let token = CancellationToken::new();
        running.register(task_id, token.clone()).await;

        assert!(running.cancel(task_id).await);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_of_unregistered_task_is_a_no_op() {
        let running = RunningTasks::new();
        assert!(!running.cancel(Uuid::now_v7()).await);
    }

    #[tokio::test]
    async fn unregister_drops_the_token() {
        let running = RunningTasks::new();
        let task_id = Uuid::now_v7();
        running.register(task_id, CancellationToken::new()).await;
        running.unregister(task_id).await;
        assert!(!running.cancel(task_id).await);
    }
}
