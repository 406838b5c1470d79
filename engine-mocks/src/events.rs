//! Recording `EventPublisher` for asserting on what the dispatcher published.

use async_trait::async_trait;
use engine_core::events::{EventPublisher, TaskEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// An `EventPublisher` that records every event it receives, in order.
#[derive(Default)]
pub struct MockEventPublisher {
    events: Arc<Mutex<Vec<TaskEvent>>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Events published for a specific task, in publication order.
    pub fn events_for(&self, task_id: engine_core::models::TaskId) -> Vec<TaskEvent> {
        self.events.lock().iter().filter(|e| e.task_id() == task_id).cloned().collect()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: TaskEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn records_events_in_order() {
        let publisher = MockEventPublisher::new();
        let task_id = Uuid::now_v7();
        publisher
            .publish(TaskEvent::StateChanged {
                task_id,
                root_task_id: task_id,
                from: engine_core::models::TaskState::Queued,
                to: engine_core::models::TaskState::Executing,
                details: None,
                at: Utc::now(),
            })
            .await;
        assert_eq!(publisher.events_for(task_id).len(), 1);
    }
}
