//! Per-group concurrency gates: a counting semaphore per `group_id`, created
//! lazily the first time a group is dispatched into. Parent tasks never hold
//! a gate while orchestrating their children (see the dispatcher's parent
//! path) so a subtree whose children share the parent's group cannot
//! deadlock against its own parent.

use engine_core::models::GroupId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Per-group `max_parallelism` configuration, consulted the first time a
/// group's gate is created. Unconfigured groups fall back to `default_cap`.
#[derive(Debug, Clone, Default)]
pub struct GroupConfig {
    caps: HashMap<GroupId, usize>,
    default_cap: usize,
}

impl GroupConfig {
    pub fn new(default_cap: usize) -> Self {
        Self { caps: HashMap::new(), default_cap }
    }

    pub fn with_cap(mut self, group_id: impl Into<GroupId>, cap: usize) -> Self {
        self.caps.insert(group_id.into(), cap);
        self
    }

    fn cap_for(&self, group_id: &str) -> usize {
        self.caps.get(group_id).copied().unwrap_or(self.default_cap)
    }
}

/// Lazily-populated `group_id -> semaphore` map.
pub struct GroupGates {
    config: GroupConfig,
    gates: Mutex<HashMap<GroupId, Arc<Semaphore>>>,
}

impl GroupGates {
    pub fn new(config: GroupConfig) -> Self {
        Self { config, gates: Mutex::new(HashMap::new()) }
    }

    /// Acquire a permit for `group_id`, creating its gate from the
    /// configured (or default) cap if this is the first task seen for it.
    pub async fn acquire(&self, group_id: &str) -> OwnedSemaphorePermit {
        let semaphore = self.semaphore_for(group_id).await;
        semaphore
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed while the dispatcher is running")
    }

    async fn semaphore_for(&self, group_id: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().await;
        gates
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.cap_for(group_id))))
            .clone()
    }

    /// Permits currently available for `group_id`, for tests and diagnostics.
    /// Returns the configured cap if the group's gate hasn't been created yet.
    pub async fn available_permits(&self, group_id: &str) -> usize {
        let gates = self.gates.lock().await;
        match gates.get(group_id) {
            Some(sem) => sem.available_permits(),
            None => self.config.cap_for(group_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_group_uses_default_cap() {
        let gates = GroupGates::new(GroupConfig::new(32));
        assert_eq!(gates.available_permits("default").await, 32);
    }

    #[tokio::test]
    async fn configured_group_uses_its_own_cap() {
        let gates = GroupGates::new(GroupConfig::new(32).with_cap("batch", 2));
        let _permit = gates.acquire("batch").await;
        assert_eq!(gates.available_permits("batch").await, 1);
    }

    #[tokio::test]
    async fn releasing_a_permit_returns_it_to_the_pool() {
        let gates = GroupGates::new(GroupConfig::new(1));
        {
            let _permit = gates.acquire("default").await;
            assert_eq!(gates.available_permits("default").await, 0);
        }
        assert_eq!(gates.available_permits("default").await, 1);
    }
}
