use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a task. A v7 UUID so that IDs are roughly creation-ordered,
/// which is convenient for the in-memory store's child index but not relied
/// upon for correctness anywhere in the engine.
pub type TaskId = Uuid;

/// Identifier for the principal that created a task. Opaque to the engine;
/// only used for `owner`-scoped queries and the `Forbidden` error kind.
pub type OwnerId = String;

/// Identifier for a concurrency pool. `"default"` is reserved (see
/// [`DEFAULT_GROUP`]) and always has a gate, even if never configured.
pub type GroupId = String;

/// The well-known group every task falls back to when it doesn't name one.
pub const DEFAULT_GROUP: &str = "default";

/// One node in the task tree.
///
/// # Examples
///
/// ```rust
/// use engine_core::models::{TaskItem, NewTaskRequest};
///
/// let req = NewTaskRequest::new("countdown", "{\"durationInSeconds\":1}");
/// let task = TaskItem::from_request(req, "alice".to_string(), None, None);
/// assert_eq!(task.state, engine_core::models::TaskState::Queued);
/// assert_eq!(task.root_task_id, task.id);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskItem {
    /// Unique identifier. Immutable.
    pub id: TaskId,
    /// Principal who created this task. Used by callers for authorization only.
    pub owner_id: OwnerId,
    /// Concurrency pool selector.
    pub group_id: GroupId,
    /// Higher dispatches first.
    pub priority: i32,
    /// Executor selector.
    pub task_type: String,
    /// Opaque payload (JSON by convention). Mutable only while `Queued`.
    pub payload: String,
    /// Opaque output, set by the executor, readable by parent hooks.
    pub output: Option<String>,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Progress in `[0, 100]`. For parents, always derived from children.
    pub progress: f64,
    /// Free-form annotation attached to the last progress event.
    pub progress_details: Option<String>,
    /// Free-form payload attached to the last progress event.
    pub progress_payload: Option<String>,
    /// Free-form annotation attached to the last state-change event.
    pub state_details: Option<String>,
    /// Parent task, if any. Must share `owner_id`, `root_task_id`, `auth_token`, `track_history`.
    pub parent_task_id: Option<TaskId>,
    /// Equals `id` for roots; equals the parent's `root_task_id` for children. Constant for the task's life.
    pub root_task_id: TaskId,
    /// Positive weight contributing to the parent's aggregated progress.
    pub weight: f64,
    /// Parent-only: whether immediate children are launched all at once or one at a time.
    pub subtask_parallelism: bool,
    /// Inherited from the root at creation.
    pub track_history: bool,
    /// Inherited from the root at creation; read-only afterwards. Never re-derived.
    pub auth_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on `Queued -> Executing`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set on transition into any terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskItem {
    /// Build a root task from a creation request.
    pub fn from_request(
        req: NewTaskRequest,
        owner_id: OwnerId,
        id_override: Option<TaskId>,
        auth_token: Option<String>,
    ) -> Self {
        let id = id_override.unwrap_or_else(Uuid::now_v7);
        let now = Utc::now();
        Self {
            id,
            owner_id,
            group_id: req.group_id.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            priority: req.priority,
            task_type: req.task_type,
            payload: req.payload,
            output: None,
            state: TaskState::Queued,
            progress: 0.0,
            progress_details: None,
            progress_payload: None,
            state_details: None,
            parent_task_id: None,
            root_task_id: id,
            weight: req.weight.unwrap_or(1.0),
            subtask_parallelism: req.subtask_parallelism.unwrap_or(false),
            track_history: req.track_history.unwrap_or(true),
            auth_token,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Build a child task, inheriting tree-wide fields from `parent`.
    pub fn child_from_request(req: NewTaskRequest, parent: &TaskItem) -> Self {
        let id = req.id.unwrap_or_else(Uuid::now_v7);
        let now = Utc::now();
        Self {
            id,
            owner_id: parent.owner_id.clone(),
            group_id: req.group_id.unwrap_or_else(|| parent.group_id.clone()),
            priority: req.priority,
            task_type: req.task_type,
            payload: req.payload,
            output: None,
            state: TaskState::Queued,
            progress: 0.0,
            progress_details: None,
            progress_payload: None,
            state_details: None,
            parent_task_id: Some(parent.id),
            root_task_id: parent.root_task_id,
            weight: req.weight.unwrap_or(1.0),
            subtask_parallelism: req.subtask_parallelism.unwrap_or(false),
            track_history: parent.track_history,
            auth_token: parent.auth_token.clone(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_parent_of(&self, candidate_parent_id: TaskId) -> bool {
        self.parent_task_id == Some(candidate_parent_id)
    }

    /// Transition into a new state, stamping `started_at`/`completed_at` as needed.
    /// Terminal states are absorbing: calling this when already terminal is a no-op
    /// that returns `false` so callers can detect and skip redundant event publication.
    pub fn transition(&mut self, new_state: TaskState, details: Option<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let now = Utc::now();
        if self.state == TaskState::Queued && new_state == TaskState::Executing {
            self.started_at = Some(now);
        }
        if new_state.is_terminal() {
            self.completed_at = Some(now);
        }
        self.state = new_state;
        self.state_details = details;
        self.updated_at = now;
        true
    }
}

/// Task lifecycle states.
///
/// `Queued -> Executing -> {Completed, Cancelled, Errored, Terminated}`. The
/// four non-`Queued`/`Executing` states are absorbing: no transitions leave them.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Executing,
    Completed,
    Cancelled,
    Errored,
    Terminated,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Errored | TaskState::Terminated
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Queued => "Queued",
            TaskState::Executing => "Executing",
            TaskState::Completed => "Completed",
            TaskState::Cancelled => "Cancelled",
            TaskState::Errored => "Errored",
            TaskState::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

/// Request to create a single task (root or, via [`TaskItem::child_from_request`], a child).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTaskRequest {
    pub task_type: String,
    pub payload: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub group_id: Option<GroupId>,
    /// Only meaningful via `TaskService::create`; ignored by `child_from_request`
    /// (the parent is passed explicitly there instead).
    pub parent_task_id: Option<TaskId>,
    pub weight: Option<f64>,
    pub subtask_parallelism: Option<bool>,
    pub track_history: Option<bool>,
    /// Caller-assigned id, for idempotent creation. Randomly generated if absent.
    pub id: Option<TaskId>,
}

fn default_priority() -> i32 {
    0
}

impl NewTaskRequest {
    pub fn new(task_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            payload: payload.into(),
            priority: 0,
            group_id: None,
            parent_task_id: None,
            weight: None,
            subtask_parallelism: None,
            track_history: None,
            id: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.subtask_parallelism = Some(parallel);
        self
    }
}

/// A tree of creation requests materialized atomically by `create_hierarchy`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchyRequest {
    pub root: NewTaskRequest,
    pub children: Vec<HierarchyRequest>,
}

impl HierarchyRequest {
    pub fn leaf(root: NewTaskRequest) -> Self {
        Self { root, children: vec![] }
    }
}

/// Fields updatable on a `Queued` task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateTaskRequest {
    pub priority: Option<i32>,
    pub payload: Option<String>,
}

/// Query filter for `list_owner_tasks`-style lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub owner: Option<OwnerId>,
    pub state: Option<TaskState>,
    pub group_id: Option<GroupId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_task_is_its_own_root() {
        let req = NewTaskRequest::new("echo", "hello");
        let task = TaskItem::from_request(req, "alice".into(), None, None);
        assert_eq!(task.root_task_id, task.id);
        assert_eq!(task.state, TaskState::Queued);
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn child_task_inherits_root_and_auth() {
        let root_req = NewTaskRequest::new("sequential-relay", "{}");
        let root = TaskItem::from_request(root_req, "alice".into(), None, Some("tok-1".into()));

        let child_req = NewTaskRequest::new("echo", "child-payload");
        let child = TaskItem::child_from_request(child_req, &root);

        assert_eq!(child.root_task_id, root.id);
        assert_eq!(child.owner_id, root.owner_id);
        assert_eq!(child.auth_token, root.auth_token);
        assert_eq!(child.parent_task_id, Some(root.id));
        assert_eq!(child.group_id, root.group_id);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let req = NewTaskRequest::new("echo", "hi");
        let mut task = TaskItem::from_request(req, "alice".into(), None, None);
        assert!(task.transition(TaskState::Executing, None));
        assert!(task.transition(TaskState::Completed, None));
        assert!(task.completed_at.is_some());
        assert!(!task.transition(TaskState::Errored, Some("too late".into())));
        assert_eq!(task.state, TaskState::Completed);
    }

    #[test]
    fn display_matches_variant_names() {
        assert_eq!(TaskState::Queued.to_string(), "Queued");
        assert_eq!(TaskState::Terminated.to_string(), "Terminated");
    }
}
