use crate::models::{TaskId, TaskState};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the task execution engine.
///
/// Each variant maps to a status code equivalent so callers embedding the
/// engine behind an HTTP or RPC surface can translate it without matching
/// on variants themselves.
///
/// # Examples
///
/// ```rust
/// use engine_core::error::EngineError;
///
/// let err = EngineError::not_found(uuid::Uuid::nil());
/// assert!(err.is_not_found());
/// assert_eq!(err.status_code(), 404);
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No task exists with the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The caller does not own the task it is operating on.
    #[error("owner {0} is not permitted to operate on task {1}")]
    Forbidden(String, TaskId),

    /// The requested operation is not valid for the task's current state
    /// (e.g. updating the payload of an `Executing` task).
    #[error("invalid state for task {0}: {1}")]
    InvalidState(TaskId, String),

    /// The request itself is malformed, independent of any task's state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An executor's `execute` call returned an error.
    #[error("executor failed for task {0}: {1}")]
    ExecutorFailure(TaskId, String),

    /// A bounded wait (queue poll, shutdown drain) exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The operation was aborted by a cancellation signal.
    #[error("task {0} was cancelled")]
    Cancelled(TaskId),

    /// The backing repository failed independent of task semantics.
    #[error("repository error: {0}")]
    Repository(String),
}

impl EngineError {
    pub fn not_found(id: TaskId) -> Self {
        Self::NotFound(id)
    }

    pub fn forbidden(owner_id: impl Into<String>, id: TaskId) -> Self {
        Self::Forbidden(owner_id.into(), id)
    }

    pub fn invalid_state(id: TaskId, reason: impl Into<String>) -> Self {
        Self::InvalidState(id, reason.into())
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn executor_failure(id: TaskId, reason: impl Into<String>) -> Self {
        Self::ExecutorFailure(id, reason.into())
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::Timeout(reason.into())
    }

    pub fn cancelled(id: TaskId) -> Self {
        Self::Cancelled(id)
    }

    pub fn repository(reason: impl Into<String>) -> Self {
        Self::Repository(reason.into())
    }

    /// Build the standard "task X is Queued, cannot do Y" invalid-state error.
    pub fn unexpected_state(id: TaskId, expected: TaskState, actual: TaskState) -> Self {
        Self::InvalidState(id, format!("expected {expected}, found {actual}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, EngineError::Forbidden(_, _))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, EngineError::InvalidState(_, _))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled(_))
    }

    /// HTTP status code equivalent, for engines embedded behind a web front end.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::Forbidden(_, _) => 403,
            EngineError::InvalidState(_, _) => 409,
            EngineError::InvalidRequest(_) => 400,
            EngineError::ExecutorFailure(_, _) => 500,
            EngineError::Timeout(_) => 504,
            EngineError::Cancelled(_) => 499,
            EngineError::Repository(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn predicates_and_status_codes_agree() {
        let id = Uuid::now_v7();
        let err = EngineError::not_found(id);
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);

        let err = EngineError::forbidden("alice", id);
        assert!(err.is_forbidden());
        assert_eq!(err.status_code(), 403);

        let err = EngineError::unexpected_state(id, TaskState::Queued, TaskState::Executing);
        assert!(err.is_invalid_state());
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn display_includes_task_id() {
        let id = Uuid::nil();
        let err = EngineError::cancelled(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
