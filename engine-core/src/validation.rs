use crate::{
    error::{EngineError, Result},
    models::{NewTaskRequest, TaskItem},
};

/// Validation for task creation and update requests.
pub struct TaskValidator;

impl TaskValidator {
    /// Task types select an executor and are used verbatim as a registry key.
    ///
    /// Must be 1-64 characters of letters, numbers, hyphens, and underscores.
    pub fn validate_task_type(task_type: &str) -> Result<()> {
        if task_type.is_empty() {
            return Err(EngineError::invalid_request("task_type must not be empty"));
        }
        if task_type.len() > 64 {
            return Err(EngineError::invalid_request(
                "task_type must be at most 64 characters long",
            ));
        }
        let valid = task_type
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(EngineError::invalid_request(
                "task_type may only contain letters, numbers, hyphens, and underscores",
            ));
        }
        Ok(())
    }

    /// Group ids gate concurrency; same character rules as task types but
    /// longer since operators may want descriptive names (e.g. `"customer-export-eu"`).
    pub fn validate_group_id(group_id: &str) -> Result<()> {
        if group_id.is_empty() {
            return Err(EngineError::invalid_request("group_id must not be empty"));
        }
        if group_id.len() > 128 {
            return Err(EngineError::invalid_request(
                "group_id must be at most 128 characters long",
            ));
        }
        Ok(())
    }

    /// Owner ids are opaque but must be non-empty; the engine uses them only
    /// for equality checks in [`EngineError::Forbidden`].
    pub fn validate_owner_id(owner_id: &str) -> Result<()> {
        if owner_id.trim().is_empty() {
            return Err(EngineError::invalid_request("owner_id must not be empty"));
        }
        Ok(())
    }

    /// Weight must be strictly positive: a zero or negative weight would let
    /// a child silently vanish from (or invert) its parent's aggregate progress.
    pub fn validate_weight(weight: f64) -> Result<()> {
        if !(weight > 0.0) || !weight.is_finite() {
            return Err(EngineError::invalid_request(
                "weight must be a positive, finite number",
            ));
        }
        Ok(())
    }

    /// Validate a complete creation request before it becomes a [`TaskItem`].
    pub fn validate_new_task_request(req: &NewTaskRequest) -> Result<()> {
        Self::validate_task_type(&req.task_type)?;
        if let Some(group_id) = &req.group_id {
            Self::validate_group_id(group_id)?;
        }
        if let Some(weight) = req.weight {
            Self::validate_weight(weight)?;
        }
        Ok(())
    }

    /// A payload update is only legal while the task is still `Queued`; once
    /// dispatched, the executor may already have read it.
    pub fn validate_payload_mutable(task: &TaskItem) -> Result<()> {
        if task.state != crate::models::TaskState::Queued {
            return Err(EngineError::invalid_state(
                task.id,
                format!("cannot modify payload of a task in state {}", task.state),
            ));
        }
        Ok(())
    }

    /// Owner equality check, shared by every task-service operation that
    /// takes an acting owner alongside a task id.
    pub fn validate_owner_matches(task: &TaskItem, owner_id: &str) -> Result<()> {
        if task.owner_id != owner_id {
            return Err(EngineError::forbidden(owner_id.to_string(), task.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_task_types() {
        assert!(TaskValidator::validate_task_type("countdown").is_ok());
        assert!(TaskValidator::validate_task_type("sequential-relay").is_ok());
        assert!(TaskValidator::validate_task_type("fan_out_v2").is_ok());
    }

    #[test]
    fn invalid_task_types() {
        assert!(TaskValidator::validate_task_type("").is_err());
        assert!(TaskValidator::validate_task_type("has space").is_err());
        assert!(TaskValidator::validate_task_type(&"x".repeat(65)).is_err());
    }

    #[test]
    fn weight_must_be_positive_and_finite() {
        assert!(TaskValidator::validate_weight(1.0).is_ok());
        assert!(TaskValidator::validate_weight(0.0).is_err());
        assert!(TaskValidator::validate_weight(-2.0).is_err());
        assert!(TaskValidator::validate_weight(f64::NAN).is_err());
    }

    #[test]
    fn new_task_request_rejects_bad_group() {
        let mut req = NewTaskRequest::new("echo", "hi");
        req.group_id = Some("".to_string());
        assert!(TaskValidator::validate_new_task_request(&req).is_err());
    }

    #[test]
    fn payload_immutable_once_executing() {
        let req = NewTaskRequest::new("echo", "hi");
        let mut task = TaskItem::from_request(req, "alice".into(), None, None);
        assert!(TaskValidator::validate_payload_mutable(&task).is_ok());
        task.transition(crate::models::TaskState::Executing, None);
        assert!(TaskValidator::validate_payload_mutable(&task).is_err());
    }

    #[test]
    fn owner_mismatch_is_forbidden() {
        let req = NewTaskRequest::new("echo", "hi");
        let task = TaskItem::from_request(req, "alice".into(), None, None);
        assert!(TaskValidator::validate_owner_matches(&task, "alice").is_ok());
        let err = TaskValidator::validate_owner_matches(&task, "mallory").unwrap_err();
        assert!(err.is_forbidden());
    }
}
