//! Random test data generators.
//!
//! Provides realistic random data for property-based and fuzz-style tests:
//! random payloads, task type selection from the built-in executors, and
//! `proptest` strategies for `TaskState` and priority ranges.

use engine_core::models::{NewTaskRequest, TaskState};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;

/// One of the built-in executor task types, for tests that don't care which.
pub fn generate_task_type() -> String {
    let types = ["countdown", "sleepy", "flaky", "echo", "sequential-relay", "parallel-fanout"];
    types[rand::thread_rng().gen_range(0..types.len())].to_string()
}

/// A realistic free-text owner id.
pub fn generate_owner_id() -> String {
    let owners = ["alice", "bob", "carol", "dispatcher-ci", "load-test-harness"];
    owners[rand::thread_rng().gen_range(0..owners.len())].to_string()
}

/// A JSON-ish payload string, good enough for executors that don't parse it strictly.
pub fn generate_payload() -> String {
    let sentence: String = Sentence(3..8).fake();
    format!("{{\"note\":\"{sentence}\"}}")
}

/// A priority in the range typically exercised by dispatcher ordering tests.
pub fn generate_priority() -> i32 {
    rand::thread_rng().gen_range(-10..=10)
}

/// A fully random creation request using the generators above.
pub fn generate_new_task_request() -> NewTaskRequest {
    NewTaskRequest::new(generate_task_type(), generate_payload()).with_priority(generate_priority())
}

/// `proptest` strategy over every `TaskState` variant.
pub fn any_task_state() -> impl Strategy<Value = TaskState> {
    prop_oneof![
        Just(TaskState::Queued),
        Just(TaskState::Executing),
        Just(TaskState::Completed),
        Just(TaskState::Cancelled),
        Just(TaskState::Errored),
        Just(TaskState::Terminated),
    ]
}

/// `proptest` strategy over non-terminal states, for transition-validity tests.
pub fn any_non_terminal_state() -> impl Strategy<Value = TaskState> {
    prop_oneof![Just(TaskState::Queued), Just(TaskState::Executing)]
}

proptest! {
    #[test]
    fn generated_priority_is_in_range(priority in -10i32..=10) {
        prop_assert!((-10..=10).contains(&priority));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_task_type_is_one_of_the_built_ins() {
        let task_type = generate_task_type();
        assert!(["countdown", "sleepy", "flaky", "echo", "sequential-relay", "parallel-fanout"]
            .contains(&task_type.as_str()));
    }

    #[test]
    fn generated_request_is_internally_consistent() {
        let req = generate_new_task_request();
        assert!(!req.task_type.is_empty());
        assert!(!req.payload.is_empty());
    }
}
