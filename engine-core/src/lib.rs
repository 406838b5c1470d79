//! Domain model, traits, and validation for the task execution engine.
//!
//! All other crates in this workspace depend on the types defined here. No
//! module in this crate touches I/O: storage is an interface
//! ([`repository::TaskRepository`]), work is an interface
//! ([`executor::Executor`]), and notification is an interface
//! ([`events::EventPublisher`]). Concrete implementations live in the
//! `engine-store`, `engine-mocks`, and `engine-dispatch` crates.
//!
//! # Architecture
//!
//! - [`models`] - `TaskItem`, `TaskState`, and request/DTO types
//! - [`error`] - `EngineError` and the crate-wide `Result` alias
//! - [`repository`] - `TaskRepository` trait and `RepositoryStats`
//! - [`executor`] - `Executor` trait, `ExecutorRegistry`, `ProgressSink`
//! - [`events`] - `TaskEvent` and `EventPublisher`
//! - [`validation`] - request and state-transition validation helpers
//! - [`testing`] - shared contract tests for `TaskRepository` implementations
//!
//! # Example
//!
//! ```rust
//! use engine_core::{
//!     models::{NewTaskRequest, TaskItem},
//!     validation::TaskValidator,
//! };
//!
//! let request = NewTaskRequest::new("countdown", "{\"durationInSeconds\":3}").with_priority(5);
//! TaskValidator::validate_new_task_request(&request).unwrap();
//! let task = TaskItem::from_request(request, "alice".to_string(), None, None);
//! assert_eq!(task.priority, 5);
//! ```

pub mod error;
pub mod events;
pub mod executor;
pub mod models;
pub mod repository;
pub mod testing;
pub mod validation;

pub use error::{EngineError, Result};
pub use events::{EventPublisher, NullEventPublisher, TaskEvent};
pub use executor::{Executor, ExecutorRegistry, ProgressSink};
pub use models::{
    GroupId, HierarchyRequest, NewTaskRequest, OwnerId, TaskFilter, TaskId, TaskItem, TaskState,
    UpdateTaskRequest, DEFAULT_GROUP,
};
pub use repository::{RepositoryStats, TaskRepository};
pub use validation::TaskValidator;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
