//! Mock implementations and test utilities for the task execution engine.
//!
//! This crate provides:
//! - `MockTaskRepository` and `MockEventPublisher`, recording fakes for the
//!   two engine-core traits that touch the outside world
//! - Scripted executors used by integration tests and `--demo` mode
//! - Builders, fixtures, and generators for constructing test data
//! - Custom assertion helpers

pub mod assertions;
pub mod builders;
pub mod events;
pub mod executors;
pub mod fixtures;
pub mod generators;
pub mod repository;

pub use assertions::*;
pub use builders::*;
pub use events::MockEventPublisher;
pub use executors::{
    CountdownExecutor, EchoExecutor, FlakyExecutor, ParallelFanOutExecutor, SequentialRelayExecutor,
    SleepExecutor,
};
pub use fixtures::*;
pub use generators::*;
pub use repository::MockTaskRepository;
