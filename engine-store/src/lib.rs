//! In-memory backing store for the task execution engine.
//!
//! This crate's only implementation, [`InMemoryTaskRepository`], keeps every
//! task in a process-local map. There is no durability: a restart loses the
//! whole task tree. That is deliberate (see the engine's Non-goals around
//! persistence) rather than an oversight — swap this crate for one backed by
//! a real database without touching `engine-core` or `engine-dispatch`,
//! which only ever see the `TaskRepository` trait.

mod memory;

pub use memory::InMemoryTaskRepository;

pub use engine_core::{
    error::{EngineError, Result},
    models::{TaskFilter, TaskItem, TaskState},
    repository::{RepositoryStats, TaskRepository},
};
