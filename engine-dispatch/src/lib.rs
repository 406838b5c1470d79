//! Task dispatch: the priority queue, per-group concurrency gates, progress
//! aggregation, the owner-scoped task service, and the dispatcher that pulls
//! from the queue and runs tasks to completion.
//!
//! # Overview
//!
//! [`TaskService`] is the API embedders call to create, inspect, update, and
//! cancel tasks; it never runs anything itself. [`Dispatcher`] is the engine
//! that actually executes tasks: it owns the single dispatch loop, acquires
//! per-group gates from [`GroupGates`], and runs each dequeued task's Leaf
//! Path or Parent Path to a terminal state, aggregating progress up the tree
//! via [`aggregate_from_child`] as it goes.
//!
//! # Example
//!
//! ```no_run
//! use engine_core::error::Result;
//! use engine_core::events::NullEventPublisher;
//! use engine_core::executor::ExecutorRegistry;
//! use engine_dispatch::{Dispatcher, DispatcherConfig, GroupConfig, GroupGates, RunningTasks, TaskQueue, TaskService};
//! use engine_mocks::MockTaskRepository;
//! use std::sync::Arc;
//!
//! async fn wire_it_up() -> Result<()> {
//!     let repo = Arc::new(MockTaskRepository::new());
//!     let publisher = Arc::new(NullEventPublisher);
//!     let queue = Arc::new(TaskQueue::new());
//!     let running = Arc::new(RunningTasks::new());
//!     let gates = Arc::new(GroupGates::new(GroupConfig::new(8)));
//!     let registry = Arc::new(ExecutorRegistry::new());
//!
//!     let service = TaskService::new(repo.clone(), publisher.clone(), queue.clone(), running.clone());
//!     let dispatcher = Dispatcher::new(repo, registry, publisher, queue, gates, running, DispatcherConfig::default());
//!
//!     tokio::spawn(dispatcher.clone().run());
//!     let _ = service;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod dispatcher;
pub mod gates;
pub mod queue;
pub mod running;
pub mod service;

pub use aggregator::aggregate_from_child;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use gates::{GroupConfig, GroupGates};
pub use queue::TaskQueue;
pub use running::RunningTasks;
pub use service::TaskService;
