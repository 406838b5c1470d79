//! `engine-server`: the CLI binary that wires an in-memory repository, the
//! built-in executors, and the dispatcher together behind a layered
//! configuration and a tracing-based event sink.

pub mod config;
pub mod demo;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use setup::{create_registry, initialize_app, App, TracingEventPublisher};
pub use telemetry::init_telemetry;
