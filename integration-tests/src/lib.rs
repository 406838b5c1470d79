//! End-to-end scenario tests for the task execution engine live under
//! `tests/`. This crate has no public API of its own; it exists so the
//! workspace has a place to wire `engine-core`, `engine-store`,
//! `engine-dispatch`, and `engine-mocks` together as a single process and
//! drive them through a real dispatch loop, the way a production
//! consumer of this engine would.
