//! Workflow execution: the engine, step executors, and workflow persistence.

pub mod engine;
pub mod executor;
pub mod simulated;
pub mod store;
