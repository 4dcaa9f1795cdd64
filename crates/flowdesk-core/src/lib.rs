//! Business logic and port trait definitions for Flowdesk.
//!
//! This crate defines the "ports" (persistence backend, clock, step
//! executors, generation service) that the infrastructure layer implements,
//! plus the workflow engine and report job store built on top of them.
//! It depends only on `flowdesk-types` -- never on `flowdesk-infra`.

pub mod clock;
pub mod event;
pub mod report;
pub mod storage;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
