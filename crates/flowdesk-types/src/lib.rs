//! Shared domain types for Flowdesk.
//!
//! This crate contains the core domain types used across the Flowdesk
//! workflow and reporting core: Workflow, Step, ReportJob, lifecycle events,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod report;
pub mod workflow;
