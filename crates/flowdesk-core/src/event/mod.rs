//! Event distribution for workflow and report lifecycle events.

pub mod bus;
