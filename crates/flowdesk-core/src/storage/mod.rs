//! Storage abstractions for Flowdesk.
//!
//! Defines the persistence backend trait. Implementations live in flowdesk-infra.

pub mod kv_store;
