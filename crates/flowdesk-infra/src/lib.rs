//! Infrastructure layer for Flowdesk.
//!
//! Contains implementations of the port traits defined in `flowdesk-core`:
//! the SQLite-backed key-value store, plus data directory resolution and
//! the `config.toml` loader.

pub mod config;
pub mod filesystem;
pub mod sqlite;
