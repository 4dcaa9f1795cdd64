//! Key-value store trait.
//!
//! The persistence backend behind the report history and the workflow store:
//! a string-keyed store of string values. Implementations live in flowdesk-infra.

use std::future::Future;
use std::sync::Arc;

use flowdesk_types::error::RepositoryError;

/// Trait for string-keyed durable storage.
///
/// Values are opaque strings (callers store JSON blobs). Every call is
/// treated as potentially-blocking I/O.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a key. No-op if the key does not exist.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// A shared store is a store; lets several services sit on one backend.
impl<T: KvStore> KvStore for Arc<T> {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        (**self).remove(key)
    }
}
