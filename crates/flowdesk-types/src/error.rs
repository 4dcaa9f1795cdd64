use thiserror::Error;
use uuid::Uuid;

use crate::report::ReportStatus;

/// Errors from persistence backend operations (used by trait definitions in flowdesk-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to report job operations.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report '{0}' not found")]
    NotFound(Uuid),

    #[error("status '{0}' is not accepted by this operation")]
    InvalidStatus(ReportStatus),

    #[error("invalid report transition: {from} -> {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("serialization error: {0}")]
    Serialization(String),
}
