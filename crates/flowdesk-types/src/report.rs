//! Report job types for Flowdesk.
//!
//! A `ReportJob` tracks one asynchronous report-generation attempt through
//! the status automaton:
//!
//! ```text
//! pending    -> generating | failed
//! generating -> generating | generated | failed
//! generated  -> pdf_created
//! ```
//!
//! `failed` and `pdf_created` are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default capacity of the persisted report history.
pub const MAX_REPORTS: usize = 50;

/// Status of a report job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Generating,
    Generated,
    PdfCreated,
    Failed,
}

impl ReportStatus {
    /// Whether the automaton allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Pending, Failed)
                | (Generating, Generating)
                | (Generating, Generated)
                | (Generating, Failed)
                | (Generated, PdfCreated)
        )
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Failed | ReportStatus::PdfCreated)
    }

    /// Whether a job in this status carries a report payload.
    pub fn has_report(&self) -> bool {
        matches!(self, ReportStatus::Generated | ReportStatus::PdfCreated)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Generating => "generating",
            ReportStatus::Generated => "generated",
            ReportStatus::PdfCreated => "pdf_created",
            ReportStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "generating" => Ok(ReportStatus::Generating),
            "generated" => Ok(ReportStatus::Generated),
            "pdf_created" => Ok(ReportStatus::PdfCreated),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(format!("unknown report status '{other}'")),
        }
    }
}

/// One entry of the persisted report history.
///
/// Invariant: `report.is_some()` iff `status` is `generated` or `pdf_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportJob {
    /// UUIDv7 job ID.
    pub id: Uuid,
    /// Name of the workflow the report was generated for.
    pub workflow_name: String,
    pub status: ReportStatus,
    /// Percentage in `[0, 100]`.
    pub progress: u8,
    /// Free-text sub-state label while generating.
    #[serde(default)]
    pub phase: String,
    /// Generated report payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Location of the rendered PDF, once produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportJob {
    /// Create a fresh `pending` job at progress 0.
    pub fn pending(workflow_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_name: workflow_name.into(),
            status: ReportStatus::Pending,
            progress: 0,
            phase: "Queued".to_string(),
            report: None,
            error: None,
            pdf_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Size information about the persisted report history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Number of stored jobs.
    pub item_count: usize,
    /// Byte length of the serialized history blob.
    pub size_bytes: usize,
    /// Capacity of the history.
    pub max_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReportStatus::*;

    #[test]
    fn test_report_status_serde() {
        assert_eq!(serde_json::to_string(&PdfCreated).unwrap(), "\"pdf_created\"");
        for status in [Pending, Generating, Generated, PdfCreated, Failed] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: ReportStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
            assert_eq!(status.to_string().parse::<ReportStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(Pending.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generated));
        assert!(Generated.can_transition_to(PdfCreated));
    }

    #[test]
    fn test_failure_transitions() {
        assert!(Pending.can_transition_to(Failed));
        assert!(Generating.can_transition_to(Failed));
        assert!(!Generated.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in [Pending, Generating, Generated, PdfCreated, Failed] {
            assert!(!Failed.can_transition_to(next));
            assert!(!PdfCreated.can_transition_to(next));
        }
        assert!(Failed.is_terminal());
        assert!(PdfCreated.is_terminal());
        assert!(!Generated.is_terminal());
    }

    #[test]
    fn test_out_of_order_transitions_rejected() {
        assert!(!Pending.can_transition_to(Generated));
        assert!(!Pending.can_transition_to(PdfCreated));
        assert!(!Generating.can_transition_to(PdfCreated));
        assert!(!Generated.can_transition_to(Generating));
    }

    #[test]
    fn test_pending_job_defaults() {
        let job = ReportJob::pending("Invoice intake", Utc::now());
        assert_eq!(job.status, Pending);
        assert_eq!(job.progress, 0);
        assert!(job.report.is_none());
        assert!(!job.status.has_report());

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"workflow_name\":\"Invoice intake\""));
        assert!(!json.contains("\"report\""));
    }

    #[test]
    fn test_unknown_status_string() {
        assert!("done".parse::<ReportStatus>().is_err());
    }
}
