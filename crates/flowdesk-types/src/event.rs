//! Event types for the Flowdesk event bus.
//!
//! `FlowEvent` is broadcast while workflows execute and report jobs advance.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::ReportStatus;
use crate::workflow::{StepType, WorkflowStatus};

/// Lifecycle events emitted by the workflow engine and the report store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A sweep over a workflow has started.
    WorkflowStarted {
        workflow_id: String,
        workflow_name: String,
        total_steps: usize,
    },

    /// A step has started executing.
    StepStarted {
        workflow_id: String,
        step_id: String,
        step_type: StepType,
    },

    /// A step completed successfully.
    StepCompleted {
        workflow_id: String,
        step_id: String,
        duration_ms: u64,
    },

    /// A step failed. The sweep continues.
    StepFailed {
        workflow_id: String,
        step_id: String,
        error: String,
    },

    /// A step was left pending because its dependencies were not completed.
    StepSkipped { workflow_id: String, step_id: String },

    /// A sweep has ended.
    WorkflowFinished {
        workflow_id: String,
        status: WorkflowStatus,
        progress: f64,
        duration_ms: u64,
        cancelled: bool,
    },

    /// A report job changed status, progress, or phase.
    ReportUpdated {
        report_id: Uuid,
        status: ReportStatus,
        progress: u8,
        phase: String,
    },
}

impl FlowEvent {
    /// Returns the workflow ID for workflow-scoped events.
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            FlowEvent::WorkflowStarted { workflow_id, .. }
            | FlowEvent::StepStarted { workflow_id, .. }
            | FlowEvent::StepCompleted { workflow_id, .. }
            | FlowEvent::StepFailed { workflow_id, .. }
            | FlowEvent::StepSkipped { workflow_id, .. }
            | FlowEvent::WorkflowFinished { workflow_id, .. } => Some(workflow_id),

            FlowEvent::ReportUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_started_serde_roundtrip() {
        let event = FlowEvent::StepStarted {
            workflow_id: "wf-1".to_string(),
            step_id: "fetch".to_string(),
            step_type: StepType::Api,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_started\""));
        assert!(json.contains("\"step_type\":\"api\""));
        let parsed: FlowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, FlowEvent::StepStarted { step_type: StepType::Api, .. }));
    }

    #[test]
    fn test_report_updated_serde_roundtrip() {
        let event = FlowEvent::ReportUpdated {
            report_id: Uuid::now_v7(),
            status: ReportStatus::PdfCreated,
            progress: 100,
            phase: "Complete".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"pdf_created\""));
        let parsed: FlowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, FlowEvent::ReportUpdated { progress: 100, .. }));
        assert!(parsed.workflow_id().is_none());
    }

    #[test]
    fn test_workflow_id_accessor() {
        let event = FlowEvent::StepSkipped {
            workflow_id: "wf-9".to_string(),
            step_id: "b".to_string(),
        };
        assert_eq!(event.workflow_id(), Some("wf-9"));
    }
}
