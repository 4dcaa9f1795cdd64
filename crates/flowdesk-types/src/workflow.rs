//! Workflow domain types for Flowdesk.
//!
//! A `Workflow` is an ordered list of `Step`s with an aggregate status and
//! progress. Steps carry a type tag (the dispatch key into the executor
//! registry), a dependency set, and the runtime bookkeeping the engine fills
//! in during a sweep (result payload, error, timestamps, duration).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Aggregate status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// Whether the step has settled (`completed` or `failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The kind of step, used as the dispatch key into the executor registry.
///
/// Tags outside the built-in set parse as `Custom` so that integrations can
/// be registered without touching this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// External API invocation.
    Api,
    /// Language-model / extraction call.
    Ai,
    /// Branch or approval logic.
    Decision,
    /// Fan-out to a notification channel.
    Notification,
    /// Artifact generation.
    Document,
    /// Any other tag, dispatched to whatever executor was registered for it.
    #[serde(untagged)]
    Custom(String),
}

impl StepType {
    /// All known step types, in declaration order.
    pub const ALL: [StepType; 5] = [
        StepType::Api,
        StepType::Ai,
        StepType::Decision,
        StepType::Notification,
        StepType::Document,
    ];

    /// Parse a tag, mapping the built-in names to their variants.
    pub fn from_tag(tag: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .unwrap_or_else(|| StepType::Custom(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            StepType::Api => "api",
            StepType::Ai => "ai",
            StepType::Decision => "decision",
            StepType::Notification => "notification",
            StepType::Document => "document",
            StepType::Custom(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single unit of work inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step ID, unique within its workflow.
    pub id: String,
    /// Human-readable step name.
    #[serde(default)]
    pub name: String,
    /// Dispatch key into the executor registry.
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub status: StepStatus,
    /// IDs of steps that must be `completed` before this one may run.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Executor input parameters (endpoint, channel, template, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
    /// Executor result, present once the step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message if the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall time between `started_at` and `ended_at`, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Step {
    /// Create a pending step with no dependencies.
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            step_type,
            status: StepStatus::Pending,
            dependencies: Vec::new(),
            config: serde_json::Value::Null,
            data: None,
            error: None,
            started_at: None,
            ended_at: None,
            duration_ms: None,
        }
    }

    /// Builder-style helper to set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style helper to declare dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper to attach executor input.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Return the step to `pending` and drop all results of a previous run.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.data = None;
        self.error = None;
        self.started_at = None;
        self.ended_at = None;
        self.duration_ms = None;
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// An ordered collection of steps with aggregate status and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Stable, unique workflow ID.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Percentage of completed steps, in `[0, 100]`.
    #[serde(default)]
    pub progress: f64,
    /// Steps in stored order. The single-pass scheduler visits them in this order.
    pub steps: Vec<Step>,
    /// Free-text estimate shown to users (e.g. "2-3 hours").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a draft workflow from a list of steps.
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            progress: 0.0,
            steps,
            estimated_duration: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Look up a step by ID.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of steps currently `completed`.
    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// `100 * completed / total`. A workflow without steps counts as fully done.
    pub fn compute_progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 100.0;
        }
        100.0 * self.completed_count() as f64 / self.steps.len() as f64
    }

    /// Whether every step is `completed`.
    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Whether every dependency of the step at `index` names a `completed` step.
    ///
    /// Unknown dependency IDs are never satisfied.
    pub fn dependencies_satisfied(&self, index: usize) -> bool {
        let Some(step) = self.steps.get(index) else {
            return false;
        };
        step.dependencies.iter().all(|dep| {
            self.step(dep)
                .is_some_and(|d| d.status == StepStatus::Completed)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
