//! Report generation driver.
//!
//! A [`GenerationService`] produces report content and streams progress
//! updates over an mpsc channel. [`ReportGenerator`] owns the job side: it
//! creates the pending job, forwards each update into the history, and
//! finishes the job as `generated` or `failed`. Service failures are
//! recorded on the job, never returned as errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowdesk_types::error::ReportError;
use flowdesk_types::report::{ReportJob, ReportStatus};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::storage::kv_store::KvStore;

use super::history::ReportHistoryService;

/// Input for one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub workflow_name: String,
    /// Arbitrary context for the service, typically the executed workflow.
    pub input: Value,
}

/// Progress reported by a generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationUpdate {
    pub progress: u8,
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("generation cancelled")]
    Cancelled,
}

/// Produces report content.
pub trait GenerationService: Send + Sync {
    /// Generate a report, sending progress updates on `progress` as it goes.
    fn generate(
        &self,
        request: &GenerationRequest,
        progress: mpsc::UnboundedSender<GenerationUpdate>,
    ) -> impl Future<Output = Result<Value, GenerationError>> + Send;
}

/// Drives a [`GenerationService`] and records the outcome in the history.
pub struct ReportGenerator<S: KvStore, G: GenerationService> {
    history: Arc<ReportHistoryService<S>>,
    service: G,
}

impl<S: KvStore, G: GenerationService> ReportGenerator<S, G> {
    pub fn new(history: Arc<ReportHistoryService<S>>, service: G) -> Self {
        Self { history, service }
    }

    pub fn history(&self) -> &Arc<ReportHistoryService<S>> {
        &self.history
    }

    /// Run one generation attempt and return the finished job.
    ///
    /// `Err` is reserved for history failures (storage, unknown job); a
    /// failing or cancelled service yields `Ok` with a `failed` job.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<ReportJob, ReportError> {
        let id = self
            .history
            .create_pending_report(&request.workflow_name)
            .await?;
        if let Err(e) = self
            .history
            .update_report_progress(id, 0, "Starting", Some(ReportStatus::Generating))
            .await
        {
            // Leave no job stuck in `pending`.
            if let Err(mark) = self.history.mark_report_failed(id, &e.to_string()).await {
                tracing::warn!(report_id = %id, error = %mark, "could not mark unstarted report failed");
            }
            return Err(e);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut generation = Box::pin(self.service.generate(request, tx));

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(GenerationError::Cancelled),
                Some(update) = rx.recv() => self.forward(id, update).await,
                result = &mut generation => break result,
            }
        };
        drop(generation);

        if outcome.is_ok() {
            while let Ok(update) = rx.try_recv() {
                self.forward(id, update).await;
            }
        }

        match outcome {
            Ok(report) => self.history.complete_report(id, report).await,
            Err(e) => self.history.mark_report_failed(id, &e.to_string()).await,
        }
    }

    async fn forward(&self, id: Uuid, update: GenerationUpdate) {
        if let Err(e) = self
            .history
            .update_report_progress(
                id,
                update.progress,
                &update.phase,
                Some(ReportStatus::Generating),
            )
            .await
        {
            tracing::warn!(report_id = %id, error = %e, phase = update.phase.as_str(), "dropping progress update");
        }
    }
}

// ---------------------------------------------------------------------------
// SimulatedGenerationService
// ---------------------------------------------------------------------------

const SIMULATED_PHASES: [(u8, &str); 4] = [
    (10, "Analyzing workflow"),
    (35, "Generating insights"),
    (60, "Building recommendations"),
    (85, "Formatting report"),
];

/// Stand-in for the language-model report writer.
///
/// Walks through four phases with a fixed delay between them and builds a
/// small report from the workflow JSON passed as `input`.
#[derive(Debug, Clone)]
pub struct SimulatedGenerationService {
    phase_delay: Duration,
}

impl SimulatedGenerationService {
    pub fn new(phase_delay: Duration) -> Self {
        Self { phase_delay }
    }
}

impl GenerationService for SimulatedGenerationService {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: mpsc::UnboundedSender<GenerationUpdate>,
    ) -> Result<Value, GenerationError> {
        for (pct, phase) in SIMULATED_PHASES {
            // The receiver is gone once the driver stops listening.
            let _ = progress.send(GenerationUpdate {
                progress: pct,
                phase: phase.to_string(),
            });
            tokio::time::sleep(self.phase_delay).await;
        }

        Ok(simulated_report(request))
    }
}

fn simulated_report(request: &GenerationRequest) -> Value {
    let steps = request
        .input
        .get("steps")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let count = |status: &str| {
        steps
            .iter()
            .filter(|s| s.get("status").and_then(Value::as_str) == Some(status))
            .count()
    };
    let (completed, failed) = (count("completed"), count("failed"));

    let mut recommendations = vec!["Schedule this workflow to run automatically".to_string()];
    if failed > 0 {
        recommendations.push(format!("Add retries to the {failed} failing step(s)"));
    }
    if completed < steps.len() {
        recommendations.push("Review step ordering and dependencies".to_string());
    }

    json!({
        "title": format!("{} Report", request.workflow_name),
        "workflow_name": request.workflow_name,
        "summary": format!(
            "{completed} of {} steps completed, {failed} failed.",
            steps.len()
        ),
        "insights": [
            format!("{} steps analyzed", steps.len()),
            format!("{completed} steps completed successfully"),
        ],
        "recommendations": recommendations,
        "generated_at": Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
