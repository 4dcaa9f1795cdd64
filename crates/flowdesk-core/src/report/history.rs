//! Persisted report job history.
//!
//! `ReportHistoryService` keeps every report job in one JSON array under a
//! single [`KvStore`] key, most recent first. New jobs are inserted at index 0
//! and the list is truncated to capacity, so the oldest entries fall off the
//! tail.
//!
//! Every mutation is a load-modify-save cycle guarded by an async mutex and
//! validated against the [`ReportStatus`] automaton. A rejected call leaves
//! the stored job untouched.

use std::sync::Arc;

use flowdesk_types::error::ReportError;
use flowdesk_types::event::FlowEvent;
use flowdesk_types::report::{MAX_REPORTS, ReportJob, ReportStatus, StorageInfo};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::event::bus::EventBus;
use crate::storage::kv_store::KvStore;

/// Key under which the report history is stored.
pub const REPORT_HISTORY_KEY: &str = "flowdesk.report_history";

/// Capacity-bounded, persisted list of report jobs.
pub struct ReportHistoryService<S: KvStore> {
    store: S,
    clock: Arc<dyn Clock>,
    max_reports: usize,
    write_lock: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl<S: KvStore> ReportHistoryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            max_reports: MAX_REPORTS,
            write_lock: Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the history capacity (at least 1).
    pub fn with_max_reports(mut self, max_reports: usize) -> Self {
        self.max_reports = max_reports.max(1);
        self
    }

    /// Publish a `ReportUpdated` event on every job change.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn max_reports(&self) -> usize {
        self.max_reports
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Insert a new `pending` job at the head of the history.
    pub async fn create_pending_report(&self, workflow_name: &str) -> Result<Uuid, ReportError> {
        let _guard = self.write_lock.lock().await;
        let mut jobs = self.load().await?;

        let job = ReportJob::pending(workflow_name, self.clock.now());
        let id = job.id;
        jobs.insert(0, job.clone());

        let evicted = jobs.len().saturating_sub(self.max_reports);
        jobs.truncate(self.max_reports);
        self.save(&jobs).await?;

        tracing::info!(report_id = %id, workflow_name, evicted, "created pending report");
        self.publish(&job);
        Ok(id)
    }

    /// Record generation progress and optionally move the job's status.
    ///
    /// `status` must be `generating`, `generated`, or `failed`. A job only
    /// becomes `generated` together with its payload, so `generated` is
    /// always rejected here; use [`complete_report`](Self::complete_report).
    /// Without a status the job keeps its current one, which must be
    /// `pending` or `generating`. Progress above 100 is clamped. Failing a
    /// job here records `phase` as its error.
    pub async fn update_report_progress(
        &self,
        id: Uuid,
        progress: u8,
        phase: &str,
        status: Option<ReportStatus>,
    ) -> Result<ReportJob, ReportError> {
        if let Some(rejected) = status.filter(|s| {
            !matches!(
                s,
                ReportStatus::Generating | ReportStatus::Generated | ReportStatus::Failed
            )
        }) {
            return Err(ReportError::InvalidStatus(rejected));
        }

        self.mutate(id, |job| {
            let next = match status {
                Some(ReportStatus::Generated) => {
                    return Err(ReportError::InvalidTransition {
                        from: job.status,
                        to: ReportStatus::Generated,
                    });
                }
                Some(next) => next,
                None if matches!(job.status, ReportStatus::Pending | ReportStatus::Generating) => {
                    job.status
                }
                None => {
                    return Err(ReportError::InvalidTransition {
                        from: job.status,
                        to: job.status,
                    });
                }
            };
            if status.is_some() {
                ensure_transition(job, next)?;
            }

            job.status = next;
            job.progress = progress.min(100);
            job.phase = phase.to_string();
            if next == ReportStatus::Failed {
                job.error = Some(phase.to_string());
            }
            Ok(())
        })
        .await
    }

    /// Attach the generated payload: `generating -> generated`.
    pub async fn complete_report(&self, id: Uuid, report: Value) -> Result<ReportJob, ReportError> {
        let job = self
            .mutate(id, |job| {
                ensure_transition(job, ReportStatus::Generated)?;
                job.status = ReportStatus::Generated;
                job.report = Some(report);
                job.progress = 100;
                job.phase = "Complete".to_string();
                job.error = None;
                Ok(())
            })
            .await?;
        tracing::info!(report_id = %id, workflow_name = job.workflow_name.as_str(), "report generated");
        Ok(job)
    }

    /// Fail a `pending` or `generating` job.
    pub async fn mark_report_failed(&self, id: Uuid, error: &str) -> Result<ReportJob, ReportError> {
        let job = self
            .mutate(id, |job| {
                ensure_transition(job, ReportStatus::Failed)?;
                job.status = ReportStatus::Failed;
                job.error = Some(error.to_string());
                Ok(())
            })
            .await?;
        tracing::warn!(report_id = %id, error, "report generation failed");
        Ok(job)
    }

    /// Downstream status change once an artifact exists.
    ///
    /// Accepts `generated` or `pdf_created`; the only transition that
    /// succeeds is `generated -> pdf_created`. `pdf_url` is stored when given.
    pub async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        pdf_url: Option<String>,
    ) -> Result<ReportJob, ReportError> {
        if !matches!(status, ReportStatus::Generated | ReportStatus::PdfCreated) {
            return Err(ReportError::InvalidStatus(status));
        }

        self.mutate(id, |job| {
            ensure_transition(job, status)?;
            job.status = status;
            if pdf_url.is_some() {
                job.pdf_url = pdf_url;
            }
            Ok(())
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The full history, most recent first.
    pub async fn get_history(&self) -> Result<Vec<ReportJob>, ReportError> {
        self.load().await
    }

    pub async fn get_report(&self, id: Uuid) -> Result<Option<ReportJob>, ReportError> {
        Ok(self.load().await?.into_iter().find(|j| j.id == id))
    }

    pub async fn get_reports_by_workflow(
        &self,
        workflow_name: &str,
    ) -> Result<Vec<ReportJob>, ReportError> {
        let mut jobs = self.load().await?;
        jobs.retain(|j| j.workflow_name == workflow_name);
        Ok(jobs)
    }

    pub async fn get_recent_reports(&self, limit: usize) -> Result<Vec<ReportJob>, ReportError> {
        let mut jobs = self.load().await?;
        jobs.truncate(limit);
        Ok(jobs)
    }

    pub async fn get_storage_info(&self) -> Result<StorageInfo, ReportError> {
        let raw = self.store.get(REPORT_HISTORY_KEY).await?;
        let item_count = match raw.as_deref() {
            Some(raw) => parse_history(raw).len(),
            None => 0,
        };
        Ok(StorageInfo {
            item_count,
            size_bytes: raw.map_or(0, |r| r.len()),
            max_items: self.max_reports,
        })
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Remove one job. Returns whether it existed.
    pub async fn delete_report(&self, id: Uuid) -> Result<bool, ReportError> {
        let _guard = self.write_lock.lock().await;
        let mut jobs = self.load().await?;
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Ok(false);
        }
        self.save(&jobs).await?;
        tracing::debug!(report_id = %id, "deleted report");
        Ok(true)
    }

    pub async fn clear_history(&self) -> Result<(), ReportError> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(REPORT_HISTORY_KEY).await?;
        tracing::info!("cleared report history");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load(&self) -> Result<Vec<ReportJob>, ReportError> {
        Ok(self
            .store
            .get(REPORT_HISTORY_KEY)
            .await?
            .map(|raw| parse_history(&raw))
            .unwrap_or_default())
    }

    async fn save(&self, jobs: &[ReportJob]) -> Result<(), ReportError> {
        let json =
            serde_json::to_string(jobs).map_err(|e| ReportError::Serialization(e.to_string()))?;
        self.store.set(REPORT_HISTORY_KEY, &json).await?;
        Ok(())
    }

    /// Apply `change` to a copy of job `id` and persist it if `change` succeeds.
    async fn mutate<F>(&self, id: Uuid, change: F) -> Result<ReportJob, ReportError>
    where
        F: FnOnce(&mut ReportJob) -> Result<(), ReportError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut jobs = self.load().await?;
        let slot = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(ReportError::NotFound(id))?;

        let mut job = slot.clone();
        change(&mut job)?;
        job.updated_at = self.clock.now();
        *slot = job.clone();

        self.save(&jobs).await?;
        tracing::debug!(
            report_id = %id,
            status = %job.status,
            progress = job.progress,
            phase = job.phase.as_str(),
            "report job updated"
        );
        self.publish(&job);
        Ok(job)
    }

    fn publish(&self, job: &ReportJob) {
        if let Some(bus) = &self.event_bus {
            bus.publish(FlowEvent::ReportUpdated {
                report_id: job.id,
                status: job.status,
                progress: job.progress,
                phase: job.phase.clone(),
            });
        }
    }
}

fn ensure_transition(job: &ReportJob, next: ReportStatus) -> Result<(), ReportError> {
    if job.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ReportError::InvalidTransition {
            from: job.status,
            to: next,
        })
    }
}

fn parse_history(raw: &str) -> Vec<ReportJob> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, key = REPORT_HISTORY_KEY, "discarding unreadable report history");
        Vec::new()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
