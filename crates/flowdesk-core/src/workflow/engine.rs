//! Workflow engine: dependency-gated, strictly sequential step sweeps.
//!
//! The `WorkflowEngine` owns a set of workflows keyed by ID. Executing a
//! workflow runs one sweep over its steps: every step whose dependencies are
//! already `completed` is executed, one at a time, in stored order. Step
//! failures are recorded on the step and never abort the sweep.
//!
//! # Scheduling
//!
//! - [`SchedulingMode::SinglePass`] visits the steps exactly once. A step
//!   whose dependency appears later in the list is never eligible and stays
//!   `pending`, so callers must supply steps in a dependency-compatible order.
//! - [`SchedulingMode::ReadyQueue`] repeats sequential passes over the
//!   still-pending steps until a pass executes nothing, which removes the
//!   ordering precondition. Cycles and dependents of failed steps still stay
//!   `pending`.
//!
//! In both modes the workflow ends `completed` only if every step completed,
//! and `failed` otherwise.
//!
//! # Execution flow
//!
//! 1. Reset every step to `pending`, mark the workflow `active`.
//! 2. Sweep: for each eligible step, record `running` + start time, invoke the
//!    executor (raced against the step timeout and the cancellation token),
//!    then record the outcome, end time, and duration.
//! 3. Recompute progress and derive the final workflow status.
//!
//! A sweep writes its progress back only while the workflow it started from
//! is still registered. Re-adding the ID mid-sweep wins; the sweep finishes
//! against its own copy and its summary is still returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use flowdesk_types::config::{GlobalConfig, SchedulingMode};
use flowdesk_types::event::FlowEvent;
use flowdesk_types::workflow::{Step, StepStatus, Workflow, WorkflowStatus};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::event::bus::EventBus;

use super::executor::{ExecutorRegistry, StepError};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub scheduling: SchedulingMode,
    /// Per-step timeout; `None` lets executors run unbounded.
    pub step_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for EngineConfig {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            scheduling: config.scheduling,
            step_timeout: config.step_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionSummary
// ---------------------------------------------------------------------------

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub progress: f64,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    /// Steps that never became eligible (or were not reached before cancellation).
    pub pending_steps: Vec<String>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl ExecutionSummary {
    fn from_workflow(workflow: &Workflow, cancelled: bool, duration_ms: u64) -> Self {
        let ids_with = |status: StepStatus| {
            workflow
                .steps
                .iter()
                .filter(|s| s.status == status)
                .map(|s| s.id.clone())
                .collect::<Vec<_>>()
        };

        Self {
            workflow_id: workflow.id.clone(),
            status: workflow.status,
            progress: workflow.progress,
            completed_steps: ids_with(StepStatus::Completed),
            failed_steps: ids_with(StepStatus::Failed),
            pending_steps: ids_with(StepStatus::Pending),
            cancelled,
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors returned by the engine itself. Step failures are never errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No workflow is registered under this ID.
    #[error("workflow '{0}' not found")]
    NotFound(String),

    /// A sweep over this workflow is already in progress.
    #[error("workflow '{0}' is already running")]
    AlreadyRunning(String),

    /// Cancel was requested for a workflow that is not running.
    #[error("workflow '{0}' is not running")]
    NotRunning(String),
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// A workflow tagged with the registration that put it in the engine.
struct Registered {
    generation: u64,
    workflow: Workflow,
}

/// Owns registered workflows and runs execution sweeps over them.
pub struct WorkflowEngine {
    workflows: DashMap<String, Registered>,
    next_generation: AtomicU64,
    registry: ExecutorRegistry,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    /// Cancellation tokens of in-flight sweeps, keyed by workflow ID.
    running: DashMap<String, CancellationToken>,
}

impl WorkflowEngine {
    /// Create an engine dispatching steps through `registry`.
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            workflows: DashMap::new(),
            next_generation: AtomicU64::new(0),
            registry,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            event_bus: EventBus::default(),
            running: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Register a workflow, replacing any workflow with the same ID.
    ///
    /// The dependency graph is not validated.
    pub fn add_workflow(&self, workflow: Workflow) {
        tracing::debug!(
            workflow_id = workflow.id.as_str(),
            steps = workflow.steps.len(),
            "registered workflow"
        );
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.workflows.insert(
            workflow.id.clone(),
            Registered {
                generation,
                workflow,
            },
        );
    }

    pub fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).map(|r| r.workflow.clone())
    }

    /// All registered workflows, oldest first.
    pub fn get_all_workflows(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.iter().map(|r| r.workflow.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    /// Execute a workflow to the end of its sweep.
    ///
    /// Fails only if the workflow is unknown or already running; individual
    /// step failures are recorded on the steps and downgrade the workflow's
    /// final status to `failed`.
    pub async fn execute_workflow(&self, id: &str) -> Result<ExecutionSummary, EngineError> {
        self.execute_workflow_with_cancel(id, CancellationToken::new())
            .await
    }

    /// Execute a workflow, stopping early once `cancel` fires.
    ///
    /// Cancellation is checked before each step and raced against the
    /// in-flight executor. An interrupted step is recorded as `failed` with
    /// error `"step cancelled"`; steps not yet reached stay `pending`.
    pub async fn execute_workflow_with_cancel(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> Result<ExecutionSummary, EngineError> {
        let (generation, mut workflow) = self
            .workflows
            .get(id)
            .map(|r| (r.generation, r.workflow.clone()))
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let _guard = self.register_run(id, cancel.clone())?;

        let sweep_start = tokio::time::Instant::now();

        for step in &mut workflow.steps {
            step.reset();
        }
        workflow.status = WorkflowStatus::Active;
        workflow.progress = workflow.compute_progress();
        self.store(generation, &workflow);

        self.event_bus.publish(FlowEvent::WorkflowStarted {
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            total_steps: workflow.steps.len(),
        });
        tracing::info!(
            workflow_id = workflow.id.as_str(),
            steps = workflow.steps.len(),
            scheduling = ?self.config.scheduling,
            "starting workflow sweep"
        );

        match self.config.scheduling {
            SchedulingMode::SinglePass => {
                self.single_pass(generation, &mut workflow, &cancel).await
            }
            SchedulingMode::ReadyQueue => {
                self.ready_queue(generation, &mut workflow, &cancel).await
            }
        }

        for step in workflow.steps.iter().filter(|s| s.status == StepStatus::Pending) {
            self.event_bus.publish(FlowEvent::StepSkipped {
                workflow_id: workflow.id.clone(),
                step_id: step.id.clone(),
            });
        }

        workflow.progress = workflow.compute_progress();
        workflow.status = if workflow.all_completed() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        self.store(generation, &workflow);

        let cancelled = cancel.is_cancelled() && workflow.status != WorkflowStatus::Completed;
        let duration_ms = sweep_start.elapsed().as_millis() as u64;
        let summary = ExecutionSummary::from_workflow(&workflow, cancelled, duration_ms);

        self.event_bus.publish(FlowEvent::WorkflowFinished {
            workflow_id: workflow.id.clone(),
            status: workflow.status,
            progress: workflow.progress,
            duration_ms,
            cancelled,
        });
        tracing::info!(
            workflow_id = workflow.id.as_str(),
            status = %workflow.status,
            progress = workflow.progress,
            completed = summary.completed_steps.len(),
            failed = summary.failed_steps.len(),
            pending = summary.pending_steps.len(),
            cancelled,
            "workflow sweep finished"
        );

        Ok(summary)
    }

    /// Cancel an in-flight sweep.
    pub fn cancel(&self, id: &str) -> Result<(), EngineError> {
        let token = self
            .running
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| EngineError::NotRunning(id.to_string()))?;
        token.cancel();
        tracing::info!(workflow_id = id, "workflow cancellation requested");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    async fn single_pass(
        &self,
        generation: u64,
        workflow: &mut Workflow,
        cancel: &CancellationToken,
    ) {
        for index in 0..workflow.steps.len() {
            if cancel.is_cancelled() {
                return;
            }
            if !workflow.dependencies_satisfied(index) {
                tracing::debug!(
                    workflow_id = workflow.id.as_str(),
                    step_id = workflow.steps[index].id.as_str(),
                    "dependencies not completed, leaving step pending"
                );
                continue;
            }
            self.run_step(generation, workflow, index, cancel).await;
        }
    }

    async fn ready_queue(
        &self,
        generation: u64,
        workflow: &mut Workflow,
        cancel: &CancellationToken,
    ) {
        let mut pass = 0usize;
        loop {
            pass += 1;
            let mut executed = 0usize;
            for index in 0..workflow.steps.len() {
                if workflow.steps[index].status != StepStatus::Pending {
                    continue;
                }
                if cancel.is_cancelled() {
                    return;
                }
                if workflow.dependencies_satisfied(index) {
                    self.run_step(generation, workflow, index, cancel).await;
                    executed += 1;
                }
            }
            tracing::debug!(
                workflow_id = workflow.id.as_str(),
                pass,
                executed,
                "ready-queue pass finished"
            );
            if executed == 0 {
                return;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Step execution
    // -----------------------------------------------------------------------

    async fn run_step(
        &self,
        generation: u64,
        workflow: &mut Workflow,
        index: usize,
        cancel: &CancellationToken,
    ) {
        let started_at = self.clock.now();
        workflow.steps[index].status = StepStatus::Running;
        workflow.steps[index].started_at = Some(started_at);
        self.store(generation, workflow);

        let step = workflow.steps[index].clone();
        self.event_bus.publish(FlowEvent::StepStarted {
            workflow_id: workflow.id.clone(),
            step_id: step.id.clone(),
            step_type: step.step_type.clone(),
        });

        let result = self.invoke(&step, cancel).await;

        let ended_at = self.clock.now();
        let duration_ms = (ended_at - started_at).num_milliseconds().max(0) as u64;
        let slot = &mut workflow.steps[index];
        slot.ended_at = Some(ended_at);
        slot.duration_ms = Some(duration_ms);

        match result {
            Ok(data) => {
                slot.status = StepStatus::Completed;
                slot.data = Some(data);
                tracing::debug!(
                    workflow_id = workflow.id.as_str(),
                    step_id = step.id.as_str(),
                    duration_ms,
                    "step completed"
                );
                self.event_bus.publish(FlowEvent::StepCompleted {
                    workflow_id: workflow.id.clone(),
                    step_id: step.id.clone(),
                    duration_ms,
                });
            }
            Err(err) => {
                let message = err.to_string();
                slot.status = StepStatus::Failed;
                slot.error = Some(message.clone());
                tracing::warn!(
                    workflow_id = workflow.id.as_str(),
                    step_id = step.id.as_str(),
                    error = message.as_str(),
                    "step failed"
                );
                self.event_bus.publish(FlowEvent::StepFailed {
                    workflow_id: workflow.id.clone(),
                    step_id: step.id.clone(),
                    error: message,
                });
            }
        }

        workflow.progress = workflow.compute_progress();
        self.store(generation, workflow);
    }

    async fn invoke(&self, step: &Step, cancel: &CancellationToken) -> Result<Value, StepError> {
        let Some(executor) = self.registry.get(&step.step_type) else {
            return Err(StepError::NoExecutor(step.step_type.clone()));
        };

        let execution = executor.execute_boxed(step);
        let bounded = async {
            match self.config.step_timeout {
                Some(limit) => tokio::time::timeout(limit, execution)
                    .await
                    .unwrap_or(Err(StepError::TimedOut(limit))),
                None => execution.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepError::Cancelled),
            result = bounded => result,
        }
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Publish the sweep's copy unless the workflow was re-registered since
    /// the sweep started.
    fn store(&self, generation: u64, workflow: &Workflow) {
        match self.workflows.get_mut(&workflow.id) {
            Some(mut entry) if entry.generation == generation => {
                entry.workflow = workflow.clone();
            }
            _ => tracing::debug!(
                workflow_id = workflow.id.as_str(),
                "workflow replaced during sweep, not writing back"
            ),
        }
    }

    fn register_run(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> Result<RunGuard<'_>, EngineError> {
        match self.running.entry(id.to_string()) {
            Entry::Occupied(_) => Err(EngineError::AlreadyRunning(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(cancel);
                Ok(RunGuard {
                    running: &self.running,
                    id: id.to_string(),
                })
            }
        }
    }
}

/// Removes the run's cancellation token when the sweep ends or is dropped.
struct RunGuard<'a> {
    running: &'a DashMap<String, CancellationToken>,
    id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
