//! Workflow CLI subcommands: import, list, show, delete, run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use flowdesk_core::workflow::engine::ExecutionSummary;
use flowdesk_infra::filesystem::read_workflow_file;
use flowdesk_types::config::SchedulingMode;
use flowdesk_types::event::FlowEvent;
use flowdesk_types::workflow::{Step, StepStatus, Workflow, WorkflowStatus};

use crate::state::AppState;

/// Workflow subcommands.
#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Import a workflow definition from a JSON file (replaces one with the same id).
    Import {
        /// Path to the workflow JSON file.
        file: PathBuf,
    },

    /// List saved workflows.
    #[command(alias = "ls")]
    List,

    /// Show a workflow and the state of its steps.
    Show {
        /// Workflow id.
        id: String,
    },

    /// Delete a saved workflow.
    #[command(alias = "rm")]
    Delete {
        /// Workflow id.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Execute a workflow with the simulated integrations. Ctrl+C cancels.
    Run {
        /// Workflow id.
        id: String,

        /// Keep sweeping until no more steps become ready (ignores step order).
        #[arg(long)]
        ready_queue: bool,
    },
}

/// Handle a workflow subcommand.
pub async fn handle_workflow_command(cmd: WorkflowCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        WorkflowCommand::Import { file } => handle_import(&file, state, json).await,
        WorkflowCommand::List => handle_list(state, json).await,
        WorkflowCommand::Show { id } => handle_show(&id, state, json).await,
        WorkflowCommand::Delete { id, force } => handle_delete(&id, force, state, json).await,
        WorkflowCommand::Run { id, ready_queue } => handle_run(&id, ready_queue, state, json).await,
    }
}

// ---------------------------------------------------------------------------
// Import / list / show / delete
// ---------------------------------------------------------------------------

async fn handle_import(file: &Path, state: &AppState, json: bool) -> Result<()> {
    let workflow = read_workflow_file(file).await?;
    state
        .workflows
        .save(&workflow)
        .await
        .context("Failed to save workflow")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
    } else {
        println!();
        println!(
            "  {} Imported '{}' ({} steps) as {}",
            style("✓").green().bold(),
            style(&workflow.name).cyan(),
            workflow.steps.len(),
            style(&workflow.id).bold(),
        );
        println!(
            "  Run it with: {}",
            style(format!("flowdesk workflow run {}", workflow.id)).dim()
        );
        println!();
    }
    Ok(())
}

async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let workflows = state.workflows.list().await?;

    if json {
        let out: Vec<_> = workflows
            .iter()
            .map(|w| {
                serde_json::json!({
                    "id": w.id,
                    "name": w.name,
                    "status": w.status,
                    "progress": w.progress,
                    "steps": w.steps.len(),
                    "tags": w.tags,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows saved.");
        println!(
            "  Import one with: {}",
            style("flowdesk workflow import <file.json>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Status"),
            Cell::new("Progress"),
            Cell::new("Steps"),
            Cell::new("Tags"),
        ]);

    for w in &workflows {
        table.add_row(vec![
            Cell::new(&w.id),
            Cell::new(&w.name),
            workflow_status_cell(w.status),
            Cell::new(format!("{:.0}%", w.progress)),
            Cell::new(w.steps.len()),
            Cell::new(w.tags.join(", ")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn handle_show(id: &str, state: &AppState, json: bool) -> Result<()> {
    let workflow = load_workflow(id, state).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&workflow.name).cyan().bold(),
        style(format!("({})", workflow.id)).dim()
    );
    if let Some(description) = &workflow.description {
        println!("  {description}");
    }
    println!(
        "  Status: {}  Progress: {:.0}%",
        workflow.status, workflow.progress
    );
    if let Some(estimate) = &workflow.estimated_duration {
        println!("  Estimated duration: {estimate}");
    }
    println!();
    println!("{}", steps_table(&workflow.steps));
    println!();
    Ok(())
}

async fn handle_delete(id: &str, force: bool, state: &AppState, json: bool) -> Result<()> {
    let workflow = load_workflow(id, state).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete workflow '{}'?",
                style(&workflow.name).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let deleted = state.workflows.delete(id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": deleted, "id": id}));
    } else {
        println!("  {} Workflow '{}' deleted.", style("✓").red().bold(), workflow.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

async fn handle_run(id: &str, ready_queue: bool, state: &AppState, json: bool) -> Result<()> {
    let workflow = load_workflow(id, state).await?;
    let total_steps = workflow.steps.len() as u64;

    let engine = state.build_engine(ready_queue.then_some(SchedulingMode::ReadyQueue));
    engine.add_workflow(workflow);

    let bar = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total_steps);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let mut events = engine.event_bus().subscribe();
    let printer = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    FlowEvent::StepStarted { step_id, step_type, .. } => {
                        bar.set_message(format!("{step_id} ({step_type})"));
                    }
                    FlowEvent::StepCompleted { step_id, duration_ms, .. } => {
                        bar.println(format!(
                            "  {} {step_id} {}",
                            style("✓").green(),
                            style(format!("{duration_ms}ms")).dim()
                        ));
                        bar.inc(1);
                    }
                    FlowEvent::StepFailed { step_id, error, .. } => {
                        bar.println(format!("  {} {step_id}: {error}", style("✗").red()));
                        bar.inc(1);
                    }
                    FlowEvent::WorkflowFinished { .. } => break,
                    _ => {}
                }
            }
            bar.finish_and_clear();
        })
    };

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let summary = engine.execute_workflow_with_cancel(id, cancel).await;
    ctrl_c.abort();
    if summary.is_ok() {
        let _ = printer.await;
    } else {
        printer.abort();
        bar.finish_and_clear();
    }
    let summary = summary?;

    if let Some(executed) = engine.get_workflow(id) {
        state
            .workflows
            .save(&executed)
            .await
            .context("Failed to save workflow results")?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ExecutionSummary) {
    println!();
    let headline = match summary.status {
        WorkflowStatus::Completed => style("Workflow completed").green().bold(),
        _ if summary.cancelled => style("Workflow cancelled").yellow().bold(),
        _ => style("Workflow failed").red().bold(),
    };
    println!(
        "  {headline}  {:.0}% in {:.1}s",
        summary.progress,
        summary.duration_ms as f64 / 1000.0
    );
    println!(
        "  {} completed, {} failed, {} pending",
        summary.completed_steps.len(),
        summary.failed_steps.len(),
        summary.pending_steps.len()
    );
    if !summary.pending_steps.is_empty() && !summary.cancelled {
        println!(
            "  {}",
            style("Pending steps never had their dependencies met; try --ready-queue.").dim()
        );
    }
    println!();
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_workflow(id: &str, state: &AppState) -> Result<Workflow> {
    state
        .workflows
        .get(id)
        .await?
        .with_context(|| format!("Workflow '{id}' not found"))
}

fn steps_table(steps: &[Step]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Depends on"),
            Cell::new("Duration"),
            Cell::new("Error"),
        ]);

    for step in steps {
        table.add_row(vec![
            Cell::new(&step.name),
            Cell::new(&step.step_type),
            step_status_cell(step.status),
            Cell::new(step.dependencies.join(", ")),
            Cell::new(
                step.duration_ms
                    .map(|ms| format!("{ms}ms"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(step.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}

fn workflow_status_cell(status: WorkflowStatus) -> Cell {
    match status {
        WorkflowStatus::Draft => Cell::new("draft").fg(Color::DarkGrey),
        WorkflowStatus::Active => Cell::new("active").fg(Color::Blue),
        WorkflowStatus::Completed => Cell::new("completed").fg(Color::Green),
        WorkflowStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}

fn step_status_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        StepStatus::Running => Cell::new("running").fg(Color::Blue),
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}
