//! Report CLI subcommands: generate, list, show, pdf, delete, clear, info.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flowdesk_core::report::generation::GenerationRequest;
use flowdesk_types::event::FlowEvent;
use flowdesk_types::report::{ReportJob, ReportStatus};

use crate::state::AppState;

/// Report subcommands.
#[derive(Subcommand)]
pub enum ReportCommand {
    /// Generate a report for a workflow (saved workflow id or free-form name).
    Generate {
        /// Workflow id or name.
        workflow: String,
    },

    /// List report jobs, most recent first.
    #[command(alias = "ls")]
    List {
        /// Only show reports for this workflow name.
        #[arg(long)]
        workflow: Option<String>,

        /// Maximum number of jobs to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show a report job and its payload.
    Show {
        /// Report job id.
        id: Uuid,
    },

    /// Record that a PDF was produced from a generated report.
    Pdf {
        /// Report job id.
        id: Uuid,

        /// Where the PDF was written.
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete one report job.
    #[command(alias = "rm")]
    Delete {
        /// Report job id.
        id: Uuid,
    },

    /// Delete the whole report history.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Show report history storage usage.
    Info,
}

/// Handle a report subcommand.
pub async fn handle_report_command(cmd: ReportCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ReportCommand::Generate { workflow } => handle_generate(&workflow, state, json).await,
        ReportCommand::List { workflow, limit } => {
            handle_list(workflow.as_deref(), limit, state, json).await
        }
        ReportCommand::Show { id } => handle_show(id, state, json).await,
        ReportCommand::Pdf { id, url } => handle_pdf(id, url, state, json).await,
        ReportCommand::Delete { id } => handle_delete(id, state, json).await,
        ReportCommand::Clear { force } => handle_clear(force, state, json).await,
        ReportCommand::Info => handle_info(state, json).await,
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

async fn handle_generate(workflow: &str, state: &AppState, json: bool) -> Result<()> {
    // Prefer a saved workflow so the report can describe its last run.
    let saved = state.workflows.get(workflow).await?;
    let request = match saved {
        Some(wf) => GenerationRequest {
            workflow_name: wf.name.clone(),
            input: serde_json::to_value(&wf)?,
        },
        None => GenerationRequest {
            workflow_name: workflow.to_string(),
            input: serde_json::Value::Null,
        },
    };

    let bar = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let mut events = state.event_bus.subscribe();
    let watcher = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let FlowEvent::ReportUpdated {
                    status,
                    progress,
                    phase,
                    ..
                } = event
                {
                    bar.set_position(u64::from(progress));
                    bar.set_message(phase);
                    if status != ReportStatus::Pending && status != ReportStatus::Generating {
                        break;
                    }
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

    let job = state.report_generator().generate(&request, &cancel).await;
    ctrl_c.abort();
    if job.is_ok() {
        let _ = watcher.await;
    } else {
        watcher.abort();
        bar.finish_and_clear();
    }
    let job = job.context("Report generation could not be recorded")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!();
    match job.status {
        ReportStatus::Generated => {
            println!(
                "  {} Report for '{}' generated ({})",
                style("✓").green().bold(),
                style(&job.workflow_name).cyan(),
                style(job.id).dim()
            );
            println!(
                "  View it with: {}",
                style(format!("flowdesk report show {}", job.id)).dim()
            );
        }
        _ => {
            println!(
                "  {} Report for '{}' failed: {}",
                style("✗").red().bold(),
                style(&job.workflow_name).cyan(),
                job.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

async fn handle_list(
    workflow: Option<&str>,
    limit: usize,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let mut jobs = match workflow {
        Some(name) => state.reports.get_reports_by_workflow(name).await?,
        None => state.reports.get_recent_reports(limit).await?,
    };
    jobs.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!();
        println!("  No reports yet.");
        println!(
            "  Generate one with: {}",
            style("flowdesk report generate <workflow>").dim()
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
            Cell::new("Workflow"),
            Cell::new("Status"),
            Cell::new("Progress"),
            Cell::new("Phase"),
            Cell::new("Created"),
        ]);

    for job in &jobs {
        table.add_row(vec![
            Cell::new(job.id),
            Cell::new(&job.workflow_name),
            status_cell(job.status),
            Cell::new(format!("{}%", job.progress)),
            Cell::new(&job.phase),
            Cell::new(job.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn handle_show(id: Uuid, state: &AppState, json: bool) -> Result<()> {
    let job = load_job(id, state).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&job.workflow_name).cyan().bold(),
        style(format!("({})", job.id)).dim()
    );
    println!(
        "  Status: {}  Progress: {}%  Phase: {}",
        job.status, job.progress, job.phase
    );
    println!(
        "  Created: {}  Updated: {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S"),
        job.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(url) = &job.pdf_url {
        println!("  PDF: {url}");
    }
    if let Some(error) = &job.error {
        println!("  {} {error}", style("Error:").red());
    }
    if let Some(report) = &job.report {
        println!();
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    println!();
    Ok(())
}

async fn handle_info(state: &AppState, json: bool) -> Result<()> {
    let info = state.reports.get_storage_info().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("Report history").bold());
    println!("  Reports:  {} / {}", info.item_count, info.max_items);
    println!("  Size:     {} bytes", info.size_bytes);
    println!("  Data dir: {}", state.data_dir.display());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

async fn handle_pdf(id: Uuid, url: Option<String>, state: &AppState, json: bool) -> Result<()> {
    let job = state
        .reports
        .update_report_status(id, ReportStatus::PdfCreated, url)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!(
            "  {} Report {} marked as PDF created.",
            style("✓").green().bold(),
            style(job.id).dim()
        );
    }
    Ok(())
}

async fn handle_delete(id: Uuid, state: &AppState, json: bool) -> Result<()> {
    let deleted = state.reports.delete_report(id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": deleted, "id": id}));
    } else if deleted {
        println!("  {} Report {id} deleted.", style("✓").red().bold());
    } else {
        println!("  Report {id} not found.");
    }
    Ok(())
}

async fn handle_clear(force: bool, state: &AppState, json: bool) -> Result<()> {
    if !force && !json {
        let count = state.reports.get_storage_info().await?.item_count;
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all {} report(s)?",
                style(count).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.reports.clear_history().await?;

    if json {
        println!("{}", serde_json::json!({"cleared": true}));
    } else {
        println!("  {} Report history cleared.", style("✓").red().bold());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_job(id: Uuid, state: &AppState) -> Result<ReportJob> {
    state
        .reports
        .get_report(id)
        .await?
        .with_context(|| format!("Report '{id}' not found"))
}

fn status_cell(status: ReportStatus) -> Cell {
    match status {
        ReportStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        ReportStatus::Generating => Cell::new("generating").fg(Color::Blue),
        ReportStatus::Generated => Cell::new("generated").fg(Color::Green),
        ReportStatus::PdfCreated => Cell::new("pdf_created").fg(Color::Cyan),
        ReportStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}
