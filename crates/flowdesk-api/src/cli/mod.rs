//! CLI command definitions for the `flowdesk` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (`flowdesk workflow run`, `flowdesk report list`).

pub mod report;
pub mod workflow;

use clap::{Parser, Subcommand};

/// Run automation workflows and track their reports.
#[derive(Parser)]
#[command(name = "flowdesk", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage and run workflows.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Generate reports and manage the report history.
    Report {
        #[command(subcommand)]
        action: report::ReportCommand,
    },
}

impl Cli {
    /// Default tracing directive for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,flowdesk=debug",
            _ => "trace",
        }
    }
}
