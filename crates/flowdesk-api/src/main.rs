//! Flowdesk CLI entry point.
//!
//! Binary name: `flowdesk`
//!
//! Parses CLI arguments, initializes tracing, the database and services, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    flowdesk_observe::tracing_setup::init_tracing(cli.log_filter(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Workflow { action } => {
            cli::workflow::handle_workflow_command(action, &state, cli.json).await
        }
        Commands::Report { action } => {
            cli::report::handle_report_command(action, &state, cli.json).await
        }
    };

    state.db_pool.close().await;
    flowdesk_observe::tracing_setup::shutdown_tracing();
    result
}
