//! Trail CLI - Main entry point

use clap::Parser;
use std::process;
use tracing::error;
use trail_cli::commands::{self, history::HistoryArgs};
use trail_cli::{Cli, Commands};
use trail_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    // Load .env first so clap sees TRAIL_* variables
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Verbose mode logs debug to the console, otherwise only warnings
    let base = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("trail-cli")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env_over(base.clone()).unwrap_or(base);

    // CLI should work without logging
    let _guard = init_logging(&log_config).ok().flatten();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let reader = commands::open_reader(cli)?;

    match &cli.command {
        Commands::Entities => commands::entities::run(&reader),

        Commands::History {
            entity,
            filters,
            page,
            page_size,
            transaction,
            associations,
            non_strict,
        } => {
            let args = HistoryArgs {
                filters: filters.clone(),
                page: *page,
                page_size: *page_size,
                transaction: transaction.clone(),
                associations: *associations,
                non_strict: *non_strict,
            };
            commands::history::run(reader, entity, &args).await
        }

        Commands::Page {
            entity,
            filters,
            page,
            page_size,
        } => commands::page::run(reader, entity, filters, *page, *page_size).await,

        Commands::Count { entity, filters } => commands::count::run(reader, entity, filters).await,

        Commands::Record { entity, id } => commands::record::run(&reader, entity, *id).await,

        Commands::Transaction { hash, types } => {
            commands::transaction::run(reader, hash, types).await
        }
    }
}
