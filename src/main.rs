use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use fragment_ingest::cli::commands::{handle_config, handle_ingest, handle_status};
use fragment_ingest::cli::output::get_formatter;
use fragment_ingest::cli::{Cli, Commands};
use fragment_ingest::models::{Config, OutputFormat};
use fragment_ingest::RunFailure;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "fragment_ingest=debug"
    } else {
        "fragment_ingest=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format_override = cli.format;

    let result = tokio::select! {
        result = run_command(cli) => result,
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, stopping ingestion...");
            return ExitCode::from(130);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Run failures have already been reported by the command.
            if err.downcast_ref::<RunFailure>().is_none() {
                let formatter = get_formatter(format_override.unwrap_or_default());
                eprint!("{}", formatter.format_error(&format!("{err:#}")));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let Cli {
        format,
        verbose,
        config: config_path,
        command,
    } = cli;

    // Config commands must work even when the current config does not load.
    let command = match command {
        Commands::Config(cmd) => {
            return handle_config(cmd, config_path.as_deref(), format.unwrap_or_default()).await;
        }
        other => other,
    };

    let config = Config::load(config_path.as_deref())?;
    let format: OutputFormat = format.unwrap_or(config.output.format);

    match command {
        Commands::Ingest(args) => handle_ingest(args, config, format, verbose).await,
        Commands::Status => handle_status(&config, format, verbose).await,
        Commands::Config(_) => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
