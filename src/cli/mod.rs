//! CLI module for the fragment ingestion tool.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::OutputFormat;

/// Embed JSONL text fragments and load them into a vector collection.
#[derive(Debug, Parser)]
#[command(name = "fragment-ingest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        env = "FRAGMENT_INGEST_CONFIG",
        help = "Path to a config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed fragments from a JSONL file and upsert them into the collection
    Ingest(commands::IngestArgs),

    /// Check the embedding service settings and the vector store
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ingest_defaults() {
        let cli = Cli::try_parse_from(["fragment-ingest", "ingest"]).unwrap();
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.file, PathBuf::from(crate::models::DEFAULT_INPUT));
                assert!(!args.no_provision);
                assert!(!args.validate_only);
                assert_eq!(args.batch_size, None);
            }
            other => panic!("expected ingest, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fragment-ingest",
            "ingest",
            "-",
            "--format",
            "json",
            "-v",
            "--batch-size",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.verbose);
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.file, PathBuf::from("-"));
                assert_eq!(args.batch_size, Some(10));
            }
            other => panic!("expected ingest, got {other:?}"),
        }
    }
}
