//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cli::output::{FailureInfo, get_formatter};
use crate::error::{ConfigError, RunFailure};
use crate::models::{Config, DEFAULT_INPUT, DuplicateIdPolicy, OutputFormat};
use crate::services::{
    Embedder, OpenAiEmbedder, Pipeline, PipelineEvent, PipelineObserver, PipelineOptions,
    PipelineState, create_backend, validate_source,
};
use crate::sources::FragmentReader;

/// Arguments for the ingest command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// JSONL file with one `{"id", "text"}` object per line (use - for stdin)
    #[arg(default_value = DEFAULT_INPUT)]
    pub file: PathBuf,

    /// Target collection (overrides config)
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Points per upsert request (overrides config)
    #[arg(long, short = 'b')]
    pub batch_size: Option<u32>,

    /// Append to the existing collection instead of recreating it
    #[arg(long)]
    pub no_provision: bool,

    /// Abort when an id appears twice in the input
    #[arg(long)]
    pub reject_duplicate_ids: bool,

    /// Embedding requests in flight at once (overrides config)
    #[arg(long, short = 'j')]
    pub concurrency: Option<u32>,

    /// Only validate the input file without contacting any service
    #[arg(long)]
    pub validate_only: bool,
}

impl IngestArgs {
    fn is_stdin(&self) -> bool {
        self.file.as_os_str() == "-"
    }

    fn source_name(&self) -> String {
        if self.is_stdin() {
            "stdin".to_string()
        } else {
            self.file.display().to_string()
        }
    }

    /// Layer command-line overrides on top of the loaded configuration.
    fn apply(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(ref collection) = self.collection {
            config.vector_store.collection = collection.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.ingest.batch_size = batch_size;
        }
        if self.no_provision {
            config.ingest.provision = false;
        }
        if self.reject_duplicate_ids {
            config.ingest.duplicate_ids = DuplicateIdPolicy::Reject;
        }
        if let Some(concurrency) = self.concurrency {
            config.ingest.embed_concurrency = concurrency;
        }
        config.validate()?;
        Ok(config)
    }
}

struct ProgressObserver {
    bar: ProgressBar,
}

impl PipelineObserver for ProgressObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StateChanged(state) => self.bar.set_prefix(state.to_string()),
            PipelineEvent::Embedded(_) => self.bar.inc(1),
            PipelineEvent::Flushed { persisted, .. } => {
                self.bar.set_message(format!("{persisted} stored"));
            }
        }
    }
}

fn progress_bar(format: OutputFormat, verbose: bool) -> ProgressBar {
    if verbose || format != OutputFormat::Text || !console::Term::stderr().is_term() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {pos} embedded, {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("0 stored");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Handle the ingest command.
pub async fn handle_ingest(
    args: IngestArgs,
    config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = args.apply(config).context("invalid ingest options")?;
    let formatter = get_formatter(format);
    let source = args.source_name();

    if args.validate_only {
        let policy = config.ingest.duplicate_ids;
        let report = if args.is_stdin() {
            validate_source(FragmentReader::stdin(), &source, policy).await?
        } else {
            let reader = FragmentReader::open(&args.file).await?;
            validate_source(reader, &source, policy).await?
        };
        print!("{}", formatter.format_validation(&report));
        return Ok(());
    }

    // Open the input before touching the collection so a bad path never
    // costs the existing data.
    let file_reader = if args.is_stdin() {
        None
    } else {
        match FragmentReader::open(&args.file).await {
            Ok(reader) => Some(reader),
            Err(e) => {
                let failure = RunFailure {
                    error: e.into(),
                    persisted: 0,
                    failed_in: PipelineState::Idle,
                };
                eprint!("{}", formatter.format_failure(&FailureInfo::from(&failure)));
                return Err(failure.into());
            }
        }
    };

    let embedder: Arc<dyn Embedder> = Arc::new(
        OpenAiEmbedder::new(&config.embedding).context("failed to create embedding client")?,
    );
    let store = create_backend(&config.vector_store).context("failed to create vector store")?;
    let options = PipelineOptions::from_config(&config);

    info!(
        source = %source,
        collection = %options.schema.name,
        model = %config.embedding.model,
        batch_size = options.batch_size,
        provision = options.provision,
        "starting ingestion"
    );
    if verbose {
        eprintln!(
            "Ingesting {} into '{}' ({} driver, batches of {})",
            source,
            options.schema.name,
            store.driver(),
            options.batch_size
        );
    }

    let bar = progress_bar(format, verbose);
    let mut pipeline = Pipeline::new(embedder, store, options)
        .with_observer(Arc::new(ProgressObserver { bar: bar.clone() }));

    let result = match file_reader {
        Some(reader) => pipeline.run(reader).await,
        None => pipeline.run(FragmentReader::stdin()).await,
    };
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            print!("{}", formatter.format_run_report(&report));
            Ok(())
        }
        Err(failure) => {
            eprint!("{}", formatter.format_failure(&FailureInfo::from(&failure)));
            Err(failure.into())
        }
    }
}
