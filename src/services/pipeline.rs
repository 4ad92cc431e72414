//! Ingestion pipeline orchestrator.
//!
//! A run moves through `Idle → Provisioning → Streaming → Draining → Done`.
//! Any error moves it to `Failed` and aborts the run: the source is dropped,
//! in-flight embedding requests are cancelled and no further store calls are
//! made. Batches flushed before the failure stay persisted.

use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tracing::{debug, error, info};

use crate::error::{FragmentRef, PipelineError, RunFailure, VectorStoreError};
use crate::models::{
    CollectionSchema, Config, DuplicateIdPolicy, FragmentId, Point, RunReport, ValidationReport,
};
use crate::services::{BatchUpserter, Embedder, VectorStore};
use crate::sources::FragmentReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Provisioning,
    Streaming,
    Draining,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Provisioning => "provisioning",
            PipelineState::Streaming => "streaming",
            PipelineState::Draining => "draining",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    Embedded(FragmentRef),
    Flushed { points: usize, persisted: u64 },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub schema: CollectionSchema,
    pub batch_size: usize,
    /// Drop and recreate the collection before streaming.
    pub provision: bool,
    pub duplicate_ids: DuplicateIdPolicy,
    /// Maximum embedding requests in flight. 1 keeps the run strictly sequential.
    pub embed_concurrency: usize,
}

impl PipelineOptions {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            batch_size: crate::models::DEFAULT_BATCH_SIZE as usize,
            provision: true,
            duplicate_ids: DuplicateIdPolicy::default(),
            embed_concurrency: 1,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            schema: config.collection_schema(),
            batch_size: config.ingest.batch_size as usize,
            provision: config.ingest.provision,
            duplicate_ids: config.ingest.duplicate_ids,
            embed_concurrency: config.ingest.embed_concurrency as usize,
        }
    }
}

pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    options: PipelineOptions,
    observer: Option<Arc<dyn PipelineObserver>>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
            observer: None,
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline over `reader` to completion or to the first error.
    pub async fn run<R>(&mut self, reader: FragmentReader<R>) -> Result<RunReport, RunFailure>
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        self.state = PipelineState::Idle;

        let mut upserter = BatchUpserter::new(
            self.store.clone(),
            &self.options.schema,
            self.options.batch_size,
        );
        let mut fragments_read = 0u64;

        match self
            .execute(reader, &mut upserter, &mut fragments_read)
            .await
        {
            Ok(()) => {
                self.transition(PipelineState::Done);
                let report = RunReport {
                    collection: self.options.schema.name.clone(),
                    fragments_read,
                    points_persisted: upserter.persisted(),
                    batches_flushed: upserter.flushes(),
                    provisioned: self.options.provision,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                info!(
                    collection = %report.collection,
                    points = report.points_persisted,
                    batches = report.batches_flushed,
                    duration_ms = report.duration_ms,
                    "ingestion complete"
                );
                Ok(report)
            }
            Err(err) => {
                let failed_in = self.state;
                self.transition(PipelineState::Failed);
                error!(
                    state = %failed_in,
                    kind = err.kind(),
                    persisted = upserter.persisted(),
                    error = %err,
                    "ingestion aborted"
                );
                Err(RunFailure {
                    error: err,
                    persisted: upserter.persisted(),
                    failed_in,
                })
            }
        }
    }

    async fn execute<R>(
        &mut self,
        reader: FragmentReader<R>,
        upserter: &mut BatchUpserter,
        fragments_read: &mut u64,
    ) -> Result<(), PipelineError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.transition(PipelineState::Provisioning);
        self.provision().await?;

        self.transition(PipelineState::Streaming);
        self.stream(reader, upserter, fragments_read).await?;

        self.transition(PipelineState::Draining);
        let flushed = upserter
            .flush()
            .await
            .map_err(|source| PipelineError::Upsert {
                fragment: None,
                source,
            })?;
        if flushed > 0 {
            self.notify(&PipelineEvent::Flushed {
                points: flushed,
                persisted: upserter.persisted(),
            });
        }
        Ok(())
    }

    async fn provision(&self) -> Result<(), PipelineError> {
        let schema = &self.options.schema;

        if self.embedder.dimension() as u64 != schema.dimension {
            return Err(PipelineError::Provisioning(VectorStoreError::InvalidSchema(
                format!(
                    "embedding model {} produces {} dimensions, collection is configured for {}",
                    self.embedder.model(),
                    self.embedder.dimension(),
                    schema.dimension
                ),
            )));
        }

        if self.options.provision {
            info!(
                collection = %schema.name,
                dimension = schema.dimension,
                distance = %schema.distance,
                "recreating collection"
            );
            return self
                .store
                .recreate_collection(schema)
                .await
                .map_err(PipelineError::Provisioning);
        }

        let info = self
            .store
            .collection_info(&schema.name)
            .await
            .map_err(PipelineError::Provisioning)?;
        match info {
            None => Err(PipelineError::Provisioning(VectorStoreError::CollectionError(
                format!(
                    "collection '{}' does not exist and provisioning is disabled",
                    schema.name
                ),
            ))),
            Some(info) if info.dimension.is_some_and(|d| d != schema.dimension) => {
                Err(PipelineError::Provisioning(VectorStoreError::InvalidSchema(
                    format!(
                        "collection '{}' has {} dimensions, expected {}",
                        schema.name,
                        info.dimension.unwrap_or_default(),
                        schema.dimension
                    ),
                )))
            }
            Some(info) => {
                info!(
                    collection = %schema.name,
                    points = info.points_count,
                    "appending to existing collection"
                );
                Ok(())
            }
        }
    }

    async fn stream<R>(
        &self,
        reader: FragmentReader<R>,
        upserter: &mut BatchUpserter,
        fragments_read: &mut u64,
    ) -> Result<(), PipelineError>
    where
        R: AsyncBufRead + Unpin,
    {
        let embedder = self.embedder.clone();
        let policy = self.options.duplicate_ids;
        let mut seen: HashMap<FragmentId, usize> = HashMap::new();

        let fragments = futures::stream::unfold(reader, |mut reader| async move {
            match reader.next_fragment().await {
                Ok(Some(fragment)) => Some((Ok(fragment), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        });

        // Duplicate detection happens before embedding so a rejected fragment
        // never costs a request. `buffered` yields results in input order.
        let points = fragments
            .map(move |item| {
                let checked = item.map_err(PipelineError::from).and_then(|fragment| {
                    if policy == DuplicateIdPolicy::Reject {
                        if let Some(&first_line) = seen.get(&fragment.record.id) {
                            return Err(PipelineError::DuplicateId {
                                fragment: FragmentRef {
                                    id: fragment.record.id,
                                    line: fragment.line,
                                },
                                first_line,
                            });
                        }
                        seen.insert(fragment.record.id.clone(), fragment.line);
                    }
                    Ok(fragment)
                });
                let embedder = embedder.clone();

                async move {
                    let fragment = checked?;
                    let fragment_ref = FragmentRef {
                        id: fragment.record.id.clone(),
                        line: fragment.line,
                    };
                    debug!(id = %fragment_ref.id, line = fragment_ref.line, "embedding fragment");
                    let vector = embedder
                        .embed(&fragment.record.text)
                        .await
                        .map_err(|source| PipelineError::Embedding {
                            fragment: fragment_ref.clone(),
                            source,
                        })?;
                    Ok::<_, PipelineError>((fragment_ref, Point::new(fragment.record, vector)))
                }
            })
            .buffered(self.options.embed_concurrency.max(1));
        futures::pin_mut!(points);

        while let Some(item) = points.next().await {
            let (fragment, point) = item?;
            *fragments_read += 1;
            self.notify(&PipelineEvent::Embedded(fragment.clone()));

            let flushed = upserter
                .add(point)
                .await
                .map_err(|source| PipelineError::Upsert {
                    fragment: Some(fragment),
                    source,
                })?;
            if flushed > 0 {
                self.notify(&PipelineEvent::Flushed {
                    points: flushed,
                    persisted: upserter.persisted(),
                });
            }
        }

        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state change");
        self.state = next;
        self.notify(&PipelineEvent::StateChanged(next));
    }

    fn notify(&self, event: &PipelineEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}

/// Read the whole source without contacting any service.
///
/// Fails on the first malformed line, and on a repeated id when `policy` is
/// [`DuplicateIdPolicy::Reject`]; otherwise repeated ids are only counted.
pub async fn validate_source<R>(
    mut reader: FragmentReader<R>,
    source: &str,
    policy: DuplicateIdPolicy,
) -> Result<ValidationReport, PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut seen: HashMap<FragmentId, usize> = HashMap::new();
    let mut report = ValidationReport {
        source: source.to_string(),
        ..Default::default()
    };

    while let Some(fragment) = reader.next_fragment().await? {
        report.fragments += 1;
        if let Some(&first_line) = seen.get(&fragment.record.id) {
            if policy == DuplicateIdPolicy::Reject {
                return Err(PipelineError::DuplicateId {
                    fragment: FragmentRef {
                        id: fragment.record.id,
                        line: fragment.line,
                    },
                    first_line,
                });
            }
            report.duplicate_ids += 1;
        } else {
            seen.insert(fragment.record.id, fragment.line);
        }
    }

    debug!(
        source,
        lines = reader.lines_read(),
        fragments = report.fragments,
        "source validated"
    );
    Ok(report)
}
