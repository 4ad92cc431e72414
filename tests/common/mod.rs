#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

use fragment_ingest::error::{EmbeddingError, VectorStoreError};
use fragment_ingest::models::{
    CollectionInfo, CollectionSchema, Distance, FragmentId, Point, VectorDriver,
};
use fragment_ingest::services::{
    Embedder, InMemoryBackend, Pipeline, PipelineOptions, VectorStore,
};
use std::sync::Arc;

pub const DIM: usize = 8;
pub const COLLECTION: &str = "my_docs";

/// Deterministic embedder that fails on one chosen text.
#[derive(Default)]
pub struct FakeEmbedder {
    pub fail_on: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(text) {
            return Err(EmbeddingError::ServerError {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        let seed = text.bytes().map(u32::from).sum::<u32>() as f32;
        Ok((0..DIM).map(|i| seed + i as f32).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model(&self) -> &str {
        "fake-embedding"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Recreate(String),
    Upsert(Vec<FragmentId>),
}

/// In-memory store that records every mutating call in order.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryBackend,
    pub calls: Mutex<Vec<StoreCall>>,
    /// 1-based index of the upsert call that fails.
    pub fail_upsert: Option<usize>,
    upserts: AtomicUsize,
}

impl RecordingStore {
    pub fn failing_upsert(n: usize) -> Self {
        Self {
            fail_upsert: Some(n),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Upsert(ids) => Some(ids.len()),
                StoreCall::Recreate(_) => None,
            })
            .collect()
    }

    pub async fn stored(&self) -> Vec<Point> {
        self.inner.points(COLLECTION).await
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, VectorStoreError> {
        self.inner.collection_info(name).await
    }

    async fn recreate_collection(
        &self,
        schema: &CollectionSchema,
    ) -> Result<(), VectorStoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Recreate(schema.name.clone()));
        self.inner.recreate_collection(schema).await
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: &[Point],
    ) -> Result<(), VectorStoreError> {
        let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upsert == Some(n) {
            return Err(VectorStoreError::UpsertError(
                "service unavailable".to_string(),
            ));
        }
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Upsert(points.iter().map(|p| p.id.clone()).collect()));
        self.inner.upsert_points(collection, points).await
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }
}

pub fn schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION, DIM as u64, Distance::Cosine)
}

pub fn options(batch_size: usize) -> PipelineOptions {
    let mut options = PipelineOptions::new(schema());
    options.batch_size = batch_size;
    options
}

pub fn pipeline(
    embedder: Arc<FakeEmbedder>,
    store: Arc<RecordingStore>,
    batch_size: usize,
) -> Pipeline {
    Pipeline::new(embedder, store, options(batch_size))
}

pub fn fragment_line(i: usize) -> String {
    format!(r#"{{"id": {i}, "text": "fragment number {i}"}}"#)
}

/// Write `n` valid fragments with ids 1..=n to a temporary JSONL file.
pub fn fragments_file(n: usize) -> NamedTempFile {
    let lines: Vec<String> = (1..=n).map(fragment_line).collect();
    jsonl_file(&lines)
}

pub fn jsonl_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}
