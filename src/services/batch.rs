use std::sync::Arc;
use tracing::debug;

use crate::error::VectorStoreError;
use crate::models::{CollectionSchema, Point};
use crate::services::VectorStore;

/// Accumulates points and writes them to the store in fixed-size batches.
///
/// Points are sent in the order they were added. A batch is only cleared once
/// the store has confirmed it, and only then counted as persisted.
pub struct BatchUpserter {
    store: Arc<dyn VectorStore>,
    collection: String,
    dimension: u64,
    threshold: usize,
    batch: Vec<Point>,
    persisted: u64,
    flushes: u64,
}

impl BatchUpserter {
    /// A threshold of zero is treated as one.
    pub fn new(store: Arc<dyn VectorStore>, schema: &CollectionSchema, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            store,
            collection: schema.name.clone(),
            dimension: schema.dimension,
            threshold,
            batch: Vec::with_capacity(threshold),
            persisted: 0,
            flushes: 0,
        }
    }

    /// Append a point, flushing once the batch reaches the threshold.
    ///
    /// Returns the number of points flushed by this call (0 if none).
    pub async fn add(&mut self, point: Point) -> Result<usize, VectorStoreError> {
        self.batch.push(point);
        if self.batch.len() >= self.threshold {
            return self.flush().await;
        }
        Ok(0)
    }

    /// Send the pending batch as one upsert. No-op when empty.
    pub async fn flush(&mut self) -> Result<usize, VectorStoreError> {
        if self.batch.is_empty() {
            return Ok(0);
        }

        if let Some(bad) = self
            .batch
            .iter()
            .find(|p| p.vector.len() as u64 != self.dimension)
        {
            return Err(VectorStoreError::DimensionMismatch {
                id: bad.id.clone(),
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        self.store
            .upsert_points(&self.collection, &self.batch)
            .await?;

        let sent = self.batch.len();
        self.batch.clear();
        self.persisted += sent as u64;
        self.flushes += 1;
        debug!(
            collection = %self.collection,
            batch = sent,
            persisted = self.persisted,
            "flushed batch"
        );
        Ok(sent)
    }

    /// Points confirmed by the store so far.
    pub fn persisted(&self) -> u64 {
        self.persisted
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Points waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionInfo, Distance, FragmentId, FragmentRecord, VectorDriver};
    use crate::services::InMemoryBackend;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Wraps the in-memory backend and records every upsert call.
    #[derive(Default)]
    struct Recording {
        inner: InMemoryBackend,
        calls: Mutex<Vec<Vec<FragmentId>>>,
        fail: bool,
    }

    #[async_trait]
    impl VectorStore for Recording {
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
            self.inner.recreate_collection(schema).await
        }

        async fn upsert_points(
            &self,
            collection: &str,
            points: &[Point],
        ) -> Result<(), VectorStoreError> {
            if self.fail {
                return Err(VectorStoreError::UpsertError("store unavailable".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(points.iter().map(|p| p.id.clone()).collect());
            self.inner.upsert_points(collection, points).await
        }

        fn driver(&self) -> VectorDriver {
            VectorDriver::Memory
        }
    }

    fn point(id: u64) -> Point {
        Point::new(
            FragmentRecord {
                id: FragmentId::Num(id),
                text: format!("t{id}"),
            },
            vec![1.0, 0.0],
        )
    }

    async fn setup(fail: bool) -> (Arc<Recording>, CollectionSchema) {
        let store = Arc::new(Recording {
            fail,
            ..Default::default()
        });
        let schema = CollectionSchema::new("docs", 2, Distance::Cosine);
        store.recreate_collection(&schema).await.unwrap();
        (store, schema)
    }

    #[tokio::test]
    async fn test_add_flushes_at_threshold() {
        let (store, schema) = setup(false).await;
        let mut upserter = BatchUpserter::new(store.clone(), &schema, 3);

        assert_eq!(upserter.add(point(1)).await.unwrap(), 0);
        assert_eq!(upserter.add(point(2)).await.unwrap(), 0);
        assert_eq!(upserter.add(point(3)).await.unwrap(), 3);
        assert_eq!(upserter.pending(), 0);
        assert_eq!(upserter.persisted(), 3);

        upserter.add(point(4)).await.unwrap();
        assert_eq!(upserter.flush().await.unwrap(), 1);
        assert_eq!(upserter.flushes(), 2);

        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                vec![FragmentId::Num(1), FragmentId::Num(2), FragmentId::Num(3)],
                vec![FragmentId::Num(4)],
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_on_empty_batch_is_noop() {
        let (store, schema) = setup(false).await;
        let mut upserter = BatchUpserter::new(store.clone(), &schema, 2);

        assert_eq!(upserter.flush().await.unwrap(), 0);
        assert_eq!(upserter.flushes(), 0);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_batch_and_totals() {
        let (store, schema) = setup(true).await;
        let mut upserter = BatchUpserter::new(store, &schema, 2);

        upserter.add(point(1)).await.unwrap();
        let result = upserter.add(point(2)).await;
        assert!(matches!(result, Err(VectorStoreError::UpsertError(_))));
        assert_eq!(upserter.persisted(), 0);
        assert_eq!(upserter.pending(), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_before_request() {
        let (store, schema) = setup(false).await;
        let mut upserter = BatchUpserter::new(store.clone(), &schema, 5);

        let mut bad = point(9);
        bad.vector.push(0.0);
        upserter.add(bad).await.unwrap();

        match upserter.flush().await {
            Err(VectorStoreError::DimensionMismatch {
                id,
                expected,
                actual,
            }) => {
                assert_eq!(id, FragmentId::Num(9));
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryBackend::new());
        let schema = CollectionSchema::new("docs", 2, Distance::Cosine);
        assert_eq!(BatchUpserter::new(store, &schema, 0).threshold(), 1);
    }
}
