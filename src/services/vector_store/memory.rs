//! In-memory vector store backend.
//!
//! Holds collections in a `HashMap` behind a `tokio::sync::RwLock`. It enforces
//! the same collection and dimension rules as Qdrant, which makes it useful for
//! dry runs against the real embedding service and for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{VectorStore, validate_schema};
use crate::error::VectorStoreError;
use crate::models::{CollectionInfo, CollectionSchema, FragmentId, Point, VectorDriver};

#[derive(Debug)]
struct MemoryCollection {
    schema: CollectionSchema,
    points: HashMap<FragmentId, Point>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the points stored in `collection`, sorted by id.
    pub async fn points(&self, collection: &str) -> Vec<Point> {
        let collections = self.collections.read().await;
        let mut points: Vec<Point> = collections
            .get(collection)
            .map(|c| c.points.values().cloned().collect())
            .unwrap_or_default();
        points.sort_by_key(|p| p.id.to_string());
        points
    }

    pub async fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.schema.clone())
    }
}

#[async_trait]
impl VectorStore for InMemoryBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| CollectionInfo {
            points_count: c.points.len() as u64,
            dimension: Some(c.schema.dimension),
        }))
    }

    async fn recreate_collection(
        &self,
        schema: &CollectionSchema,
    ) -> Result<(), VectorStoreError> {
        validate_schema(schema)?;
        let mut collections = self.collections.write().await;
        collections.insert(
            schema.name.clone(),
            MemoryCollection {
                schema: schema.clone(),
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: &[Point],
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).ok_or_else(|| {
            VectorStoreError::CollectionError(format!("collection '{collection}' does not exist"))
        })?;

        // Validate the whole request first so a bad point leaves the collection untouched.
        let expected = target.schema.dimension;
        if let Some(bad) = points.iter().find(|p| p.vector.len() as u64 != expected) {
            return Err(VectorStoreError::UpsertError(format!(
                "point {} has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                expected
            )));
        }

        for point in points {
            target.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Distance, FragmentRecord};

    fn point(id: u64, dim: usize) -> Point {
        Point::new(
            FragmentRecord {
                id: FragmentId::Num(id),
                text: format!("fragment {id}"),
            },
            vec![0.5; dim],
        )
    }

    #[tokio::test]
    async fn test_recreate_discards_existing_points() {
        let store = InMemoryBackend::new();
        let schema = CollectionSchema::new("docs", 3, Distance::Cosine);
        store.recreate_collection(&schema).await.unwrap();
        store
            .upsert_points("docs", &[point(1, 3), point(2, 3)])
            .await
            .unwrap();
        assert_eq!(
            store.collection_info("docs").await.unwrap().unwrap().points_count,
            2
        );

        store.recreate_collection(&schema).await.unwrap();
        assert_eq!(
            store.collection_info("docs").await.unwrap().unwrap().points_count,
            0
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryBackend::new();
        store
            .recreate_collection(&CollectionSchema::new("docs", 2, Distance::Dot))
            .await
            .unwrap();
        store.upsert_points("docs", &[point(1, 2)]).await.unwrap();

        let mut replacement = point(1, 2);
        replacement.payload.text = "updated".to_string();
        store.upsert_points("docs", &[replacement]).await.unwrap();

        let points = store.points("docs").await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload.text, "updated");
    }

    #[tokio::test]
    async fn test_upsert_into_missing_collection_fails() {
        let store = InMemoryBackend::new();
        let result = store.upsert_points("nope", &[point(1, 2)]).await;
        assert!(matches!(result, Err(VectorStoreError::CollectionError(_))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejects_whole_request() {
        let store = InMemoryBackend::new();
        store
            .recreate_collection(&CollectionSchema::new("docs", 3, Distance::Cosine))
            .await
            .unwrap();
        let result = store
            .upsert_points("docs", &[point(1, 3), point(2, 4)])
            .await;
        assert!(matches!(result, Err(VectorStoreError::UpsertError(_))));
        assert!(store.points("docs").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_info_is_none() {
        let store = InMemoryBackend::new();
        assert!(store.collection_info("docs").await.unwrap().is_none());
        assert!(store.schema("docs").await.is_none());
    }
}
