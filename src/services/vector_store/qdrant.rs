//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance as QdrantDistance, PointId, PointStruct,
    UpsertPointsBuilder, Value, VectorParamsBuilder, vectors_config,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{VectorStore, validate_schema};
use crate::error::VectorStoreError;
use crate::models::{
    CollectionInfo, CollectionSchema, Distance, FragmentId, Point, VectorDriver,
    VectorStoreConfig,
};
use crate::utils::retry::{RetryConfig, with_retry};

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    retry: RetryConfig,
}

impl QdrantBackend {
    /// Create a new Qdrant backend from configuration.
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryConfig::new(config.max_retries.saturating_add(1)),
        })
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        with_retry(&self.retry, "collection_exists", || async {
            self.client
                .collection_exists(name)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))
        })
        .await
    }
}

fn qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
        Distance::Manhattan => QdrantDistance::Manhattan,
    }
}

/// Qdrant only accepts unsigned integers and UUIDs as point ids. Other string
/// ids are mapped to a UUIDv5 and kept in the payload as `fragment_id`.
fn to_point_struct(point: &Point) -> PointStruct {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("text".to_string(), point.payload.text.clone().into());

    let id: PointId = match &point.id {
        FragmentId::Num(n) => (*n).into(),
        FragmentId::Text(s) => match point.id.mapped_uuid() {
            Some(uuid) => {
                payload.insert("fragment_id".to_string(), s.clone().into());
                uuid.to_string().into()
            }
            None => s.clone().into(),
        },
    };

    PointStruct::new(id, point.vector.clone(), payload)
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, VectorStoreError> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }

        let info = with_retry(&self.retry, "collection_info", || async {
            self.client
                .collection_info(name)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))
        })
        .await?;

        let Some(result) = info.result else {
            return Ok(Some(CollectionInfo::default()));
        };

        let dimension = result
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|c| match c {
                vectors_config::Config::Params(params) => Some(params.size),
                vectors_config::Config::ParamsMap(_) => None,
            });

        Ok(Some(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            dimension,
        }))
    }

    async fn recreate_collection(
        &self,
        schema: &CollectionSchema,
    ) -> Result<(), VectorStoreError> {
        validate_schema(schema)?;

        if self.collection_exists(&schema.name).await? {
            info!(collection = %schema.name, "dropping existing collection");
            with_retry(&self.retry, "delete_collection", || async {
                self.client
                    .delete_collection(&schema.name)
                    .await
                    .map_err(|e| VectorStoreError::CollectionError(e.to_string()))
            })
            .await?;
        }

        with_retry(&self.retry, "create_collection", || async {
            let create = CreateCollectionBuilder::new(schema.name.as_str()).vectors_config(
                VectorParamsBuilder::new(schema.dimension, qdrant_distance(schema.distance)),
            );
            self.client
                .create_collection(create)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))
        })
        .await?;

        info!(
            collection = %schema.name,
            dimension = schema.dimension,
            distance = %schema.distance,
            "collection created"
        );
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: &[Point],
    ) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let structs: Vec<PointStruct> = points.iter().map(to_point_struct).collect();

        with_retry(&self.retry, "upsert_points", || async {
            let upsert = UpsertPointsBuilder::new(collection, structs.clone()).wait(true);
            self.client
                .upsert_points(upsert)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))
        })
        .await?;

        debug!(collection, points = points.len(), "upserted points");
        Ok(())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }
}
