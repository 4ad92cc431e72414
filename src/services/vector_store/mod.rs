//! Vector store abstraction layer.
//!
//! The pipeline talks to a [`VectorStore`] trait object so the Qdrant backend
//! and the in-memory backend are interchangeable through configuration.

mod memory;
mod qdrant;

pub use memory::InMemoryBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::VectorStoreError;
use crate::models::{CollectionInfo, CollectionSchema, Point, VectorDriver, VectorStoreConfig};

/// Operations the ingestion pipeline needs from a vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Information about a collection, or `None` if it does not exist.
    async fn collection_info(&self, name: &str)
    -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Drop the collection named by `schema` if present and create it anew.
    /// Every point previously stored in it is lost.
    async fn recreate_collection(&self, schema: &CollectionSchema)
    -> Result<(), VectorStoreError>;

    /// Insert or replace points by id, as a single request.
    async fn upsert_points(&self, collection: &str, points: &[Point])
    -> Result<(), VectorStoreError>;

    fn driver(&self) -> VectorDriver;
}

/// Create a vector store backend based on configuration.
pub fn create_backend(
    config: &VectorStoreConfig,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => Ok(Arc::new(QdrantBackend::new(config)?)),
        VectorDriver::Memory => Ok(Arc::new(InMemoryBackend::new())),
    }
}

pub(crate) fn validate_schema(schema: &CollectionSchema) -> Result<(), VectorStoreError> {
    if schema.name.trim().is_empty() {
        return Err(VectorStoreError::InvalidSchema(
            "collection name must not be empty".to_string(),
        ));
    }
    if schema.dimension == 0 {
        return Err(VectorStoreError::InvalidSchema(
            "vector dimension must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
