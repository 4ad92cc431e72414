mod collection;
mod config;
mod fragment;
mod report;

pub use collection::{CollectionInfo, CollectionSchema, Distance};
pub use config::{
    Config, DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_INPUT, DEFAULT_QDRANT_URL,
    DuplicateIdPolicy, EmbeddingConfig, IngestConfig, OutputConfig, VectorDriver,
    VectorStoreConfig,
};
pub use fragment::{FragmentId, FragmentRecord, Point, PointPayload, SourcedFragment};
pub use report::{OutputFormat, RunReport, ValidationReport};
