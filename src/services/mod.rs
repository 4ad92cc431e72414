mod batch;
mod embedding;
mod pipeline;
mod vector_store;

pub use batch::BatchUpserter;
pub use embedding::{Embedder, OpenAiEmbedder};
pub use pipeline::{
    Pipeline, PipelineEvent, PipelineObserver, PipelineOptions, PipelineState, validate_source,
};
pub use vector_store::{InMemoryBackend, QdrantBackend, VectorStore, create_backend};
