use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::collection::{CollectionSchema, Distance};
use super::report::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "my_docs";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_INPUT: &str = "fragments.jsonl";
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fragment-ingest").join("config.toml"))
    }

    /// Load configuration from `path` (or the default location), then apply
    /// environment overrides and validate.
    ///
    /// An explicitly given path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override fields from environment variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(model) = non_empty("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = non_empty("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = non_empty("QDRANT_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Some(collection) = non_empty("QDRANT_COLLECTION") {
            self.vector_store.collection = collection;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "embedding.model must not be empty".to_string(),
            ));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection must not be empty".to_string(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.ingest.embed_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.embed_concurrency must be greater than 0".to_string(),
            ));
        }
        for (key, value) in [
            ("embedding.max_retries", self.embedding.max_retries),
            ("vector_store.max_retries", self.vector_store.max_retries),
        ] {
            if value > MAX_RETRIES {
                return Err(ConfigError::ValidationError(format!(
                    "{key} must be at most {MAX_RETRIES}"
                )));
            }
        }
        Ok(())
    }

    /// Schema of the target collection derived from the embedding settings.
    pub fn collection_schema(&self) -> CollectionSchema {
        CollectionSchema::new(
            self.vector_store.collection.clone(),
            u64::from(self.embedding.dimension),
            self.vector_store.distance,
        )
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            api_key: None,
        }
    }
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    /// Process-local store; nothing survives the run.
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub distance: Distance,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            distance: Distance::default(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            api_key: None,
        }
    }
}

/// What to do when an id appears twice in one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateIdPolicy {
    /// Later fragments replace earlier ones (upsert by id).
    #[default]
    Overwrite,
    /// A repeated id aborts the run.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_provision")]
    pub provision: bool,

    #[serde(default)]
    pub duplicate_ids: DuplicateIdPolicy,

    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: u32,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_provision() -> bool {
    true
}

fn default_embed_concurrency() -> u32 {
    1
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            provision: default_provision(),
            duplicate_ids: DuplicateIdPolicy::default(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}
