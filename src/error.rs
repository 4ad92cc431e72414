//! Error types for the fragment ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::FragmentId;
use crate::services::PipelineState;
use crate::utils::retry::Retryable;

/// Errors raised while reading the fragment source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open fragment source {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    ConnectionError(String),

    #[error("embedding service rejected credentials: {0}")]
    Authentication(String),

    #[error("embedding service returned status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::Authentication(_)
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::EmptyInput => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("invalid collection schema: {0}")]
    InvalidSchema(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("point {id} has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch {
        id: FragmentId,
        expected: u64,
        actual: usize,
    },
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("timed out")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
            VectorStoreError::InvalidSchema(_) | VectorStoreError::DimensionMismatch { .. } => {
                false
            }
        }
    }
}

/// A fragment identified by id and source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRef {
    pub id: FragmentId,
    pub line: usize,
}

impl std::fmt::Display for FragmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fragment {} (line {})", self.id, self.line)
    }
}

/// The error that aborted an ingestion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("provisioning failed: {0}")]
    Provisioning(#[source] VectorStoreError),

    #[error("embedding failed for {fragment}: {source}")]
    Embedding {
        fragment: FragmentRef,
        #[source]
        source: EmbeddingError,
    },

    #[error("upsert failed{}: {source}", in_progress(.fragment.as_ref()))]
    Upsert {
        fragment: Option<FragmentRef>,
        #[source]
        source: VectorStoreError,
    },

    #[error("duplicate id {} at line {} (first seen at line {first_line})", .fragment.id, .fragment.line)]
    DuplicateId {
        fragment: FragmentRef,
        first_line: usize,
    },
}

fn in_progress(fragment: Option<&FragmentRef>) -> String {
    fragment.map_or_else(String::new, |f| format!(" while adding {f}"))
}

impl PipelineError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Source(SourceError::MalformedRecord { .. }) => "malformed_record",
            PipelineError::Source(_) => "source_io",
            PipelineError::Provisioning(_) => "provisioning",
            PipelineError::Embedding { .. } => "embedding_service",
            PipelineError::Upsert { .. } => "upsert",
            PipelineError::DuplicateId { .. } => "duplicate_id",
        }
    }

    /// The fragment being processed when the error occurred, if any.
    pub fn fragment(&self) -> Option<FragmentRef> {
        match self {
            PipelineError::Embedding { fragment, .. } | PipelineError::DuplicateId { fragment, .. } => {
                Some(fragment.clone())
            }
            PipelineError::Upsert { fragment, .. } => fragment.clone(),
            PipelineError::Source(_) | PipelineError::Provisioning(_) => None,
        }
    }

    /// The input line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            PipelineError::Source(SourceError::MalformedRecord { line, .. })
            | PipelineError::Source(SourceError::Read { line, .. }) => Some(*line),
            _ => self.fragment().map(|f| f.line),
        }
    }
}

/// A failed run: the triggering error plus what had been persisted before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: PipelineError,
    pub persisted: u64,
    pub failed_in: PipelineState,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(server_error(429, "slow down").is_retryable());
        assert!(server_error(503, "unavailable").is_retryable());
        assert!(!server_error(400, "bad input").is_retryable());
        assert!(!EmbeddingError::Authentication("status 401".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("no data".into()).is_retryable());
    }

    #[test]
    fn test_server_error_classified_by_status_not_body() {
        let err = server_error(
            400,
            "This model's maximum context length is 8192 tokens, however you requested 15000 tokens (500 in your prompt)",
        );
        assert!(!err.is_retryable());
        assert!(!server_error(404, "503 Service Unavailable").is_retryable());
        assert!(server_error(502, "").is_retryable());
    }

    fn server_error(status: u16, message: &str) -> EmbeddingError {
        EmbeddingError::ServerError {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_vector_store_retryable() {
        assert!(VectorStoreError::ConnectionError("refused".into()).is_retryable());
        assert!(VectorStoreError::UpsertError("request timed out".into()).is_retryable());
        assert!(!VectorStoreError::UpsertError("wrong input".into()).is_retryable());
        let unavailable = "status: Unavailable, message: \"transport error\"";
        assert!(VectorStoreError::CollectionError(unavailable.into()).is_retryable());
        let missing = "Not found: Collection `x` doesn't exist";
        assert!(!VectorStoreError::CollectionError(missing.into()).is_retryable());
        let mismatch = VectorStoreError::DimensionMismatch {
            id: FragmentId::Num(1),
            expected: 4,
            actual: 3,
        };
        assert!(!mismatch.is_retryable());
    }

    #[test]
    fn test_pipeline_error_kind_and_line() {
        let err = PipelineError::from(SourceError::MalformedRecord {
            line: 3,
            reason: "missing field `text`".into(),
        });
        assert_eq!(err.kind(), "malformed_record");
        assert_eq!(err.line(), Some(3));
        assert!(err.fragment().is_none());

        let err = PipelineError::Embedding {
            fragment: FragmentRef {
                id: FragmentId::from("a"),
                line: 9,
            },
            source: EmbeddingError::Timeout,
        };
        assert_eq!(err.kind(), "embedding_service");
        assert_eq!(err.line(), Some(9));
        assert_eq!(
            err.to_string(),
            "embedding failed for fragment \"a\" (line 9): embedding timeout"
        );
    }

    #[test]
    fn test_upsert_error_display() {
        let err = PipelineError::Upsert {
            fragment: None,
            source: VectorStoreError::UpsertError("boom".into()),
        };
        assert_eq!(err.to_string(), "upsert failed: upsert error: boom");

        let err = PipelineError::Upsert {
            fragment: Some(FragmentRef {
                id: FragmentId::Num(50),
                line: 50,
            }),
            source: VectorStoreError::UpsertError("boom".into()),
        };
        assert_eq!(
            err.to_string(),
            "upsert failed while adding fragment 50 (line 50): upsert error: boom"
        );
    }
}
