use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied fragment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentId {
    Num(u64),
    Text(String),
}

impl FragmentId {
    /// Returns the UUID used as the Qdrant point id when the string id is not
    /// already a UUID. Integer ids and UUID strings are stored as-is.
    pub fn mapped_uuid(&self) -> Option<Uuid> {
        match self {
            FragmentId::Num(_) => None,
            FragmentId::Text(s) if Uuid::parse_str(s).is_ok() => None,
            FragmentId::Text(s) => Some(Uuid::new_v5(&Uuid::NAMESPACE_OID, s.as_bytes())),
        }
    }
}

impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentId::Num(n) => write!(f, "{n}"),
            FragmentId::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<u64> for FragmentId {
    fn from(value: u64) -> Self {
        FragmentId::Num(value)
    }
}

impl From<&str> for FragmentId {
    fn from(value: &str) -> Self {
        FragmentId::Text(value.to_string())
    }
}

/// One parsed line of the input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRecord {
    pub id: FragmentId,
    pub text: String,
}

/// A fragment together with the 1-based line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedFragment {
    pub line: usize,
    pub record: FragmentRecord,
}

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
}

/// The unit persisted to the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: FragmentId,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl Point {
    pub fn new(record: FragmentRecord, vector: Vec<f32>) -> Self {
        Self {
            id: record.id,
            vector,
            payload: PointPayload { text: record.text },
        }
    }
}
