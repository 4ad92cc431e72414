//! Collection schema and distance metrics.

use serde::{Deserialize, Serialize};

/// Similarity metric configured on a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl std::str::FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            "manhattan" => Ok(Distance::Manhattan),
            _ => Err(format!("unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Cosine => write!(f, "cosine"),
            Distance::Dot => write!(f, "dot"),
            Distance::Euclid => write!(f, "euclid"),
            Distance::Manhattan => write!(f, "manhattan"),
        }
    }
}

/// Shape of the target collection, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: u64,
    pub distance: Distance,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, dimension: u64, distance: Distance) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance,
        }
    }
}

/// Collection information reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionInfo {
    pub points_count: u64,
    /// Vector size, when the backend reports a single unnamed vector config.
    pub dimension: Option<u64>,
}
