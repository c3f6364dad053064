//! Error taxonomy for the clustering core (§7 of SPEC_FULL.md).
//!
//! Each component gets its own `thiserror` enum in the style of the teacher's
//! `ApiClientError`/`ThumbnailError`; `ClusterError` composes them into the
//! five-kind taxonomy a caller dispatches on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request to embedding service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding service returned status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode embedding response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("HTTP request to vector index failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vector index returned status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("vector index rejected a zero-dimension sentinel vector")]
    SentinelVector,
}

#[derive(Debug, Error)]
pub enum ClusterStoreError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("attempted to use cluster {0} as a centroid seed with a zero vector")]
    ZeroVectorCentroid(i64),
    #[error("unknown cluster id {0}")]
    UnknownCluster(i64),
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// The taxonomy from §7: not every component's error type maps 1:1 onto a
/// kind, so this is the type the Clusterer and Dispatcher actually match on.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("transient remote failure: {0}")]
    TransientRemote(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("duplicate seed for upstream item {0}")]
    DuplicateSeed(i64),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("fatal startup failure: {0}")]
    Fatal(String),
}

impl From<EmbeddingError> for ClusterError {
    fn from(e: EmbeddingError) -> Self {
        Self::TransientRemote(e.to_string())
    }
}

impl From<VectorIndexError> for ClusterError {
    fn from(e: VectorIndexError) -> Self {
        match e {
            VectorIndexError::SentinelVector => {
                Self::InvariantViolation("zero-dimension sentinel vector reached the index".into())
            }
            other => Self::TransientRemote(other.to_string()),
        }
    }
}

impl From<ClusterStoreError> for ClusterError {
    fn from(e: ClusterStoreError) -> Self {
        match e {
            ClusterStoreError::Db(db_err) => Self::TransientRemote(db_err.to_string()),
            other => Self::InvariantViolation(other.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for ClusterError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::TransientRemote(e.to_string())
    }
}

impl ClusterError {
    #[must_use]
    pub const fn should_mark_processed(&self) -> bool {
        // TransientRemote must allow at-least-once redelivery; every other
        // kind is a terminal decision for this item.
        !matches!(self, Self::TransientRemote(_))
    }
}
