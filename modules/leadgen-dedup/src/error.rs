//! Typed errors for the seen-entity cache and merge engine.

use leadgen_common::LeadId;
use thiserror::Error;

/// Fast-cache transport failure. Never fatal to a dedup answer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("fast cache unavailable: {0}")]
    Unavailable(String),

    #[error("ttl of {0:?} is out of range")]
    TtlOutOfRange(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum MergeError {
    /// The lead that should absorb the others does not exist.
    #[error("primary lead {0} not found")]
    PrimaryNotFound(LeadId),

    /// Durable store failure; the merge was rolled back.
    #[error("merge aborted: {0}")]
    Store(#[from] anyhow::Error),
}

pub type MergeResult<T> = std::result::Result<T, MergeError>;
