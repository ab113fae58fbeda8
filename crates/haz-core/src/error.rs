//! Error types for `haz-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown region: {0:?}")]
  UnknownRegion(String),

  #[error(
    "retention must be between 1 and {max} days, got {0}",
    max = crate::ingest::MAX_RETENTION_DAYS
  )]
  InvalidRetention(i64),

  #[error("gazetteer has no localities")]
  EmptyGazetteer,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
