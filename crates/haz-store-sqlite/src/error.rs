//! Error type for `haz-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The database could not be reached or a statement failed. The whole
  /// ingest should be retried.
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("column {column}: {reason}")]
  Decode { column: String, reason: String },

  #[error("connection pool size must be at least 1")]
  EmptyPool,
}

impl Error {
  /// Whether retrying the same operation may succeed.
  pub fn is_transient(&self) -> bool { matches!(self, Self::Database(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
