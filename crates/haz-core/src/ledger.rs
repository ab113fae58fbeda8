//! The `QuakeLedger` trait: durable application of quake records.
//!
//! A ledger keeps three logical stores:
//!
//! - **history**: every version ever applied, keyed by
//!   `(public_id, modification_time_micro)`, aged out after the retention
//!   window;
//! - **current**: one row per `public_id`, always the newest version;
//! - **api**: like current, with its own retention and `duplicate` purge.
//!
//! Each store apply is its own transaction. There is no cross-store
//! atomicity: a reader may briefly observe the history store ahead of the
//! current or api stores. The window is bounded by transaction latency.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::quake::QuakeRecord;

/// Result of a replace-if-newer apply on the current or api store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
  /// The incoming record is now the stored row.
  Applied,
  /// The store already held an equal-or-newer version. Not an error: the
  /// stored row is already correct.
  LostRace,
}

impl ApplyOutcome {
  pub fn is_applied(self) -> bool { matches!(self, Self::Applied) }
}

/// Abstraction over a quake ledger backend.
///
/// Writers take no application-level locks. Convergence of the current and
/// api stores to the newest version relies on the backend's transactional
/// isolation plus its uniqueness constraint on `public_id`.
pub trait QuakeLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert into history, replacing any row with the same
  /// `(public_id, modification_time_micro)`. Re-applying a version is a
  /// no-op.
  fn apply_history<'a>(
    &'a self,
    record: &'a QuakeRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Replace the current row for the record's `public_id` if the stored row
  /// is older.
  fn apply_current<'a>(
    &'a self,
    record: &'a QuakeRecord,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + 'a;

  /// Replace the api row for the record's `public_id` if the stored row is
  /// older.
  fn apply_api<'a>(
    &'a self,
    record: &'a QuakeRecord,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + 'a;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Delete history rows whose origin time is before `cutoff`. Returns the
  /// number of rows removed.
  fn sweep_history(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete api rows whose origin time is before `cutoff` or whose status is
  /// `duplicate`. Returns the number of rows removed.
  fn sweep_api(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn current<'a>(
    &'a self,
    public_id: &'a str,
  ) -> impl Future<Output = Result<Option<QuakeRecord>, Self::Error>>
  + Send
  + 'a;

  fn api_record<'a>(
    &'a self,
    public_id: &'a str,
  ) -> impl Future<Output = Result<Option<QuakeRecord>, Self::Error>>
  + Send
  + 'a;

  /// All history rows for `public_id`, oldest version first.
  fn history<'a>(
    &'a self,
    public_id: &'a str,
  ) -> impl Future<Output = Result<Vec<QuakeRecord>, Self::Error>> + Send + 'a;
}
