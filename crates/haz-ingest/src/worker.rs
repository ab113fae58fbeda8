//! Bounded concurrent ingest with retry, and the interval sweeper.

use std::{fmt::Display, sync::Arc, time::Duration};

use haz_core::{
  ingest::{IngestReport, Ingestor},
  intensity::IntensityModel,
  ledger::QuakeLedger,
  quake::{QualityRules, QuakeEvent},
};
use tokio::{
  sync::{Semaphore, mpsc},
  task::{JoinError, JoinHandle, JoinSet},
  time::MissedTickBehavior,
};

// ─── Retry ────────────────────────────────────────────────────────────────────

/// Errors that may succeed when the same operation is retried.
pub trait Transient {
  fn is_transient(&self) -> bool;
}

impl Transient for haz_store_sqlite::Error {
  fn is_transient(&self) -> bool { haz_store_sqlite::Error::is_transient(self) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts per event, including the first.
  pub max_attempts: u32,
  /// Delay before the second attempt; grows linearly after that.
  pub backoff:      Duration,
}

/// Ingest one event, retrying the whole event on transient store failures.
///
/// Every store apply is idempotent for a given version, so replaying an
/// event that partly applied is safe.
pub async fn ingest_with_retry<L, M, R>(
  ingestor: &Ingestor<L, M, R>,
  event: QuakeEvent,
  policy: RetryPolicy,
) -> Result<IngestReport, L::Error>
where
  L: QuakeLedger,
  L::Error: Transient,
  M: IntensityModel + ?Sized,
  R: QualityRules,
{
  let mut attempt = 1;
  loop {
    match ingestor.ingest(event.clone()).await {
      Ok(report) => return Ok(report),
      Err(e) if e.is_transient() && attempt < policy.max_attempts => {
        let delay = policy.backoff * attempt;
        tracing::warn!(
          public_id = %event.public_id,
          attempt,
          error = %e,
          ?delay,
          "ingest failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}

// ─── Worker pool ──────────────────────────────────────────────────────────────

/// Totals for one [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  /// Events that became the current version.
  pub applied:    u64,
  /// Events stored in history but already superseded in current.
  pub superseded: u64,
  /// Events that gave up after retries.
  pub failed:     u64,
}

impl RunSummary {
  fn record<E: Display>(
    &mut self,
    done: Result<Result<IngestReport, (String, E)>, JoinError>,
  ) {
    match done {
      Ok(Ok(report)) if report.current.is_applied() => self.applied += 1,
      Ok(Ok(_)) => self.superseded += 1,
      Ok(Err((public_id, e))) => {
        tracing::error!(%public_id, error = %e, "giving up on event");
        self.failed += 1;
      }
      Err(e) => {
        tracing::error!(error = %e, "ingest task aborted");
        self.failed += 1;
      }
    }
  }
}

/// Apply every event received on `events` with at most `workers` ingests in
/// flight. Returns once the channel closes and all in-flight work finishes.
pub async fn run<L, M, R>(
  ingestor: Arc<Ingestor<L, M, R>>,
  mut events: mpsc::Receiver<QuakeEvent>,
  workers: usize,
  policy: RetryPolicy,
) -> RunSummary
where
  L: QuakeLedger + 'static,
  L::Error: Transient,
  M: IntensityModel + ?Sized + 'static,
  R: QualityRules + 'static,
{
  let permits = Arc::new(Semaphore::new(workers.max(1)));
  let mut tasks = JoinSet::new();
  let mut summary = RunSummary::default();

  while let Some(event) = events.recv().await {
    let Ok(permit) = permits.clone().acquire_owned().await else {
      break;
    };
    let ingestor = ingestor.clone();
    tasks.spawn(async move {
      let _permit = permit;
      let public_id = event.public_id.clone();
      ingest_with_retry(&ingestor, event, policy)
        .await
        .map_err(|e| (public_id, e))
    });

    while let Some(done) = tasks.try_join_next() {
      summary.record(done);
    }
  }

  while let Some(done) = tasks.join_next().await {
    summary.record(done);
  }
  summary
}

// ─── Sweeper ──────────────────────────────────────────────────────────────────

/// Run a retention cycle every `every` until the handle is aborted. The first
/// cycle runs immediately.
pub fn spawn_sweeper<L, M, R>(
  ingestor: Arc<Ingestor<L, M, R>>,
  every: Duration,
) -> JoinHandle<()>
where
  L: QuakeLedger + 'static,
  M: IntensityModel + ?Sized + 'static,
  R: QualityRules + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      ingestor.sweep().await;
    }
  })
}
