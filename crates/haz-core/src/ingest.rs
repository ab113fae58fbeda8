//! The ingest pipeline: assemble, apply to every store, sweep.
//!
//! [`Ingestor`] is shared by any number of concurrent workers. It holds no
//! locks of its own; ordering between versions of the same quake is resolved
//! entirely by the [`QuakeLedger`].

use std::{sync::Arc, time::Instant};

use chrono::{TimeDelta, Utc};

use crate::{
  Error, Result,
  assemble::build_record,
  intensity::IntensityModel,
  ledger::{ApplyOutcome, QuakeLedger},
  quake::{DefaultRules, QuakeEvent, QualityRules},
  region::{HOME_REGION, Region},
};

/// History and api rows whose origin time is older than this many days are
/// swept.
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// Upper bound accepted by [`retention_days`].
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// A retention window of `days` whole days, rejecting empty, negative and
/// out-of-range windows.
pub fn retention_days(days: i64) -> Result<TimeDelta> {
  if !(1..=MAX_RETENTION_DAYS).contains(&days) {
    return Err(Error::InvalidRetention(days));
  }
  Ok(TimeDelta::days(days))
}

/// What one successful ingest did to each replace-if-newer store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
  pub public_id:               String,
  pub modification_time_micro: i64,
  pub current:                 ApplyOutcome,
  pub api:                     ApplyOutcome,
}

/// Rows removed by one sweep cycle; `None` where the sweep failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub history: Option<u64>,
  pub api:     Option<u64>,
}

pub struct Ingestor<L, M: ?Sized, R = DefaultRules> {
  ledger:            Arc<L>,
  model:             Arc<M>,
  rules:             R,
  home:              Region,
  retention:         TimeDelta,
  sweep_after_apply: bool,
}

impl<L, M, R> Ingestor<L, M, R>
where
  L: QuakeLedger,
  M: IntensityModel + ?Sized,
  R: QualityRules,
{
  pub fn new(ledger: Arc<L>, model: Arc<M>, rules: R) -> Self {
    Self {
      ledger,
      model,
      rules,
      home: HOME_REGION,
      retention: TimeDelta::days(DEFAULT_RETENTION_DAYS),
      sweep_after_apply: true,
    }
  }

  /// Region whose closest locality becomes the headline locality.
  #[must_use]
  pub fn with_home_region(mut self, home: Region) -> Self {
    self.home = home;
    self
  }

  #[must_use]
  pub fn with_retention(mut self, retention: TimeDelta) -> Self {
    self.retention = retention;
    self
  }

  /// Whether every successful ingest also runs a sweep cycle.
  #[must_use]
  pub fn with_sweep_after_apply(mut self, sweep: bool) -> Self {
    self.sweep_after_apply = sweep;
    self
  }

  pub fn ledger(&self) -> &Arc<L> { &self.ledger }

  /// Assemble `event` and apply it to history, current and api, in that
  /// order, each in its own transaction.
  ///
  /// Only storage failures are returned; callers should retry the whole
  /// event. Losing a version race and failed region lookups both count as
  /// success.
  pub async fn ingest(
    &self,
    event: QuakeEvent,
  ) -> Result<IngestReport, L::Error> {
    let started = Instant::now();
    let record = build_record(event, &*self.model, &self.rules, self.home);

    self.ledger.apply_history(&record).await?;
    let current = self.ledger.apply_current(&record).await?;
    let api = self.ledger.apply_api(&record).await?;

    tracing::info!(
      public_id = record.public_id(),
      modification_time = %record.modification_time(),
      ?current,
      ?api,
      elapsed_ms = started.elapsed().as_millis() as u64,
      "applied quake"
    );

    if self.sweep_after_apply {
      self.sweep().await;
    }

    Ok(IngestReport {
      public_id: record.event.public_id,
      modification_time_micro: record.modification_time_micro,
      current,
      api,
    })
  }

  /// Run one retention cycle. Failures are logged and retried next cycle.
  pub async fn sweep(&self) -> SweepReport {
    sweep_ledger(&*self.ledger, self.retention).await
  }
}

/// Remove history and api rows whose origin time is older than `retention`.
///
/// A window that is not positive, or that reaches past the earliest
/// representable time, would sweep live rows; the cycle is skipped instead.
pub async fn sweep_ledger<L>(ledger: &L, retention: TimeDelta) -> SweepReport
where
  L: QuakeLedger + ?Sized,
{
  let cutoff = (retention > TimeDelta::zero())
    .then(|| Utc::now().checked_sub_signed(retention))
    .flatten();
  let Some(cutoff) = cutoff else {
    tracing::warn!(?retention, "retention window out of range, skipping sweep");
    return SweepReport::default();
  };

  let mut report = SweepReport::default();
  match ledger.sweep_history(cutoff).await {
    Ok(n) => report.history = Some(n),
    Err(e) => tracing::warn!(error = %e, "history sweep failed"),
  }
  match ledger.sweep_api(cutoff).await {
    Ok(n) => report.api = Some(n),
    Err(e) => tracing::warn!(error = %e, "api sweep failed"),
  }

  tracing::debug!(
    history = ?report.history,
    api = ?report.api,
    %cutoff,
    "swept"
  );
  report
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{BTreeMap, HashMap},
    sync::{
      Mutex,
      atomic::{AtomicBool, Ordering},
    },
  };

  use chrono::{DateTime, TimeZone};

  use super::*;
  use crate::{
    derive::stub::StubModel,
    intensity::Intensity,
    quake::{QuakeRecord, Status, fixtures::event},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("store unavailable")]
  struct Unavailable;

  /// Map-backed ledger with the same replace-if-newer rules as a real
  /// backend.
  #[derive(Default)]
  struct MemoryLedger {
    history:     Mutex<BTreeMap<(String, i64), QuakeRecord>>,
    current:     Mutex<HashMap<String, QuakeRecord>>,
    api:         Mutex<HashMap<String, QuakeRecord>>,
    fail_writes: AtomicBool,
    fail_sweeps: AtomicBool,
  }

  impl MemoryLedger {
    fn check(&self, flag: &AtomicBool) -> Result<(), Unavailable> {
      if flag.load(Ordering::SeqCst) { Err(Unavailable) } else { Ok(()) }
    }

    fn replace_if_newer(
      map: &Mutex<HashMap<String, QuakeRecord>>,
      record: &QuakeRecord,
    ) -> ApplyOutcome {
      let mut map = map.lock().unwrap();
      match map.get(record.public_id()) {
        Some(stored)
          if stored.modification_time_micro >= record.modification_time_micro =>
        {
          ApplyOutcome::LostRace
        }
        _ => {
          map.insert(record.public_id().to_owned(), record.clone());
          ApplyOutcome::Applied
        }
      }
    }
  }

  impl QuakeLedger for MemoryLedger {
    type Error = Unavailable;

    async fn apply_history(
      &self,
      record: &QuakeRecord,
    ) -> Result<(), Unavailable> {
      self.check(&self.fail_writes)?;
      let key = (record.public_id().to_owned(), record.modification_time_micro);
      self.history.lock().unwrap().insert(key, record.clone());
      Ok(())
    }

    async fn apply_current(
      &self,
      record: &QuakeRecord,
    ) -> Result<ApplyOutcome, Unavailable> {
      self.check(&self.fail_writes)?;
      Ok(Self::replace_if_newer(&self.current, record))
    }

    async fn apply_api(
      &self,
      record: &QuakeRecord,
    ) -> Result<ApplyOutcome, Unavailable> {
      self.check(&self.fail_writes)?;
      Ok(Self::replace_if_newer(&self.api, record))
    }

    async fn sweep_history(
      &self,
      cutoff: DateTime<Utc>,
    ) -> Result<u64, Unavailable> {
      self.check(&self.fail_sweeps)?;
      let mut history = self.history.lock().unwrap();
      let before = history.len();
      history.retain(|_, r| r.event.time >= cutoff);
      Ok((before - history.len()) as u64)
    }

    async fn sweep_api(&self, cutoff: DateTime<Utc>) -> Result<u64, Unavailable> {
      self.check(&self.fail_sweeps)?;
      let mut api = self.api.lock().unwrap();
      let before = api.len();
      api.retain(|_, r| r.event.time >= cutoff && r.status != Status::Duplicate);
      Ok((before - api.len()) as u64)
    }

    async fn current(
      &self,
      public_id: &str,
    ) -> Result<Option<QuakeRecord>, Unavailable> {
      Ok(self.current.lock().unwrap().get(public_id).cloned())
    }

    async fn api_record(
      &self,
      public_id: &str,
    ) -> Result<Option<QuakeRecord>, Unavailable> {
      Ok(self.api.lock().unwrap().get(public_id).cloned())
    }

    async fn history(
      &self,
      public_id: &str,
    ) -> Result<Vec<QuakeRecord>, Unavailable> {
      Ok(
        self
          .history
          .lock()
          .unwrap()
          .iter()
          .filter(|((id, _), _)| id == public_id)
          .map(|(_, r)| r.clone())
          .collect(),
      )
    }
  }

  fn ingestor(ledger: Arc<MemoryLedger>) -> Ingestor<MemoryLedger, StubModel> {
    Ingestor::new(ledger, Arc::new(StubModel::default()), DefaultRules)
      .with_sweep_after_apply(false)
  }

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  #[tokio::test]
  async fn newer_version_replaces_older() {
    let ledger = Arc::new(MemoryLedger::default());
    let ing = ingestor(ledger.clone());

    let first = ing.ingest(event("2013p407387", at(100))).await.unwrap();
    assert_eq!(first.current, ApplyOutcome::Applied);

    let second = ing.ingest(event("2013p407387", at(200))).await.unwrap();
    assert_eq!(second.current, ApplyOutcome::Applied);
    assert_eq!(second.api, ApplyOutcome::Applied);

    let stored = ledger.current("2013p407387").await.unwrap().unwrap();
    assert_eq!(stored.modification_time(), at(200));
    assert_eq!(ledger.history("2013p407387").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn stale_version_loses_race_without_error() {
    let ledger = Arc::new(MemoryLedger::default());
    let ing = ingestor(ledger.clone());

    ing.ingest(event("2013p407387", at(200))).await.unwrap();
    let late = ing.ingest(event("2013p407387", at(100))).await.unwrap();

    assert_eq!(late.current, ApplyOutcome::LostRace);
    assert_eq!(late.api, ApplyOutcome::LostRace);
    let stored = ledger.current("2013p407387").await.unwrap().unwrap();
    assert_eq!(stored.modification_time(), at(200));
  }

  #[tokio::test]
  async fn store_failure_propagates() {
    let ledger = Arc::new(MemoryLedger::default());
    ledger.fail_writes.store(true, Ordering::SeqCst);

    let result = ingestor(ledger).ingest(event("2013p407387", at(100))).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn sweep_failure_does_not_fail_ingest() {
    let ledger = Arc::new(MemoryLedger::default());
    ledger.fail_sweeps.store(true, Ordering::SeqCst);
    let ing = ingestor(ledger.clone()).with_sweep_after_apply(true);

    let report = ing.ingest(event("2013p407387", at(100))).await.unwrap();
    assert_eq!(report.current, ApplyOutcome::Applied);
    assert!(ledger.current("2013p407387").await.unwrap().is_some());

    assert_eq!(ing.sweep().await, SweepReport::default());
  }

  #[tokio::test]
  async fn sweep_uses_retention_window() {
    let ledger = Arc::new(MemoryLedger::default());
    let ing = ingestor(ledger.clone()).with_retention(TimeDelta::days(30));

    let mut old = event("old", at(100));
    old.time = Utc::now() - TimeDelta::days(31);
    let mut recent = event("recent", at(100));
    recent.time = Utc::now() - TimeDelta::days(1);
    ing.ingest(old).await.unwrap();
    ing.ingest(recent).await.unwrap();

    let report = ing.sweep().await;
    assert_eq!(report.history, Some(1));
    assert_eq!(report.api, Some(1));
    assert!(ledger.history("old").await.unwrap().is_empty());
    assert_eq!(ledger.history("recent").await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn out_of_range_retention_sweeps_nothing() {
    let ledger = Arc::new(MemoryLedger::default());
    let mut recent = event("recent", at(100));
    recent.time = Utc::now();
    ingestor(ledger.clone()).ingest(recent).await.unwrap();

    for retention in [TimeDelta::zero(), TimeDelta::days(-1), TimeDelta::MAX] {
      let ing = ingestor(ledger.clone()).with_retention(retention);
      let report = ing.sweep().await;
      assert_eq!(report, SweepReport::default(), "{retention:?}");
    }
    assert_eq!(ledger.history("recent").await.unwrap().len(), 1);
    assert!(ledger.api_record("recent").await.unwrap().is_some());
  }

  #[test]
  fn retention_days_bounds() {
    assert_eq!(retention_days(1).unwrap(), TimeDelta::days(1));
    assert_eq!(
      retention_days(MAX_RETENTION_DAYS).unwrap(),
      TimeDelta::days(MAX_RETENTION_DAYS)
    );
    for bad in [0, -1, MAX_RETENTION_DAYS + 1, 1_000_000_000] {
      let err = retention_days(bad).unwrap_err();
      assert!(matches!(err, Error::InvalidRetention(d) if d == bad));
    }
  }

  #[tokio::test]
  async fn region_failure_still_persists() {
    let ledger = Arc::new(MemoryLedger::default());
    let ing = Ingestor::new(
      ledger.clone(),
      Arc::new(StubModel::failing(&[crate::region::Region::Fiordland])),
      DefaultRules,
    )
    .with_sweep_after_apply(false);

    ing.ingest(event("2013p407387", at(100))).await.unwrap();
    let stored = ledger.current("2013p407387").await.unwrap().unwrap();
    let fiordland = stored.regions.get(crate::region::Region::Fiordland);
    assert_eq!(fiordland.mmi_distance, 0.0);
    assert_eq!(fiordland.intensity, Intensity::Unknown);
  }
}
