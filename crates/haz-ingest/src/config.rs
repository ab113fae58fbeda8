use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use haz_core::{
  ingest::{DEFAULT_RETENTION_DAYS, retention_days},
  region::Region,
};
use haz_store_sqlite::LedgerOptions;
use serde::Deserialize;

use crate::worker::RetryPolicy;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime ingest configuration, deserialised from `config.toml` and
/// `HAZ_*` environment variables. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  pub store_path:          PathBuf,
  pub pool_size:           usize,
  pub busy_timeout_ms:     u64,
  /// Region whose closest locality names the quake.
  pub home_region:         String,
  /// JSON array of localities for the intensity model.
  pub gazetteer_path:      PathBuf,
  pub workers:             usize,
  pub max_attempts:        u32,
  pub retry_backoff_ms:    u64,
  /// Seconds between background sweeps; `0` disables the sweeper task.
  pub sweep_interval_secs: u64,
  pub sweep_after_apply:   bool,
  pub retention_days:      i64,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      store_path:          PathBuf::from("haz.sqlite"),
      pool_size:           4,
      busy_timeout_ms:     5_000,
      home_region:         "newzealand".into(),
      gazetteer_path:      PathBuf::from("localities.json"),
      workers:             4,
      max_attempts:        5,
      retry_backoff_ms:    200,
      sweep_interval_secs: 300,
      sweep_after_apply:   false,
      retention_days:      DEFAULT_RETENTION_DAYS,
    }
  }
}

impl IngestConfig {
  pub fn ledger_options(&self) -> LedgerOptions {
    LedgerOptions {
      pool_size:    self.pool_size,
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
    }
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts.max(1),
      backoff:      Duration::from_millis(self.retry_backoff_ms),
    }
  }

  pub fn home_region(&self) -> haz_core::Result<Region> {
    Region::parse(&self.home_region)
  }

  /// The sweep window; rejects `retention_days` outside
  /// `1..=MAX_RETENTION_DAYS`.
  pub fn retention(&self) -> haz_core::Result<TimeDelta> {
    retention_days(self.retention_days)
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.sweep_interval_secs > 0)
      .then(|| Duration::from_secs(self.sweep_interval_secs))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_file_keeps_defaults() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        "home_region = \"canterbury\"\nworkers = 8\nsweep_interval_secs = 0\n",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: IngestConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.home_region().unwrap(), Region::Canterbury);
    assert_eq!(cfg.workers, 8);
    assert_eq!(cfg.sweep_interval(), None);
    assert_eq!(cfg.pool_size, 4);
    assert_eq!(cfg.retention().unwrap(), TimeDelta::days(365));
  }

  #[test]
  fn unknown_home_region_is_an_error() {
    let cfg = IngestConfig {
      home_region: "atlantis".into(),
      ..Default::default()
    };
    assert!(cfg.home_region().is_err());
  }

  #[test]
  fn out_of_range_retention_is_an_error() {
    for days in [0, -1, 36_501, 1_000_000_000] {
      let cfg = IngestConfig { retention_days: days, ..Default::default() };
      let err = cfg.retention().unwrap_err();
      assert!(
        matches!(err, haz_core::Error::InvalidRetention(d) if d == days),
        "{days}"
      );
    }
  }

  #[test]
  fn zero_attempts_still_tries_once() {
    let cfg = IngestConfig { max_attempts: 0, ..Default::default() };
    assert_eq!(cfg.retry_policy().max_attempts, 1);
  }
}
