//! SQL schema for the quake ledger.
//!
//! The three quake tables share one column layout, generated from
//! [`COLUMNS`](crate::encode::COLUMNS). They differ only in their keys: the
//! history table is keyed by version, the other two by `PublicID` alone.
//! Those primary keys are what turns a concurrent or stale insert into a
//! uniqueness violation.

use std::sync::LazyLock;

use crate::encode::COLUMNS;

pub const HISTORY_TABLE: &str = "quakehistory";
pub const CURRENT_TABLE: &str = "quake";
pub const API_TABLE: &str = "quakeapi";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub static SCHEMA: LazyLock<String> = LazyLock::new(|| {
  let columns = COLUMNS
    .iter()
    .map(|c| format!("    {} {}", c.name, c.sql_type))
    .collect::<Vec<_>>()
    .join(",\n");

  format!(
    "
CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (
{columns},
    PRIMARY KEY (PublicID, ModificationTimeUnixMicro)
);

CREATE TABLE IF NOT EXISTS {CURRENT_TABLE} (
{columns},
    PRIMARY KEY (PublicID)
);

CREATE TABLE IF NOT EXISTS {API_TABLE} (
{columns},
    PRIMARY KEY (PublicID)
);

-- Retention sweeps filter on origin time; the api purge also on status.
CREATE INDEX IF NOT EXISTS quakehistory_time_idx ON {HISTORY_TABLE}(Time);
CREATE INDEX IF NOT EXISTS quakeapi_time_idx     ON {API_TABLE}(Time);
CREATE INDEX IF NOT EXISTS quakeapi_status_idx   ON {API_TABLE}(Status);

PRAGMA user_version = 1;
"
  )
});
