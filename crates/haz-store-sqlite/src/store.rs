//! [`SqliteLedger`]: the SQLite implementation of [`QuakeLedger`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, ffi};

use haz_core::{
  ledger::{ApplyOutcome, QuakeLedger},
  quake::{QuakeRecord, Status},
};

use crate::{
  Error, Result,
  encode::{COLUMN_LIST, RawQuakeRow, encode_dt, insert_sql, record_values},
  schema::{API_TABLE, CURRENT_TABLE, HISTORY_TABLE, SCHEMA},
};

const MEMORY_PATH: &str = ":memory:";

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection settings for a file-backed ledger.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
  /// Number of connections; each runs on its own thread.
  pub pool_size:    usize,
  /// How long a statement waits on a locked database before failing.
  pub busy_timeout: Duration,
}

impl Default for LedgerOptions {
  fn default() -> Self {
    Self { pool_size: 4, busy_timeout: Duration::from_secs(5) }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A quake ledger backed by a SQLite database.
///
/// Holds a fixed pool of connections used round-robin. Cloning is cheap; the
/// pool is shared. There is no application-level locking: concurrent writers
/// to the same quake are serialised by SQLite's write lock, taken at the
/// start of each `IMMEDIATE` transaction.
#[derive(Clone)]
pub struct SqliteLedger {
  pool: Arc<[tokio_rusqlite::Connection]>,
  next: Arc<AtomicUsize>,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  ///
  /// `:memory:` and the empty path name a private database per connection,
  /// so they open a single-connection ledger whatever the pool size.
  pub async fn open(
    path: impl AsRef<Path>,
    options: LedgerOptions,
  ) -> Result<Self> {
    if options.pool_size == 0 {
      return Err(Error::EmptyPool);
    }

    let path = path.as_ref().to_path_buf();
    if is_private(&path) {
      tracing::debug!(path = %path.display(), "opening single-connection ledger");
      let conn = tokio_rusqlite::Connection::open(&path).await?;
      conn
        .call(move |conn| Ok(conn.busy_timeout(options.busy_timeout)?))
        .await?;
      init_schema(&conn).await?;
      return Ok(Self::from_pool(vec![conn]));
    }

    let mut pool = Vec::with_capacity(options.pool_size);
    for i in 0..options.pool_size {
      let conn = tokio_rusqlite::Connection::open(&path).await?;
      configure(&conn, options.busy_timeout).await?;
      if i == 0 {
        init_schema(&conn).await?;
      }
      pool.push(conn);
    }

    tracing::debug!(
      path = %path.display(),
      pool_size = options.pool_size,
      "opened ledger"
    );
    Ok(Self::from_pool(pool))
  }

  /// Open an in-memory ledger for tests. In-memory databases are
  /// private to their connection, so the pool has exactly one.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    init_schema(&conn).await?;
    Ok(Self::from_pool(vec![conn]))
  }

  fn from_pool(pool: Vec<tokio_rusqlite::Connection>) -> Self {
    Self { pool: pool.into(), next: Arc::new(AtomicUsize::new(0)) }
  }

  pub(crate) fn conn(&self) -> &tokio_rusqlite::Connection {
    let i = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
    &self.pool[i]
  }

  /// Delete the stored row for the record's quake if it is older, then
  /// insert. A primary-key violation on insert means an equal or newer
  /// version is already stored.
  ///
  /// Equal versions are tie-broken by site: a primary-site record replaces a
  /// backup-site record of the same version; otherwise the stored row wins.
  async fn replace_if_newer(
    &self,
    table: &'static str,
    record: &QuakeRecord,
  ) -> Result<ApplyOutcome> {
    let public_id = record.public_id().to_owned();
    let version = record.modification_time_micro;
    let incoming_backup = record.backup_site;
    let values = record_values(record);

    let outcome = self
      .conn()
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
          &format!(
            "DELETE FROM {table}
             WHERE PublicID = ?1
               AND (ModificationTimeUnixMicro < ?2
                    OR (ModificationTimeUnixMicro = ?2
                        AND BackupSite = 1
                        AND ?3 = 0))"
          ),
          rusqlite::params![public_id, version, incoming_backup],
        )?;

        let inserted =
          tx.execute(&insert_sql(table), rusqlite::params_from_iter(values));
        match inserted {
          Ok(_) => {
            tx.commit()?;
            Ok(ApplyOutcome::Applied)
          }
          Err(e) if is_unique_violation(&e) => {
            tx.rollback()?;
            Ok(ApplyOutcome::LostRace)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if outcome == ApplyOutcome::LostRace {
      tracing::debug!(
        table,
        public_id = record.public_id(),
        version,
        "equal or newer version already stored"
      );
    }
    Ok(outcome)
  }

  async fn fetch_one(
    &self,
    table: &'static str,
    public_id: &str,
  ) -> Result<Option<QuakeRecord>> {
    let public_id = public_id.to_owned();

    let raw: Option<RawQuakeRow> = self
      .conn()
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM {table} WHERE PublicID = ?1",
                *COLUMN_LIST
              ),
              rusqlite::params![public_id],
              RawQuakeRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawQuakeRow::into_record).transpose()
  }

  async fn delete_where(
    &self,
    sql: String,
    cutoff: DateTime<Utc>,
    status: Option<Status>,
  ) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);
    let status_str = status.map(Status::as_str);

    let deleted = self
      .conn()
      .call(move |conn| {
        let n = match status_str {
          Some(s) => conn.execute(&sql, rusqlite::params![cutoff_str, s])?,
          None => conn.execute(&sql, rusqlite::params![cutoff_str])?,
        };
        Ok(n)
      })
      .await?;

    Ok(deleted as u64)
  }
}

async fn configure(
  conn: &tokio_rusqlite::Connection,
  busy_timeout: Duration,
) -> Result<()> {
  conn
    .call(move |conn| {
      conn.busy_timeout(busy_timeout)?;
      conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
      })?;
      conn.pragma_update(None, "synchronous", "NORMAL")?;
      Ok(())
    })
    .await?;
  Ok(())
}

async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.execute_batch(&SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

/// Whether `path` names a database that only the opening connection sees.
fn is_private(path: &Path) -> bool {
  path.as_os_str().is_empty() || path.as_os_str() == MEMORY_PATH
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.code == rusqlite::ErrorCode::ConstraintViolation
        && matches!(
          f.extended_code,
          ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
        )
  )
}

// ─── QuakeLedger impl ────────────────────────────────────────────────────────

impl QuakeLedger for SqliteLedger {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn apply_history(&self, record: &QuakeRecord) -> Result<()> {
    let public_id = record.public_id().to_owned();
    let version = record.modification_time_micro;
    let values = record_values(record);

    self
      .conn()
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          &format!(
            "DELETE FROM {HISTORY_TABLE}
             WHERE PublicID = ?1 AND ModificationTimeUnixMicro = ?2"
          ),
          rusqlite::params![public_id, version],
        )?;
        tx.execute(
          &insert_sql(HISTORY_TABLE),
          rusqlite::params_from_iter(values),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn apply_current(&self, record: &QuakeRecord) -> Result<ApplyOutcome> {
    self.replace_if_newer(CURRENT_TABLE, record).await
  }

  async fn apply_api(&self, record: &QuakeRecord) -> Result<ApplyOutcome> {
    self.replace_if_newer(API_TABLE, record).await
  }

  // ── Retention ─────────────────────────────────────────────────────────────

  async fn sweep_history(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    self
      .delete_where(
        format!("DELETE FROM {HISTORY_TABLE} WHERE Time < ?1"),
        cutoff,
        None,
      )
      .await
  }

  async fn sweep_api(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    self
      .delete_where(
        format!("DELETE FROM {API_TABLE} WHERE Time < ?1 OR Status = ?2"),
        cutoff,
        Some(Status::Duplicate),
      )
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn current(&self, public_id: &str) -> Result<Option<QuakeRecord>> {
    self.fetch_one(CURRENT_TABLE, public_id).await
  }

  async fn api_record(&self, public_id: &str) -> Result<Option<QuakeRecord>> {
    self.fetch_one(API_TABLE, public_id).await
  }

  async fn history(&self, public_id: &str) -> Result<Vec<QuakeRecord>> {
    let public_id = public_id.to_owned();

    let raws: Vec<RawQuakeRow> = self
      .conn()
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM {HISTORY_TABLE}
           WHERE PublicID = ?1
           ORDER BY ModificationTimeUnixMicro",
          *COLUMN_LIST
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![public_id], RawQuakeRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuakeRow::into_record).collect()
  }
}
