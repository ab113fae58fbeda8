//! The ordered column table shared by every quake store, and conversion
//! between [`QuakeRecord`] and SQLite values.
//!
//! Column names are a stable external contract: the read API serialises rows
//! by name. Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision so that string order is chronological order.

use std::{borrow::Cow, sync::LazyLock, vec};

use chrono::{DateTime, SecondsFormat, Utc};
use haz_core::{
  intensity::Intensity,
  quake::{
    Quality,
    QuakeEvent,
    QuakeRecord,
    RegionalIntensities,
    RegionalIntensity,
    Status,
  },
  region::{REGIONS, Region},
};
use rusqlite::types::Value;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>, String> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| e.to_string())
}

// ─── Column table ────────────────────────────────────────────────────────────

type Field = fn(&QuakeRecord) -> Value;

fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

/// Event and derived columns, in contract order. Regional columns follow.
const FIELDS: &[(&str, &str, Field)] = &[
  ("PublicID", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.public_id)),
  ("Type", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.event_type)),
  ("AgencyID", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.agency_id)),
  ("ModificationTime", "TEXT NOT NULL", |q: &QuakeRecord| {
    Value::Text(encode_dt(q.event.modification_time))
  }),
  ("Time", "TEXT NOT NULL", |q: &QuakeRecord| {
    Value::Text(encode_dt(q.event.time))
  }),
  ("Longitude", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.longitude)
  }),
  ("Latitude", "REAL NOT NULL", |q: &QuakeRecord| Value::Real(q.event.latitude)),
  ("Depth", "REAL NOT NULL", |q: &QuakeRecord| Value::Real(q.event.depth)),
  ("DepthType", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.depth_type)),
  ("MethodID", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.method_id)),
  ("EarthModelID", "TEXT NOT NULL", |q: &QuakeRecord| {
    text(&q.event.earth_model_id)
  }),
  ("EvaluationMode", "TEXT NOT NULL", |q: &QuakeRecord| {
    text(&q.event.evaluation_mode)
  }),
  ("EvaluationStatus", "TEXT NOT NULL", |q: &QuakeRecord| {
    text(&q.event.evaluation_status)
  }),
  ("UsedPhaseCount", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(q.event.used_phase_count)
  }),
  ("UsedStationCount", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(q.event.used_station_count)
  }),
  ("StandardError", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.standard_error)
  }),
  ("AzimuthalGap", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.azimuthal_gap)
  }),
  ("MinimumDistance", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.minimum_distance)
  }),
  ("Magnitude", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.magnitude)
  }),
  ("MagnitudeUncertainty", "REAL NOT NULL", |q: &QuakeRecord| {
    Value::Real(q.event.magnitude_uncertainty)
  }),
  ("MagnitudeType", "TEXT NOT NULL", |q: &QuakeRecord| {
    text(&q.event.magnitude_type)
  }),
  ("MagnitudeStationCount", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(q.event.magnitude_station_count)
  }),
  ("Site", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.event.site)),
  ("Status", "TEXT NOT NULL", |q: &QuakeRecord| text(q.status.as_str())),
  ("Quality", "TEXT NOT NULL", |q: &QuakeRecord| text(q.quality.as_str())),
  ("Deleted", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(i64::from(q.deleted))
  }),
  ("BackupSite", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(i64::from(q.backup_site))
  }),
  ("MMI", "REAL NOT NULL", |q: &QuakeRecord| Value::Real(q.mmi)),
  ("Intensity", "TEXT NOT NULL", |q: &QuakeRecord| text(q.intensity.as_str())),
  ("ModificationTimeUnixMicro", "INTEGER NOT NULL", |q: &QuakeRecord| {
    Value::Integer(q.modification_time_micro)
  }),
  ("Locality", "TEXT NOT NULL", |q: &QuakeRecord| text(&q.locality)),
];

#[derive(Clone, Copy)]
enum Encoder {
  Field(Field),
  Mmid(Region),
  Intensity(Region),
}

/// One column of a quake store.
pub struct Column {
  pub name:     Cow<'static, str>,
  pub sql_type: &'static str,
  encoder:      Encoder,
}

impl Column {
  pub fn value(&self, record: &QuakeRecord) -> Value {
    match self.encoder {
      Encoder::Field(f) => f(record),
      Encoder::Mmid(r) => Value::Real(record.regions.get(r).mmi_distance),
      Encoder::Intensity(r) => text(record.regions.get(r).intensity.as_str()),
    }
  }
}

/// Every column in contract order: [`FIELDS`], then an `MMID_` and
/// `Intensity_` pair per region.
pub static COLUMNS: LazyLock<Vec<Column>> = LazyLock::new(|| {
  let fields = FIELDS.iter().map(|&(name, sql_type, f)| Column {
    name: Cow::Borrowed(name),
    sql_type,
    encoder: Encoder::Field(f),
  });
  let regional = REGIONS.iter().flat_map(|&r| {
    [
      Column {
        name:     Cow::Owned(r.mmid_column()),
        sql_type: "REAL NOT NULL",
        encoder:  Encoder::Mmid(r),
      },
      Column {
        name:     Cow::Owned(r.intensity_column()),
        sql_type: "TEXT NOT NULL",
        encoder:  Encoder::Intensity(r),
      },
    ]
  });
  fields.chain(regional).collect()
});

/// Comma-separated column list in contract order.
pub static COLUMN_LIST: LazyLock<String> = LazyLock::new(|| {
  COLUMNS.iter().map(|c| c.name.as_ref()).collect::<Vec<_>>().join(", ")
});

pub fn record_values(record: &QuakeRecord) -> Vec<Value> {
  COLUMNS.iter().map(|c| c.value(record)).collect()
}

pub fn insert_sql(table: &str) -> String {
  let params = (1..=COLUMNS.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  format!("INSERT INTO {table} ({}) VALUES ({params})", *COLUMN_LIST)
}

// ─── Row type ────────────────────────────────────────────────────────────────

/// Raw values read from a quake row, in [`COLUMNS`] order.
pub struct RawQuakeRow(pub Vec<Value>);

impl RawQuakeRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    (0..COLUMNS.len())
      .map(|i| row.get::<_, Value>(i))
      .collect::<rusqlite::Result<Vec<_>>>()
      .map(Self)
  }

  pub fn into_record(self) -> Result<QuakeRecord> {
    let mut c = Cursor { values: self.0.into_iter(), index: 0 };

    let event = QuakeEvent {
      public_id:               c.text()?,
      event_type:              c.text()?,
      agency_id:               c.text()?,
      modification_time:       c.time()?,
      time:                    c.time()?,
      longitude:               c.real()?,
      latitude:                c.real()?,
      depth:                   c.real()?,
      depth_type:              c.text()?,
      method_id:               c.text()?,
      earth_model_id:          c.text()?,
      evaluation_mode:         c.text()?,
      evaluation_status:       c.text()?,
      used_phase_count:        c.integer()?,
      used_station_count:      c.integer()?,
      standard_error:          c.real()?,
      azimuthal_gap:           c.real()?,
      minimum_distance:        c.real()?,
      magnitude:               c.real()?,
      magnitude_uncertainty:   c.real()?,
      magnitude_type:          c.text()?,
      magnitude_station_count: c.integer()?,
      site:                    c.text()?,
    };

    let status = c.parse::<Status>()?;
    let quality = c.parse::<Quality>()?;
    let deleted = c.integer()? != 0;
    let backup_site = c.integer()? != 0;
    let mmi = c.real()?;
    let intensity = c.parse::<Intensity>()?;
    let modification_time_micro = c.integer()?;
    let locality = c.text()?;

    let mut regions = RegionalIntensities::default();
    for region in REGIONS {
      let mmi_distance = c.real()?;
      let intensity = c.parse::<Intensity>()?;
      regions.set(region, RegionalIntensity { mmi_distance, intensity });
    }

    Ok(QuakeRecord {
      event,
      status,
      quality,
      deleted,
      backup_site,
      mmi,
      intensity,
      modification_time_micro,
      locality,
      regions,
    })
  }
}

/// Walks a row's values in column order, naming the column in errors.
struct Cursor {
  values: vec::IntoIter<Value>,
  index:  usize,
}

impl Cursor {
  fn next(&mut self) -> Result<(Value, String)> {
    let name = self.peek_name();
    self.index += 1;
    match self.values.next() {
      Some(value) => Ok((value, name)),
      None => Err(Error::Decode { column: name, reason: "missing value".into() }),
    }
  }

  fn text(&mut self) -> Result<String> {
    match self.next()? {
      (Value::Text(s), _) => Ok(s),
      (other, name) => Err(mismatch(&name, "text", &other)),
    }
  }

  fn real(&mut self) -> Result<f64> {
    match self.next()? {
      (Value::Real(f), _) => Ok(f),
      (Value::Integer(i), _) => Ok(i as f64),
      (other, name) => Err(mismatch(&name, "real", &other)),
    }
  }

  fn integer(&mut self) -> Result<i64> {
    match self.next()? {
      (Value::Integer(i), _) => Ok(i),
      (other, name) => Err(mismatch(&name, "integer", &other)),
    }
  }

  fn time(&mut self) -> Result<DateTime<Utc>> {
    let name = self.peek_name();
    let s = self.text()?;
    decode_dt(&s).map_err(|reason| Error::Decode { column: name, reason })
  }

  fn parse<T: std::str::FromStr>(&mut self) -> Result<T> {
    let name = self.peek_name();
    let s = self.text()?;
    s.parse().map_err(|_| Error::Decode {
      column: name,
      reason: format!("unrecognised value {s:?}"),
    })
  }

  fn peek_name(&self) -> String {
    COLUMNS
      .get(self.index)
      .map_or_else(|| "<end>".to_owned(), |c| c.name.to_string())
  }
}

fn mismatch(column: &str, expected: &str, got: &Value) -> Error {
  Error::Decode {
    column: column.to_owned(),
    reason: format!("expected {expected}, got {:?}", got.data_type()),
  }
}
