//! Quake types: the incoming event and the derived, persisted record.
//!
//! A [`QuakeEvent`] is one version of the information about an earthquake,
//! identified by `public_id` and versioned by `modification_time`. A
//! [`QuakeRecord`] is the event plus everything derived from it, in the exact
//! shape the quake stores persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  intensity::Intensity,
  region::{REGION_COUNT, REGIONS, Region},
};

// ─── Incoming event ──────────────────────────────────────────────────────────

/// One version of the information about a quake, as delivered by the
/// messaging collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuakeEvent {
  #[serde(rename = "publicID")]
  pub public_id:               String,
  #[serde(rename = "type")]
  pub event_type:              String,
  #[serde(rename = "agencyID")]
  pub agency_id:               String,
  /// Logical version of this information; not the arrival time.
  pub modification_time:       DateTime<Utc>,
  /// Origin time.
  pub time:                    DateTime<Utc>,
  pub longitude:               f64,
  pub latitude:                f64,
  pub depth:                   f64,
  pub depth_type:              String,
  #[serde(rename = "methodID")]
  pub method_id:               String,
  #[serde(rename = "earthModelID")]
  pub earth_model_id:          String,
  pub evaluation_mode:         String,
  pub evaluation_status:       String,
  pub used_phase_count:        i64,
  pub used_station_count:      i64,
  pub standard_error:          f64,
  pub azimuthal_gap:           f64,
  pub minimum_distance:        f64,
  pub magnitude:               f64,
  pub magnitude_uncertainty:   f64,
  pub magnitude_type:          String,
  pub magnitude_station_count: i64,
  pub site:                    String,
}

impl QuakeEvent {
  pub fn hypocentre(&self) -> crate::intensity::Hypocentre {
    crate::intensity::Hypocentre {
      longitude: self.longitude,
      latitude:  self.latitude,
      depth:     self.depth,
      magnitude: self.magnitude,
    }
  }
}

// ─── Status and quality ──────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  Automatic,
  Reviewed,
  Deleted,
  Duplicate,
}

impl Status {
  pub fn as_str(self) -> &'static str { self.into() }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Quality {
  Best,
  Good,
  Caution,
  Unknown,
  Deleted,
}

impl Quality {
  pub fn as_str(self) -> &'static str { self.into() }
}

/// Business rules mapping evaluation fields to [`Status`] and [`Quality`].
pub trait QualityRules: Send + Sync {
  fn status(&self, event: &QuakeEvent) -> Status;

  fn quality(&self, event: &QuakeEvent, status: Status) -> Quality;
}

/// The stock rule set.
///
/// Manual or confirmed solutions are `reviewed` and `best`. Automatic
/// solutions are `good` once enough phases and magnitude stations back them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRules;

impl DefaultRules {
  pub const GOOD_PHASE_COUNT: i64 = 20;
  pub const GOOD_MAGNITUDE_STATION_COUNT: i64 = 10;
}

impl QualityRules for DefaultRules {
  fn status(&self, event: &QuakeEvent) -> Status {
    match (
      event.event_type.as_str(),
      event.evaluation_mode.as_str(),
      event.evaluation_status.as_str(),
    ) {
      ("not existing", _, _) => Status::Deleted,
      ("duplicate", _, _) => Status::Duplicate,
      (_, "manual", _) | (_, _, "confirmed") => Status::Reviewed,
      _ => Status::Automatic,
    }
  }

  fn quality(&self, event: &QuakeEvent, status: Status) -> Quality {
    match status {
      Status::Reviewed => Quality::Best,
      Status::Deleted => Quality::Deleted,
      Status::Duplicate => Quality::Unknown,
      Status::Automatic
        if event.used_phase_count >= Self::GOOD_PHASE_COUNT
          && event.magnitude_station_count
            >= Self::GOOD_MAGNITUDE_STATION_COUNT =>
      {
        Quality::Good
      }
      Status::Automatic => Quality::Caution,
    }
  }
}

// ─── Regional intensity ──────────────────────────────────────────────────────

/// Modelled shaking at the closest locality in one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionalIntensity {
  pub mmi_distance: f64,
  pub intensity:    Intensity,
}

impl RegionalIntensity {
  /// Stored when the model could not produce a value for the region.
  pub const UNKNOWN: Self = Self {
    mmi_distance: 0.0,
    intensity:    Intensity::Unknown,
  };
}

/// One [`RegionalIntensity`] per entry of [`REGIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionalIntensities([RegionalIntensity; REGION_COUNT]);

impl Default for RegionalIntensities {
  fn default() -> Self { Self([RegionalIntensity::UNKNOWN; REGION_COUNT]) }
}

impl RegionalIntensities {
  pub fn get(&self, region: Region) -> RegionalIntensity {
    self.0[region.index()]
  }

  pub fn set(&mut self, region: Region, value: RegionalIntensity) {
    self.0[region.index()] = value;
  }

  pub fn iter(&self) -> impl Iterator<Item = (Region, RegionalIntensity)> + '_ {
    REGIONS.iter().map(|&r| (r, self.get(r)))
  }
}

// ─── Persisted record ────────────────────────────────────────────────────────

/// Sentinel locality when the home region has no usable locality.
pub const UNKNOWN_LOCALITY: &str = "unknown";

/// A quake event plus all derived fields; one row in each quake store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuakeRecord {
  pub event:                   QuakeEvent,
  pub status:                  Status,
  pub quality:                 Quality,
  pub deleted:                 bool,
  pub backup_site:             bool,
  /// Headline (epicentral) MMI.
  pub mmi:                     f64,
  pub intensity:               Intensity,
  pub modification_time_micro: i64,
  pub locality:                String,
  pub regions:                 RegionalIntensities,
}

impl QuakeRecord {
  pub fn public_id(&self) -> &str { &self.event.public_id }

  pub fn modification_time(&self) -> DateTime<Utc> {
    self.event.modification_time
  }
}

/// Signed microseconds since the Unix epoch.
///
/// Computed from whole seconds plus the sub-second part so the zero
/// time (`0001-01-01T00:00:00Z`) and other pre-epoch values encode without
/// wrapping.
pub fn unix_micro(t: DateTime<Utc>) -> i64 {
  t.timestamp() * 1_000_000 + i64::from(t.timestamp_subsec_micros())
}

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::TimeZone;

  use super::*;

  /// A reviewed Bay of Plenty quake modelled on `2013p407387`.
  pub fn event(public_id: &str, modified: DateTime<Utc>) -> QuakeEvent {
    QuakeEvent {
      public_id:               public_id.into(),
      event_type:              "earthquake".into(),
      agency_id:               "WEL(GNS_Primary)".into(),
      modification_time:       modified,
      time:                    Utc
        .with_ymd_and_hms(2013, 5, 30, 15, 15, 37)
        .unwrap(),
      longitude:               176.8,
      latitude:                -38.0,
      depth:                   20.0,
      depth_type:              "operator assigned".into(),
      method_id:               "LOCSAT".into(),
      earth_model_id:          "iasp91".into(),
      evaluation_mode:         "manual".into(),
      evaluation_status:       "confirmed".into(),
      used_phase_count:        22,
      used_station_count:      19,
      standard_error:          0.39,
      azimuthal_gap:           166.0,
      minimum_distance:        0.07,
      magnitude:               4.1,
      magnitude_uncertainty:   0.0,
      magnitude_type:          "M".into(),
      magnitude_station_count: 16,
      site:                    "primary".into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::{fixtures::event, *};

  #[test]
  fn unix_micro_handles_zero_and_epoch() {
    let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(unix_micro(zero), -62_135_596_800_000_000);

    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    assert_eq!(unix_micro(epoch), 0);
  }

  #[test]
  fn unix_micro_keeps_sub_second_precision() {
    let t = Utc.timestamp_opt(1_370_035_061, 549_123_000).unwrap();
    assert_eq!(unix_micro(t), 1_370_035_061_549_123);
  }

  #[test]
  fn reviewed_solutions_are_best() {
    let e = event("2013p407387", Utc::now());
    let status = DefaultRules.status(&e);
    assert_eq!(status, Status::Reviewed);
    assert_eq!(DefaultRules.quality(&e, status), Quality::Best);
  }

  #[test]
  fn automatic_quality_depends_on_counts() {
    let mut e = event("2013p407387", Utc::now());
    e.evaluation_mode = "automatic".into();
    e.evaluation_status = "preliminary".into();
    assert_eq!(DefaultRules.status(&e), Status::Automatic);
    assert_eq!(DefaultRules.quality(&e, Status::Automatic), Quality::Good);

    e.used_phase_count = 8;
    assert_eq!(DefaultRules.quality(&e, Status::Automatic), Quality::Caution);
  }

  #[test]
  fn retracted_and_duplicate_types() {
    let mut e = event("2013p407387", Utc::now());
    e.event_type = "not existing".into();
    assert_eq!(DefaultRules.status(&e), Status::Deleted);
    assert_eq!(DefaultRules.quality(&e, Status::Deleted), Quality::Deleted);

    e.event_type = "duplicate".into();
    assert_eq!(DefaultRules.status(&e), Status::Duplicate);
    assert_eq!(DefaultRules.quality(&e, Status::Duplicate), Quality::Unknown);
  }

  #[test]
  fn event_json_uses_wire_names() {
    let e = event("2013p407387", Utc::now());
    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["publicID"], "2013p407387");
    assert_eq!(json["type"], "earthquake");
    assert_eq!(json["usedPhaseCount"], 22);
    assert_eq!(json["earthModelID"], "iasp91");
  }
}
