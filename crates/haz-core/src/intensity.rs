//! Shaking intensity labels and the [`IntensityModel`] seam.
//!
//! The geophysical model that maps a hypocentre and magnitude to shaking at a
//! place is a black box to the ledger. Anything implementing
//! [`IntensityModel`] can drive regional derivation; [`crate::gazetteer`]
//! provides a locality-table implementation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::region::Region;

// ─── Labels ──────────────────────────────────────────────────────────────────

/// Descriptive label for a Modified Mercalli Intensity value.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Intensity {
  /// Sentinel for a region whose intensity could not be modelled.
  Unknown,
  Unnoticeable,
  Weak,
  Light,
  Moderate,
  Strong,
  Severe,
}

impl Intensity {
  pub fn from_mmi(mmi: f64) -> Self {
    match mmi {
      m if m >= 7.0 => Self::Severe,
      m if m >= 6.0 => Self::Strong,
      m if m >= 5.0 => Self::Moderate,
      m if m >= 4.0 => Self::Light,
      m if m >= 3.0 => Self::Weak,
      _ => Self::Unnoticeable,
    }
  }

  /// Lower MMI bound of the label; used by `regionIntensity` filters.
  /// `Unknown` and `Unnoticeable` admit everything.
  pub fn min_mmi(self) -> f64 {
    match self {
      Self::Unknown | Self::Unnoticeable => -9.0,
      Self::Weak => 3.0,
      Self::Light => 4.0,
      Self::Moderate => 5.0,
      Self::Strong => 6.0,
      Self::Severe => 7.0,
    }
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Model input / output ────────────────────────────────────────────────────

/// The parts of a quake the intensity model consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hypocentre {
  pub longitude: f64,
  pub latitude:  f64,
  /// Kilometres below the surface.
  pub depth:     f64,
  pub magnitude: f64,
}

/// The nearest named place in a region, with the modelled intensity there.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestLocality {
  pub name:         String,
  /// Great-circle distance from the locality to the epicentre, km.
  pub distance_km:  f64,
  /// Bearing from the locality to the epicentre, degrees clockwise from north.
  pub bearing:      f64,
  /// Distance-weighted MMI at the locality.
  pub mmi_distance: f64,
}

impl ClosestLocality {
  pub fn intensity(&self) -> Intensity { Intensity::from_mmi(self.mmi_distance) }

  /// Human description such as `10 km north-west of Whakatane`.
  pub fn describe(&self) -> String {
    if self.distance_km < 5.0 {
      return format!("Within 5 km of {}", self.name);
    }
    let rounded = (self.distance_km / 5.0).floor() * 5.0;
    format!("{rounded:.0} km {} of {}", compass(self.bearing), self.name)
  }
}

/// Eight-point compass name for a bearing in degrees.
pub fn compass(bearing: f64) -> &'static str {
  const POINTS: [&str; 8] = [
    "north",
    "north-east",
    "east",
    "south-east",
    "south",
    "south-west",
    "west",
    "north-west",
  ];
  let b = bearing.rem_euclid(360.0);
  let sector = ((b + 22.5) / 45.0).floor() as usize % POINTS.len();
  POINTS[sector]
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
  #[error("no locality found in region {0}")]
  NoLocality(Region),

  #[error("intensity model failed for region {region}: {reason}")]
  Failed { region: Region, reason: String },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Maps a hypocentre and magnitude to shaking intensity.
///
/// Implementations must be cheap to share across ingest workers; derivation
/// calls them once per region per event.
pub trait IntensityModel: Send + Sync {
  /// Maximum modelled intensity at the epicentre.
  fn epicentral_mmi(&self, hypo: &Hypocentre) -> f64;

  /// The closest locality in `region` and the intensity modelled there.
  /// Failure is scoped to this region only.
  fn closest_in_region(
    &self,
    hypo: &Hypocentre,
    region: Region,
  ) -> Result<ClosestLocality, ModelError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_follow_mmi_thresholds() {
    assert_eq!(Intensity::from_mmi(-1.0), Intensity::Unnoticeable);
    assert_eq!(Intensity::from_mmi(2.99), Intensity::Unnoticeable);
    assert_eq!(Intensity::from_mmi(3.0), Intensity::Weak);
    assert_eq!(Intensity::from_mmi(4.5), Intensity::Light);
    assert_eq!(Intensity::from_mmi(5.0), Intensity::Moderate);
    assert_eq!(Intensity::from_mmi(6.2), Intensity::Strong);
    assert_eq!(Intensity::from_mmi(8.0), Intensity::Severe);
  }

  #[test]
  fn min_mmi_is_lower_bound_of_label() {
    for label in [
      Intensity::Weak,
      Intensity::Light,
      Intensity::Moderate,
      Intensity::Strong,
      Intensity::Severe,
    ] {
      assert_eq!(Intensity::from_mmi(label.min_mmi()), label);
    }
  }

  #[test]
  fn labels_parse_lowercase() {
    assert_eq!("unknown".parse::<Intensity>().unwrap(), Intensity::Unknown);
    assert_eq!(Intensity::Moderate.as_str(), "moderate");
    assert!("loud".parse::<Intensity>().is_err());
  }

  #[test]
  fn compass_points() {
    assert_eq!(compass(0.0), "north");
    assert_eq!(compass(359.0), "north");
    assert_eq!(compass(44.0), "north-east");
    assert_eq!(compass(90.0), "east");
    assert_eq!(compass(200.0), "south");
    assert_eq!(compass(315.0), "north-west");
    assert_eq!(compass(-90.0), "west");
  }

  #[test]
  fn describe_rounds_down_to_five_km() {
    let mut loc = ClosestLocality {
      name:         "Whakatane".into(),
      distance_km:  13.7,
      bearing:      310.0,
      mmi_distance: 4.2,
    };
    assert_eq!(loc.describe(), "10 km north-west of Whakatane");

    loc.distance_km = 3.0;
    assert_eq!(loc.describe(), "Within 5 km of Whakatane");
  }
}
