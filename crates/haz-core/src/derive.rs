//! Regional intensity derivation.
//!
//! Runs the [`IntensityModel`] once per region. A failure in one region only
//! degrades that region to [`RegionalIntensity::UNKNOWN`]; it never fails the
//! record.

use crate::{
  intensity::{Hypocentre, Intensity, IntensityModel},
  quake::{RegionalIntensities, RegionalIntensity, UNKNOWN_LOCALITY},
  region::{REGIONS, Region},
};

/// Fields derived from the model for a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
  pub mmi:       f64,
  pub intensity: Intensity,
  pub locality:  String,
  pub regions:   RegionalIntensities,
}

pub fn derive<M>(model: &M, hypo: &Hypocentre, home: Region) -> Derived
where
  M: IntensityModel + ?Sized,
{
  let mut regions = RegionalIntensities::default();
  let mut locality = UNKNOWN_LOCALITY.to_owned();

  for region in REGIONS {
    match model.closest_in_region(hypo, region) {
      Ok(closest) => {
        if region == home {
          locality = closest.describe();
        }
        regions.set(region, RegionalIntensity {
          mmi_distance: closest.mmi_distance,
          intensity:    closest.intensity(),
        });
      }
      Err(e) => {
        tracing::warn!(
          region = region.name(),
          error = %e,
          "regional intensity unavailable; storing unknown"
        );
        regions.set(region, RegionalIntensity::UNKNOWN);
      }
    }
  }

  let mmi = model.epicentral_mmi(hypo);

  Derived { mmi, intensity: Intensity::from_mmi(mmi), locality, regions }
}
