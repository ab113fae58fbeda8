//! A locality-table [`IntensityModel`].
//!
//! Each locality names the regions it belongs to. The closest locality in a
//! region is found by great-circle distance from the epicentre, and shaking
//! there is estimated from hypocentral distance with a magnitude/depth
//! attenuation relation.

use serde::Deserialize;

use crate::{
  Error, Result,
  intensity::{ClosestLocality, Hypocentre, IntensityModel, ModelError},
  region::Region,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Quakes at or below this depth use the deep attenuation branch.
const DEEP_KM: f64 = 70.0;

/// A named place.
#[derive(Debug, Clone, Deserialize)]
pub struct Locality {
  pub name:      String,
  pub longitude: f64,
  pub latitude:  f64,
  pub regions:   Vec<Region>,
}

#[derive(Debug, Clone)]
pub struct Gazetteer {
  localities: Vec<Locality>,
}

impl Gazetteer {
  pub fn new(localities: Vec<Locality>) -> Result<Self> {
    if localities.is_empty() {
      return Err(Error::EmptyGazetteer);
    }
    Ok(Self { localities })
  }

  /// Parse a JSON array of localities.
  pub fn from_json(json: &str) -> Result<Self> {
    Self::new(serde_json::from_str(json)?)
  }
}

impl IntensityModel for Gazetteer {
  fn epicentral_mmi(&self, hypo: &Hypocentre) -> f64 {
    mmi_at(hypo.depth.abs(), hypo.depth, hypo.magnitude)
  }

  fn closest_in_region(
    &self,
    hypo: &Hypocentre,
    region: Region,
  ) -> Result<ClosestLocality, ModelError> {
    let (locality, distance_km) = self
      .localities
      .iter()
      .filter(|l| l.regions.contains(&region))
      .map(|l| {
        let d =
          distance_km(l.latitude, l.longitude, hypo.latitude, hypo.longitude);
        (l, d)
      })
      .filter(|(_, d)| d.is_finite())
      .min_by(|a, b| a.1.total_cmp(&b.1))
      .ok_or(ModelError::NoLocality(region))?;

    let hypocentral = distance_km.hypot(hypo.depth);

    let heading = bearing(
      locality.latitude,
      locality.longitude,
      hypo.latitude,
      hypo.longitude,
    );

    Ok(ClosestLocality {
      name: locality.name.clone(),
      distance_km,
      bearing: heading,
      mmi_distance: mmi_at(hypocentral, hypo.depth, hypo.magnitude),
    })
  }
}

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Haversine distance between two points, km.
fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
  let dp = p2 - p1;
  let dl = (lon2 - lon1).to_radians();
  let a = (dp / 2.0).sin().powi(2)
    + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Initial bearing from point 1 to point 2, degrees in `[0, 360)`.
fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
  let dl = (lon2 - lon1).to_radians();
  let y = dl.sin() * p2.cos();
  let x = p1.cos() * p2.sin() - p1.sin() * p2.cos() * dl.cos();
  y.atan2(x).to_degrees().rem_euclid(360.0)
}

// ─── Attenuation ─────────────────────────────────────────────────────────────

/// MMI at `hypocentral_km` from a quake of `magnitude` at `depth`.
/// Values below MMI 3 are reported as -1 (not felt).
fn mmi_at(hypocentral_km: f64, depth: f64, magnitude: f64) -> f64 {
  let d = depth.abs();
  let r = hypocentral_km.max(d).max(1.0);

  let mmi = if d < DEEP_KM {
    4.40 + 1.26 * magnitude - 3.67 * (r.powi(3) + 1634.691752).log10() / 3.0
      + 0.012 * d
      + 0.409
  } else {
    3.76 + 1.48 * magnitude - 3.50 * r.powi(3).log10() / 3.0 + 0.0031 * d
  };

  if mmi < 3.0 { -1.0 } else { mmi }
}
