//! The fixed set of named quake regions.
//!
//! Region names double as column suffixes (`MMID_<name>`, `Intensity_<name>`)
//! in every quake store, so the set is closed and ordered. Everything that
//! needs to visit each region iterates [`REGIONS`] rather than naming regions
//! individually.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// A named geographic area used to report localised shaking intensity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Region {
  NewZealand,
  AucklandNorthland,
  TongagriroBayofPlenty,
  Gisborne,
  HawkesBay,
  Taranaki,
  Wellington,
  NelsonWestCoast,
  Canterbury,
  Fiordland,
  OtagoSouthland,
}

pub const REGION_COUNT: usize = 11;

/// Every region, in column order. The position of a region in this table is
/// its [`Region::index`].
pub const REGIONS: [Region; REGION_COUNT] = [
  Region::NewZealand,
  Region::AucklandNorthland,
  Region::TongagriroBayofPlenty,
  Region::Gisborne,
  Region::HawkesBay,
  Region::Taranaki,
  Region::Wellington,
  Region::NelsonWestCoast,
  Region::Canterbury,
  Region::Fiordland,
  Region::OtagoSouthland,
];

/// The region used for the headline locality when no region is requested.
pub const HOME_REGION: Region = Region::NewZealand;

impl Region {
  /// The lowercase name, also used as the column suffix.
  pub fn name(self) -> &'static str { self.into() }

  pub fn index(self) -> usize { self as usize }

  /// Column holding the regional MMI-distance value.
  pub fn mmid_column(self) -> String { format!("MMID_{}", self.name()) }

  /// Column holding the regional intensity label.
  pub fn intensity_column(self) -> String {
    format!("Intensity_{}", self.name())
  }

  /// Parse a region name, as supplied to `regionID` query filters.
  pub fn parse(name: &str) -> Result<Self> {
    Region::from_str(name).map_err(|_| Error::UnknownRegion(name.to_owned()))
  }
}
