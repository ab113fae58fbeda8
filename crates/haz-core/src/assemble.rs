//! Record assembly: a [`QuakeEvent`] plus derived fields becomes the
//! [`QuakeRecord`] written to every quake store.

use crate::{
  derive::{Derived, derive},
  intensity::IntensityModel,
  quake::{QuakeEvent, QuakeRecord, QualityRules, Status, unix_micro},
  region::Region,
};

/// Site name that marks information produced by the backup processing site.
pub const BACKUP_SITE: &str = "backup";

/// Combine an event with its derived fields.
pub fn assemble<R>(event: QuakeEvent, derived: Derived, rules: &R) -> QuakeRecord
where
  R: QualityRules + ?Sized,
{
  let status = rules.status(&event);
  let quality = rules.quality(&event, status);

  QuakeRecord {
    status,
    quality,
    deleted: status == Status::Deleted,
    backup_site: event.site == BACKUP_SITE,
    mmi: derived.mmi,
    intensity: derived.intensity,
    modification_time_micro: unix_micro(event.modification_time),
    locality: derived.locality,
    regions: derived.regions,
    event,
  }
}

/// Derive and assemble in one step.
pub fn build_record<M, R>(
  event: QuakeEvent,
  model: &M,
  rules: &R,
  home: Region,
) -> QuakeRecord
where
  M: IntensityModel + ?Sized,
  R: QualityRules + ?Sized,
{
  let derived = derive(model, &event.hypocentre(), home);
  assemble(event, derived, rules)
}
