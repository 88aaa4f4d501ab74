//! The check-in proximity decision.
//!
//! Pure apart from reading the injected clock: given the same inputs and a
//! fixed clock, [`evaluate`] is deterministic and never fails.

use chrono::{DateTime, Utc};

use crate::{
  geo::{self, GeoCoordinate},
  record::CheckInRecord,
};

/// Injectable time source.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Decide the outcome of one check-in attempt.
///
/// - No fix (`current` is `None`): `Missed`, with no timestamp and no
///   coordinates. Failure is a value, not an error.
/// - Within `radius_m` of `target`, boundary inclusive: `CheckedIn`,
///   stamped with the clock time and the fix coordinates.
/// - Otherwise: `Missed`.
pub fn evaluate(
  current: Option<GeoCoordinate>,
  target: GeoCoordinate,
  radius_m: f64,
  clock: &dyn Clock,
) -> CheckInRecord {
  let Some(current) = current else {
    return CheckInRecord::missed();
  };

  if geo::distance_meters(current, target) <= radius_m {
    CheckInRecord::checked_in(clock.now(), current)
  } else {
    CheckInRecord::missed()
  }
}
