//! Appointment — the externally-owned entity this subsystem patches.
//!
//! Appointments are booked and managed elsewhere. The check-in core reads
//! them for the target location and radius, and writes exactly one status
//! value, [`Appointment::CHECKED_IN`], when a check-in record is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoCoordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
  pub appointment_id:   Uuid,
  /// The patient this appointment belongs to.
  pub user_id:          Uuid,
  /// Free-form status string; this subsystem only ever writes
  /// [`Appointment::CHECKED_IN`].
  pub status:           String,
  /// The clinic's coordinates — the check-in target.
  pub location:         GeoCoordinate,
  /// Proximity radius for automatic check-in, in meters.
  pub checkin_radius_m: f64,
  pub scheduled_at:     DateTime<Utc>,
  /// Stamped by the store on every status update.
  pub updated_at:       DateTime<Utc>,
}

impl Appointment {
  /// The one status transition target the check-in core writes.
  pub const CHECKED_IN: &'static str = "Checked-In";
}
