//! Check-in records and their status lifecycle.
//!
//! A record exists per (appointment, user) pair — at most one in the store.
//! It is created `Pending` when the appointment is booked, mutated exactly
//! once per check-in attempt outcome, and never deleted in normal operation
//! (audit trail).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoCoordinate;

/// Lifecycle state of a check-in record.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInStatus {
  #[default]
  Pending,
  CheckedIn,
  Missed,
}

/// Identity of a check-in record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckInKey {
  pub appointment_id: Uuid,
  pub user_id:        Uuid,
}

impl CheckInKey {
  pub fn new(appointment_id: Uuid, user_id: Uuid) -> Self {
    Self {
      appointment_id,
      user_id,
    }
  }
}

impl std::fmt::Display for CheckInKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "appointment {}/user {}", self.appointment_id, self.user_id)
  }
}

/// One check-in record.
///
/// The serialised form matches the remote document: camelCase field names,
/// the status enum name as a string, `checkedInAt` as epoch milliseconds or
/// null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
  pub status:         CheckInStatus,
  /// Set only on the transition to `CheckedIn`.
  #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
  pub checked_in_at:  Option<DateTime<Utc>>,
  /// Latitude recorded at the moment of a successful check-in.
  pub checked_in_lat: Option<f64>,
  /// Longitude recorded at the moment of a successful check-in.
  pub checked_in_lng: Option<f64>,
}

impl CheckInRecord {
  /// A fresh `Pending` record — what booking an appointment creates.
  pub fn pending() -> Self { Self::default() }

  /// A `Missed` record: no timestamp, no coordinates.
  pub fn missed() -> Self {
    Self {
      status: CheckInStatus::Missed,
      ..Self::default()
    }
  }

  /// A `CheckedIn` record stamped with `at` and the fix `location`.
  pub fn checked_in(at: DateTime<Utc>, location: GeoCoordinate) -> Self {
    Self {
      status:         CheckInStatus::CheckedIn,
      checked_in_at:  Some(at),
      checked_in_lat: Some(location.lat),
      checked_in_lng: Some(location.lng),
    }
  }
}
