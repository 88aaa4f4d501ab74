//! Traits abstracting the external collaborators of the check-in core.
//!
//! Backends (`attend-checkin`'s in-memory remote, `attend-cache-sqlite`)
//! and platform location plumbing implement these. Collaborators are always
//! injected explicitly — nothing in this workspace reaches for an ambient
//! "current instance"; the server binary is the single composition root.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  appointment::Appointment,
  geo::GeoCoordinate,
  record::{CheckInKey, CheckInRecord},
};

// ─── Change feed ─────────────────────────────────────────────────────────────

/// A check-in document that just transitioned into `CheckedIn`, as
/// delivered by the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInCreated {
  pub key:    CheckInKey,
  pub record: CheckInRecord,
}

/// A cancellable subscription to check-in creation events.
///
/// Delivery is at-least-once, so consumers must be idempotent. Dropping the
/// watch unsubscribes.
pub trait RecordWatch: Send {
  /// The next created document, or `None` once the feed has closed.
  fn next(
    &mut self,
  ) -> impl Future<Output = Option<CheckInCreated>> + Send + '_;
}

// ─── Remote document store ───────────────────────────────────────────────────

/// The authoritative remote document store.
///
/// Check-in documents live at a deterministic per-key path
/// (`appointments/{appointment_id}/checkin/{user_id}`); writes are upserts,
/// so at most one record exists per key.
pub trait RemoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Watch: RecordWatch;

  /// Upsert the check-in record at the key's path.
  fn put_record(
    &self,
    key: CheckInKey,
    record: CheckInRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Read the check-in record at the key's path. `None` when no record
  /// exists — absence is not an error.
  fn get_record(
    &self,
    key: CheckInKey,
  ) -> impl Future<Output = Result<Option<CheckInRecord>, Self::Error>> + Send + '_;

  /// Register (or replace) an appointment document.
  fn put_appointment(
    &self,
    appointment: Appointment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_appointment(
    &self,
    appointment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Appointment>, Self::Error>> + Send + '_;

  /// Set an appointment's status field. The store stamps `updated_at`
  /// server-side.
  fn set_appointment_status<'a>(
    &'a self,
    appointment_id: Uuid,
    status: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Subscribe to check-in creations. Each successful check-in write
  /// produces one event; redelivery is possible.
  fn watch_created(&self) -> Result<Self::Watch, Self::Error>;
}

// ─── Local cache ─────────────────────────────────────────────────────────────

/// The local best-effort mirror, keyed the same way as the remote store.
///
/// Entries may be stale. They are never treated as authoritative once a
/// remote operation has acknowledged.
pub trait RecordCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn put(
    &self,
    key: CheckInKey,
    record: CheckInRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get(
    &self,
    key: CheckInKey,
  ) -> impl Future<Output = Result<Option<CheckInRecord>, Self::Error>> + Send + '_;

  fn delete(
    &self,
    key: CheckInKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Location provider ───────────────────────────────────────────────────────

/// Platform location plumbing.
pub trait LocationProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether the user has granted location permission. Checked as a
  /// pre-condition; denial is treated as no fix.
  fn permission_granted(&self) -> bool;

  /// Best-effort current fix. `Ok(None)` when the provider cannot produce
  /// one.
  fn current_location(
    &self,
  ) -> impl Future<Output = Result<Option<GeoCoordinate>, Self::Error>> + Send + '_;
}

// ─── Tagged read ─────────────────────────────────────────────────────────────

/// A record read through the two-tier store, tagged with provenance.
///
/// `stale` is `true` only when the remote store failed and the value came
/// from the local cache. The tag exists because a silent fallback would be
/// indistinguishable from fresh data.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
  pub record: CheckInRecord,
  pub stale:  bool,
}
