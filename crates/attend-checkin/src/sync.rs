//! [`AppointmentStatusSync`] — advances an appointment when its check-in
//! record is created.

use attend_core::{
  appointment::Appointment,
  record::CheckInStatus,
  store::{CheckInCreated, RecordWatch, RemoteStore},
};
use tracing::{error, info};

/// Consumer of the remote store's change feed.
///
/// Delivery is at-least-once, so [`handle`](Self::handle) is idempotent: it
/// only ever writes the single fixed status value, and only the
/// store-stamped `updated_at` may differ between deliveries. A failed
/// appointment write is logged and dropped — the check-in record itself
/// stays persisted (eventual consistency, no rollback).
pub struct AppointmentStatusSync<R> {
  remote: R,
}

impl<R: RemoteStore> AppointmentStatusSync<R> {
  pub fn new(remote: R) -> Self { Self { remote } }

  /// Handle one created check-in document.
  pub async fn handle(&self, event: &CheckInCreated) {
    // The feed only carries checked-in transitions, but redelivered or
    // replayed events are not guaranteed to.
    if event.record.status != CheckInStatus::CheckedIn {
      return;
    }

    match self
      .remote
      .set_appointment_status(event.key.appointment_id, Appointment::CHECKED_IN)
      .await
    {
      Ok(()) => {
        info!(key = %event.key, "appointment advanced to Checked-In");
      }
      Err(e) => {
        error!(key = %event.key, error = %e, "appointment status update failed");
      }
    }
  }

  /// Drain `watch` until the feed closes or the owning task is cancelled.
  /// Dropping the watch unsubscribes.
  pub async fn run<W: RecordWatch>(&self, mut watch: W) {
    while let Some(event) = watch.next().await {
      self.handle(&event).await;
    }
  }
}
