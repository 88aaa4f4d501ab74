//! [`MemoryRemote`] — an in-process remote store with a working change
//! feed.
//!
//! The backend the server binary wires, and the one every test uses. Fault
//! injection via [`MemoryRemote::fail_next`] simulates remote outages.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use attend_core::{
  appointment::Appointment,
  record::{CheckInKey, CheckInRecord, CheckInStatus},
  store::{CheckInCreated, RecordWatch, RemoteStore},
};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MemoryError {
  /// Injected with [`MemoryRemote::fail_next`]; stands in for a network or
  /// backend outage.
  #[error("simulated remote fault")]
  Unavailable,

  #[error("appointment not found: {0}")]
  AppointmentNotFound(Uuid),
}

#[derive(Default)]
struct Inner {
  records:      HashMap<CheckInKey, CheckInRecord>,
  appointments: HashMap<Uuid, Appointment>,
  watchers:     Vec<mpsc::UnboundedSender<CheckInCreated>>,
  fail_next:    u32,
}

/// In-memory [`RemoteStore`]. Cloning shares the backing maps.
#[derive(Clone, Default)]
pub struct MemoryRemote {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
  pub fn new() -> Self { Self::default() }

  /// Make the next `n` operations fail with [`MemoryError::Unavailable`].
  pub fn fail_next(&self, n: u32) { self.lock().fail_next = n; }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().expect("memory remote poisoned")
  }

  fn check_fault(inner: &mut Inner) -> Result<(), MemoryError> {
    if inner.fail_next > 0 {
      inner.fail_next -= 1;
      return Err(MemoryError::Unavailable);
    }
    Ok(())
  }
}

/// Change feed handle. Dropping it unsubscribes.
pub struct MemoryWatch {
  rx: mpsc::UnboundedReceiver<CheckInCreated>,
}

impl RecordWatch for MemoryWatch {
  async fn next(&mut self) -> Option<CheckInCreated> { self.rx.recv().await }
}

impl RemoteStore for MemoryRemote {
  type Error = MemoryError;
  type Watch = MemoryWatch;

  async fn put_record(
    &self,
    key: CheckInKey,
    record: CheckInRecord,
  ) -> Result<(), MemoryError> {
    let mut inner = self.lock();
    Self::check_fault(&mut inner)?;

    let prior = inner.records.insert(key, record.clone());

    // The feed fires once per transition into CheckedIn, never on the
    // Pending seed that booking writes. Re-upserting an already checked-in
    // record stays silent; at-least-once redelivery is the consumer's
    // problem, not manufactured here.
    let newly_checked_in = record.status == CheckInStatus::CheckedIn
      && prior.map(|p| p.status) != Some(CheckInStatus::CheckedIn);
    if newly_checked_in {
      let event = CheckInCreated { key, record };
      inner.watchers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    Ok(())
  }

  async fn get_record(
    &self,
    key: CheckInKey,
  ) -> Result<Option<CheckInRecord>, MemoryError> {
    let mut inner = self.lock();
    Self::check_fault(&mut inner)?;
    Ok(inner.records.get(&key).cloned())
  }

  async fn put_appointment(
    &self,
    appointment: Appointment,
  ) -> Result<(), MemoryError> {
    let mut inner = self.lock();
    Self::check_fault(&mut inner)?;
    inner
      .appointments
      .insert(appointment.appointment_id, appointment);
    Ok(())
  }

  async fn get_appointment(
    &self,
    appointment_id: Uuid,
  ) -> Result<Option<Appointment>, MemoryError> {
    let mut inner = self.lock();
    Self::check_fault(&mut inner)?;
    Ok(inner.appointments.get(&appointment_id).cloned())
  }

  async fn set_appointment_status(
    &self,
    appointment_id: Uuid,
    status: &str,
  ) -> Result<(), MemoryError> {
    let mut inner = self.lock();
    Self::check_fault(&mut inner)?;
    let appointment = inner
      .appointments
      .get_mut(&appointment_id)
      .ok_or(MemoryError::AppointmentNotFound(appointment_id))?;
    appointment.status = status.to_owned();
    appointment.updated_at = Utc::now();
    Ok(())
  }

  fn watch_created(&self) -> Result<MemoryWatch, MemoryError> {
    let (tx, rx) = mpsc::unbounded_channel();
    self.lock().watchers.push(tx);
    Ok(MemoryWatch { rx })
  }
}
