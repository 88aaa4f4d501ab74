//! [`CheckInCoordinator`] — one check-in attempt from location fix to
//! persisted record.
//!
//! An attempt walks `Idle → Locating → Evaluating → Persisting` and ends in
//! `Succeeded` or `Failed`. Every transition is published on a broadcast
//! channel together with the observable record, so a UI layer can follow
//! along. At most one attempt per key is in flight; the guard is shared
//! through an [`AttemptGate`] so separate coordinator instances for the
//! same key cannot race two writes.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use attend_core::{
  evaluate::{self, Clock, SystemClock},
  geo::GeoCoordinate,
  record::{CheckInKey, CheckInRecord},
  store::{LocationProvider, RecordCache, RemoteStore},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{Error, Result, store::CheckInStore};

/// Bound on waiting for a location fix; expiry counts as no fix.
const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(12);

/// Broadcast buffer. An attempt publishes at most five transitions, so
/// slow subscribers only lag, they do not stall the attempt.
const EVENT_BUFFER: usize = 16;

// ─── Observable state ────────────────────────────────────────────────────────

/// Why an attempt ended in [`AttemptPhase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
  /// No fix within the timeout, a provider fault, or permission denied.
  LocationUnavailable,
  /// The evaluated record could not be persisted. The observable record
  /// keeps the evaluated status so the caller can retry the save without
  /// re-locating.
  PersistenceError,
}

/// Phase of a check-in attempt. `Succeeded` and `Failed` are terminal; a
/// new attempt always restarts from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
  Idle,
  Locating,
  Evaluating,
  Persisting,
  Succeeded,
  Failed(FailReason),
}

/// One published transition: the phase entered and the observable record
/// at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptState {
  pub phase:  AttemptPhase,
  pub record: CheckInRecord,
}

// ─── Single-flight gate ──────────────────────────────────────────────────────

/// Process-wide set of keys with an attempt in flight.
///
/// Cloning shares the set; hand the same gate to every coordinator.
#[derive(Clone, Default)]
pub struct AttemptGate {
  in_flight: Arc<Mutex<HashSet<CheckInKey>>>,
}

impl AttemptGate {
  pub fn new() -> Self { Self::default() }

  /// Claim `key`, or fail with [`Error::AttemptInFlight`]. The claim is
  /// released when the returned guard drops — including when the attempt
  /// future is cancelled mid-flight.
  fn claim(&self, key: CheckInKey) -> Result<GateGuard> {
    let mut set = self.in_flight.lock().expect("attempt gate poisoned");
    if !set.insert(key) {
      return Err(Error::AttemptInFlight(key));
    }
    Ok(GateGuard {
      gate: self.clone(),
      key,
    })
  }
}

struct GateGuard {
  gate: AttemptGate,
  key:  CheckInKey,
}

impl Drop for GateGuard {
  fn drop(&mut self) {
    if let Ok(mut set) = self.gate.in_flight.lock() {
      set.remove(&self.key);
    }
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Drives check-in attempts for one (appointment, user) pair.
pub struct CheckInCoordinator<L, R, C> {
  key:              CheckInKey,
  provider:         L,
  store:            CheckInStore<R, C>,
  target:           GeoCoordinate,
  radius_m:         f64,
  location_timeout: Duration,
  clock:            Arc<dyn Clock>,
  gate:             AttemptGate,
  events:           broadcast::Sender<AttemptState>,
}

impl<L, R, C> CheckInCoordinator<L, R, C>
where
  L: LocationProvider,
  R: RemoteStore,
  C: RecordCache,
{
  pub fn new(
    key: CheckInKey,
    provider: L,
    store: CheckInStore<R, C>,
    target: GeoCoordinate,
    radius_m: f64,
    gate: AttemptGate,
  ) -> Self {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Self {
      key,
      provider,
      store,
      target,
      radius_m,
      location_timeout: DEFAULT_LOCATION_TIMEOUT,
      clock: Arc::new(SystemClock),
      gate,
      events,
    }
  }

  pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
    self.location_timeout = timeout;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Subscribe to attempt transitions. Each subscriber receives every
  /// subsequent transition, in order.
  pub fn subscribe(&self) -> broadcast::Receiver<AttemptState> {
    self.events.subscribe()
  }

  /// Run one attempt.
  ///
  /// Returns [`Error::AttemptInFlight`] synchronously when this key already
  /// has an attempt running. All other outcomes — including
  /// `LocationUnavailable` and `PersistenceError` — are reported as a
  /// terminal [`AttemptState`], not as errors.
  ///
  /// Dropping the returned future at a suspension point abandons the
  /// attempt: no further transitions are published, the store is not
  /// written, and the gate slot is released.
  pub async fn check_in(&self) -> Result<AttemptState> {
    let _guard = self.gate.claim(self.key)?;

    let record = CheckInRecord::pending();
    self.publish(AttemptPhase::Locating, &record);

    let Some(fix) = self.obtain_fix().await else {
      let state = AttemptState {
        phase:  AttemptPhase::Failed(FailReason::LocationUnavailable),
        record: CheckInRecord::missed(),
      };
      self.publish(state.phase, &state.record);
      warn!(key = %self.key, "check-in failed: location unavailable");
      return Ok(state);
    };

    self.publish(AttemptPhase::Evaluating, &record);
    let record = evaluate::evaluate(
      Some(fix),
      self.target,
      self.radius_m,
      self.clock.as_ref(),
    );

    Ok(self.persist(record).await)
  }

  /// Retry persisting an already-evaluated record without re-locating.
  ///
  /// Intended for the `Failed(PersistenceError)` aftermath, where the
  /// observable record still carries the evaluated status.
  pub async fn retry_save(&self, record: CheckInRecord) -> Result<AttemptState> {
    let _guard = self.gate.claim(self.key)?;
    Ok(self.persist(record).await)
  }

  /// A fix, or `None` for any of: permission denied, a provider fault, a
  /// provider with no fix to give, or timeout expiry.
  async fn obtain_fix(&self) -> Option<GeoCoordinate> {
    if !self.provider.permission_granted() {
      warn!(key = %self.key, "location permission not granted");
      return None;
    }

    let request = self.provider.current_location();
    match tokio::time::timeout(self.location_timeout, request).await {
      Ok(Ok(fix)) => fix,
      Ok(Err(e)) => {
        warn!(key = %self.key, error = %e, "location provider failed");
        None
      }
      Err(_) => {
        warn!(
          key = %self.key,
          timeout_s = self.location_timeout.as_secs_f32(),
          "location fix timed out"
        );
        None
      }
    }
  }

  async fn persist(&self, record: CheckInRecord) -> AttemptState {
    self.publish(AttemptPhase::Persisting, &record);

    match self.store.save(self.key, record.clone()).await {
      Ok(()) => {
        debug!(key = %self.key, status = ?record.status, "check-in attempt persisted");
        let state = AttemptState {
          phase: AttemptPhase::Succeeded,
          record,
        };
        self.publish(state.phase, &state.record);
        state
      }
      Err(e) => {
        warn!(key = %self.key, error = %e, "check-in persistence failed");
        let state = AttemptState {
          phase: AttemptPhase::Failed(FailReason::PersistenceError),
          record,
        };
        self.publish(state.phase, &state.record);
        state
      }
    }
  }

  fn publish(&self, phase: AttemptPhase, record: &CheckInRecord) {
    // Send only fails when nobody is subscribed, which is fine.
    let _ = self.events.send(AttemptState {
      phase,
      record: record.clone(),
    });
  }
}
