//! Integration tests for the check-in workflow against the in-memory
//! remote store.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use attend_core::{
  appointment::Appointment,
  evaluate::Clock,
  geo::GeoCoordinate,
  record::{CheckInKey, CheckInRecord, CheckInStatus},
  store::{CheckInCreated, LocationProvider, RecordCache, RemoteStore},
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error,
  coordinator::{AttemptGate, AttemptPhase, AttemptState, CheckInCoordinator, FailReason},
  memory::MemoryRemote,
  store::CheckInStore,
  sync::AppointmentStatusSync,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn hospital() -> GeoCoordinate {
  GeoCoordinate::new(37.4219983, -122.084).unwrap()
}

fn a_kilometer_away() -> GeoCoordinate {
  GeoCoordinate::new(37.4309902, -122.084).unwrap()
}

fn key() -> CheckInKey {
  CheckInKey::new(Uuid::new_v4(), Uuid::new_v4())
}

fn fixed_time() -> DateTime<Utc> {
  DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { self.0 }
}

fn appointment_for(k: CheckInKey) -> Appointment {
  Appointment {
    appointment_id:   k.appointment_id,
    user_id:          k.user_id,
    status:           "Booked".to_owned(),
    location:         hospital(),
    checkin_radius_m: 200.0,
    scheduled_at:     fixed_time(),
    updated_at:       fixed_time(),
  }
}

// ── In-memory cache with injectable put failures ──────────────────────────

#[derive(Debug, Error)]
#[error("simulated cache fault")]
struct CacheFault;

#[derive(Clone, Default)]
struct MemCache {
  map:       Arc<Mutex<HashMap<CheckInKey, CheckInRecord>>>,
  fail_puts: Arc<AtomicBool>,
}

impl RecordCache for MemCache {
  type Error = CacheFault;

  async fn put(
    &self,
    key: CheckInKey,
    record: CheckInRecord,
  ) -> Result<(), CacheFault> {
    if self.fail_puts.load(Ordering::SeqCst) {
      return Err(CacheFault);
    }
    self.map.lock().unwrap().insert(key, record);
    Ok(())
  }

  async fn get(
    &self,
    key: CheckInKey,
  ) -> Result<Option<CheckInRecord>, CacheFault> {
    Ok(self.map.lock().unwrap().get(&key).cloned())
  }

  async fn delete(&self, key: CheckInKey) -> Result<(), CacheFault> {
    self.map.lock().unwrap().remove(&key);
    Ok(())
  }
}

// ── Scripted location provider ────────────────────────────────────────────

struct FakeProvider {
  granted: bool,
  fix:     Option<GeoCoordinate>,
  fail:    bool,
  delay:   Option<Duration>,
  calls:   Arc<AtomicUsize>,
}

impl FakeProvider {
  fn with_fix(fix: GeoCoordinate) -> Self {
    Self {
      granted: true,
      fix:     Some(fix),
      fail:    false,
      delay:   None,
      calls:   Arc::default(),
    }
  }

  fn no_fix() -> Self {
    Self {
      fix: None,
      ..Self::with_fix(hospital())
    }
  }
}

impl LocationProvider for FakeProvider {
  type Error = std::io::Error;

  fn permission_granted(&self) -> bool { self.granted }

  async fn current_location(
    &self,
  ) -> Result<Option<GeoCoordinate>, std::io::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail {
      return Err(std::io::Error::other("gps fault"));
    }
    Ok(self.fix)
  }
}

fn store(remote: MemoryRemote, cache: MemCache) -> CheckInStore<MemoryRemote, MemCache> {
  CheckInStore::new(remote, cache)
}

fn coordinator(
  k: CheckInKey,
  provider: FakeProvider,
  remote: MemoryRemote,
  cache: MemCache,
) -> CheckInCoordinator<FakeProvider, MemoryRemote, MemCache> {
  CheckInCoordinator::new(k, provider, store(remote, cache), hospital(), 200.0, AttemptGate::new())
    .with_clock(Arc::new(FixedClock(fixed_time())))
}

fn drain(
  rx: &mut tokio::sync::broadcast::Receiver<AttemptState>,
) -> Vec<AttemptState> {
  let mut states = Vec::new();
  while let Ok(state) = rx.try_recv() {
    states.push(state);
  }
  states
}

// ─── CheckInStore ────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_then_load_round_trips_the_record() {
  let s = store(MemoryRemote::new(), MemCache::default());
  let k = key();
  let record = CheckInRecord::checked_in(fixed_time(), hospital());

  s.save(k, record.clone()).await.unwrap();

  let loaded = s.load(k).await.unwrap().unwrap();
  assert_eq!(loaded.record, record);
  assert!(!loaded.stale);
}

#[tokio::test]
async fn load_missing_record_is_none_not_an_error() {
  let s = store(MemoryRemote::new(), MemCache::default());
  assert!(s.load(key()).await.unwrap().is_none());
}

#[tokio::test]
async fn cache_write_failure_does_not_fail_save() {
  let cache = MemCache::default();
  cache.fail_puts.store(true, Ordering::SeqCst);
  let remote = MemoryRemote::new();
  let s = store(remote.clone(), cache);
  let k = key();

  s.save(k, CheckInRecord::missed()).await.unwrap();

  // The remote write stands even though the mirror never happened.
  let stored = remote.get_record(k).await.unwrap().unwrap();
  assert_eq!(stored.status, CheckInStatus::Missed);
}

#[tokio::test]
async fn remote_outage_serves_cached_record_tagged_stale() {
  let remote = MemoryRemote::new();
  let s = store(remote.clone(), MemCache::default());
  let k = key();
  let record = CheckInRecord::checked_in(fixed_time(), hospital());
  s.save(k, record.clone()).await.unwrap();

  remote.fail_next(1);
  let loaded = s.load(k).await.unwrap().unwrap();
  assert_eq!(loaded.record, record);
  assert!(loaded.stale);

  // Once the remote recovers, reads are fresh again.
  let loaded = s.load(k).await.unwrap().unwrap();
  assert!(!loaded.stale);
}

#[tokio::test]
async fn remote_outage_with_empty_cache_is_an_error() {
  let remote = MemoryRemote::new();
  let s = store(remote.clone(), MemCache::default());

  remote.fail_next(1);
  let err = s.load(key()).await.unwrap_err();
  assert!(matches!(err, Error::Store { .. }), "got {err:?}");
}

// ─── AppointmentStatusSync ───────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_delivery_leaves_a_single_stable_status() {
  let remote = MemoryRemote::new();
  let k = key();
  remote.put_appointment(appointment_for(k)).await.unwrap();

  let event = CheckInCreated {
    key:    k,
    record: CheckInRecord::checked_in(fixed_time(), hospital()),
  };

  let sync = AppointmentStatusSync::new(remote.clone());
  sync.handle(&event).await;
  sync.handle(&event).await;

  let appointment = remote.get_appointment(k.appointment_id).await.unwrap().unwrap();
  assert_eq!(appointment.status, Appointment::CHECKED_IN);
}

#[tokio::test]
async fn non_checked_in_events_are_ignored() {
  let remote = MemoryRemote::new();
  let k = key();
  remote.put_appointment(appointment_for(k)).await.unwrap();

  let event = CheckInCreated {
    key:    k,
    record: CheckInRecord::pending(),
  };
  AppointmentStatusSync::new(remote.clone()).handle(&event).await;

  let appointment = remote.get_appointment(k.appointment_id).await.unwrap().unwrap();
  assert_eq!(appointment.status, "Booked");
}

#[tokio::test]
async fn change_feed_drives_the_appointment_to_checked_in() {
  let remote = MemoryRemote::new();
  let k = key();
  remote.put_appointment(appointment_for(k)).await.unwrap();

  let watch = remote.watch_created().unwrap();
  let sync_remote = remote.clone();
  let task = tokio::spawn(async move {
    AppointmentStatusSync::new(sync_remote).run(watch).await;
  });

  // Booking's Pending seed must not advance the appointment.
  remote.put_record(k, CheckInRecord::pending()).await.unwrap();
  // The actual check-in does.
  remote
    .put_record(k, CheckInRecord::checked_in(fixed_time(), hospital()))
    .await
    .unwrap();

  let mut advanced = false;
  for _ in 0..50 {
    tokio::time::sleep(Duration::from_millis(10)).await;
    let appointment =
      remote.get_appointment(k.appointment_id).await.unwrap().unwrap();
    if appointment.status == Appointment::CHECKED_IN {
      advanced = true;
      break;
    }
  }
  assert!(advanced, "appointment never advanced");

  task.abort();
}

// ─── CheckInCoordinator ──────────────────────────────────────────────────────

#[tokio::test]
async fn at_the_hospital_the_attempt_succeeds_and_persists_checked_in() {
  let remote = MemoryRemote::new();
  let cache = MemCache::default();
  let k = key();
  let c = coordinator(k, FakeProvider::with_fix(hospital()), remote.clone(), cache.clone());

  let mut rx = c.subscribe();
  let state = c.check_in().await.unwrap();

  assert_eq!(state.phase, AttemptPhase::Succeeded);
  assert_eq!(state.record.status, CheckInStatus::CheckedIn);
  assert_eq!(state.record.checked_in_at, Some(fixed_time()));

  let phases: Vec<_> = drain(&mut rx).into_iter().map(|s| s.phase).collect();
  assert_eq!(
    phases,
    vec![
      AttemptPhase::Locating,
      AttemptPhase::Evaluating,
      AttemptPhase::Persisting,
      AttemptPhase::Succeeded,
    ]
  );

  // Persisted in both tiers.
  let stored = remote.get_record(k).await.unwrap().unwrap();
  assert_eq!(stored, state.record);
  let mirrored = cache.get(k).await.unwrap().unwrap();
  assert_eq!(mirrored, state.record);
}

#[tokio::test]
async fn a_kilometer_away_persists_a_missed_record() {
  let remote = MemoryRemote::new();
  let k = key();
  let c = coordinator(
    k,
    FakeProvider::with_fix(a_kilometer_away()),
    remote.clone(),
    MemCache::default(),
  );

  let state = c.check_in().await.unwrap();
  assert_eq!(state.phase, AttemptPhase::Succeeded);
  assert_eq!(state.record.status, CheckInStatus::Missed);
  assert_eq!(state.record.checked_in_at, None);

  let stored = remote.get_record(k).await.unwrap().unwrap();
  assert_eq!(stored.status, CheckInStatus::Missed);
}

#[tokio::test]
async fn no_fix_fails_with_location_unavailable_and_writes_nothing() {
  let remote = MemoryRemote::new();
  let k = key();
  let c = coordinator(k, FakeProvider::no_fix(), remote.clone(), MemCache::default());

  let state = c.check_in().await.unwrap();
  assert_eq!(
    state.phase,
    AttemptPhase::Failed(FailReason::LocationUnavailable)
  );
  assert_eq!(state.record, CheckInRecord::missed());

  // The flow never reached Persisting.
  assert!(remote.get_record(k).await.unwrap().is_none());
}

#[tokio::test]
async fn provider_fault_counts_as_location_unavailable() {
  let provider = FakeProvider {
    fail: true,
    ..FakeProvider::with_fix(hospital())
  };
  let c = coordinator(key(), provider, MemoryRemote::new(), MemCache::default());

  let state = c.check_in().await.unwrap();
  assert_eq!(
    state.phase,
    AttemptPhase::Failed(FailReason::LocationUnavailable)
  );
}

#[tokio::test]
async fn permission_denied_never_requests_a_fix() {
  let provider = FakeProvider {
    granted: false,
    ..FakeProvider::with_fix(hospital())
  };
  let calls = provider.calls.clone();
  let c = coordinator(key(), provider, MemoryRemote::new(), MemCache::default());

  let state = c.check_in().await.unwrap();
  assert_eq!(
    state.phase,
    AttemptPhase::Failed(FailReason::LocationUnavailable)
  );
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_provider_hits_the_bounded_timeout() {
  let provider = FakeProvider {
    delay: Some(Duration::from_millis(200)),
    ..FakeProvider::with_fix(hospital())
  };
  let c = coordinator(key(), provider, MemoryRemote::new(), MemCache::default())
    .with_location_timeout(Duration::from_millis(20));

  let state = c.check_in().await.unwrap();
  assert_eq!(
    state.phase,
    AttemptPhase::Failed(FailReason::LocationUnavailable)
  );
  assert_eq!(state.record.status, CheckInStatus::Missed);
}

#[tokio::test]
async fn save_fault_keeps_the_evaluated_record_observable_for_retry() {
  let remote = MemoryRemote::new();
  let k = key();
  let c = coordinator(
    k,
    FakeProvider::with_fix(hospital()),
    remote.clone(),
    MemCache::default(),
  );

  remote.fail_next(1);
  let state = c.check_in().await.unwrap();
  assert_eq!(state.phase, AttemptPhase::Failed(FailReason::PersistenceError));
  // CheckedIn survives the failed save so a UI can offer "retry save".
  assert_eq!(state.record.status, CheckInStatus::CheckedIn);
  assert!(remote.get_record(k).await.unwrap().is_none());

  // Retrying the save alone completes the attempt without re-locating.
  let retried = c.retry_save(state.record.clone()).await.unwrap();
  assert_eq!(retried.phase, AttemptPhase::Succeeded);
  assert_eq!(remote.get_record(k).await.unwrap().unwrap(), state.record);
}

#[tokio::test]
async fn a_second_attempt_is_rejected_while_one_is_in_flight() {
  let provider = FakeProvider {
    delay: Some(Duration::from_millis(200)),
    ..FakeProvider::with_fix(hospital())
  };
  let calls = provider.calls.clone();
  let k = key();
  let c = Arc::new(coordinator(k, provider, MemoryRemote::new(), MemCache::default()));

  let first = {
    let c = c.clone();
    tokio::spawn(async move { c.check_in().await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;

  // Rejected synchronously: no second location request, no second write.
  let err = c.check_in().await.unwrap_err();
  assert!(matches!(err, Error::AttemptInFlight(rejected) if rejected == k));
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  let state = first.await.unwrap().unwrap();
  assert_eq!(state.phase, AttemptPhase::Succeeded);

  // The gate slot is released once the attempt finishes.
  let again = c.check_in().await.unwrap();
  assert_eq!(again.phase, AttemptPhase::Succeeded);
}

#[tokio::test]
async fn dropping_an_attempt_mid_flight_goes_quiet_and_releases_the_gate() {
  let gate = AttemptGate::new();
  let remote = MemoryRemote::new();
  let k = key();

  let slow = FakeProvider {
    delay: Some(Duration::from_millis(500)),
    ..FakeProvider::with_fix(hospital())
  };
  let abandoned = Arc::new(
    CheckInCoordinator::new(
      k,
      slow,
      store(remote.clone(), MemCache::default()),
      hospital(),
      200.0,
      gate.clone(),
    )
    .with_clock(Arc::new(FixedClock(fixed_time()))),
  );
  let mut rx = abandoned.subscribe();

  let running = {
    let abandoned = abandoned.clone();
    tokio::spawn(async move { abandoned.check_in().await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;
  running.abort();
  let _ = running.await;

  // Locating was entered before the drop; nothing was published after it,
  // and the store was never written.
  let phases: Vec<_> = drain(&mut rx).into_iter().map(|s| s.phase).collect();
  assert_eq!(phases, vec![AttemptPhase::Locating]);
  assert!(remote.get_record(k).await.unwrap().is_none());

  // The drop guard released the slot, so a fresh attempt goes through.
  let retry = CheckInCoordinator::new(
    k,
    FakeProvider::with_fix(hospital()),
    store(remote, MemCache::default()),
    hospital(),
    200.0,
    gate,
  )
  .with_clock(Arc::new(FixedClock(fixed_time())));
  let state = retry.check_in().await.unwrap();
  assert_eq!(state.phase, AttemptPhase::Succeeded);
}

#[tokio::test]
async fn the_gate_is_shared_across_coordinator_instances() {
  let gate = AttemptGate::new();
  let remote = MemoryRemote::new();
  let k = key();

  let slow = FakeProvider {
    delay: Some(Duration::from_millis(200)),
    ..FakeProvider::with_fix(hospital())
  };
  let first = Arc::new(
    CheckInCoordinator::new(
      k,
      slow,
      store(remote.clone(), MemCache::default()),
      hospital(),
      200.0,
      gate.clone(),
    )
    .with_clock(Arc::new(FixedClock(fixed_time()))),
  );
  let second = CheckInCoordinator::new(
    k,
    FakeProvider::with_fix(hospital()),
    store(remote, MemCache::default()),
    hospital(),
    200.0,
    gate,
  );

  let running = {
    let first = first.clone();
    tokio::spawn(async move { first.check_in().await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;

  let err = second.check_in().await.unwrap_err();
  assert!(matches!(err, Error::AttemptInFlight(_)));

  running.await.unwrap().unwrap();
}
