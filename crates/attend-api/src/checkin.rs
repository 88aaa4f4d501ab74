//! Handlers for the check-in endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/appointments/:id/checkin` | Body: [`CheckInBody`]; runs one attempt |
//! | `GET`  | `/appointments/:id/checkin/:user_id` | The record, tagged with staleness |
//!
//! The mobile client acts as the location provider: it posts its own fix
//! (or none, when it could not obtain one).

use std::{convert::Infallible, time::Duration};

use attend_checkin::{
  Error as CheckInError,
  coordinator::{AttemptPhase, AttemptState, CheckInCoordinator, FailReason},
};
use attend_core::{
  geo::GeoCoordinate,
  record::{CheckInKey, CheckInRecord},
  store::{LocationProvider, RecordCache, RemoteStore},
};
use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Posted fix ───────────────────────────────────────────────────────────────

/// Location provider backed by the fix the client posted.
struct PostedFix(Option<GeoCoordinate>);

impl LocationProvider for PostedFix {
  type Error = Infallible;

  fn permission_granted(&self) -> bool { true }

  async fn current_location(
    &self,
  ) -> Result<Option<GeoCoordinate>, Infallible> {
    Ok(self.0)
  }
}

// ─── Attempt ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /appointments/:id/checkin`.
///
/// `lat`/`lng` carry the client's fix; omit both when no fix was obtained.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInBody {
  pub user_id: Uuid,
  pub lat:     Option<f64>,
  pub lng:     Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
  /// `"succeeded"` or `"failed"`.
  pub phase:  &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<&'static str>,
  pub record: CheckInRecord,
}

impl From<AttemptState> for AttemptResponse {
  fn from(outcome: AttemptState) -> Self {
    let (phase, reason) = match outcome.phase {
      AttemptPhase::Succeeded => ("succeeded", None),
      AttemptPhase::Failed(FailReason::LocationUnavailable) => {
        ("failed", Some("location_unavailable"))
      }
      AttemptPhase::Failed(FailReason::PersistenceError) => {
        ("failed", Some("persistence_error"))
      }
      // Non-terminal phases never escape the coordinator.
      AttemptPhase::Idle
      | AttemptPhase::Locating
      | AttemptPhase::Evaluating
      | AttemptPhase::Persisting => ("in_progress", None),
    };
    Self {
      phase,
      reason,
      record: outcome.record,
    }
  }
}

/// `POST /appointments/:id/checkin`
pub async fn attempt<R, C>(
  State(state): State<AppState<R, C>>,
  _auth: Authenticated,
  Path(appointment_id): Path<Uuid>,
  Json(body): Json<CheckInBody>,
) -> Result<Json<AttemptResponse>, ApiError>
where
  R: RemoteStore + Clone + 'static,
  C: RecordCache + Clone + 'static,
{
  let fix = match (body.lat, body.lng) {
    (Some(lat), Some(lng)) => Some(
      GeoCoordinate::new(lat, lng)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    ),
    (None, None) => None,
    _ => {
      return Err(ApiError::BadRequest(
        "lat and lng must be provided together".to_string(),
      ));
    }
  };

  let appointment = state
    .store
    .remote()
    .get_appointment(appointment_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound(format!("appointment {appointment_id} not found"))
    })?;

  // Don't leak whether the appointment exists to the wrong patient.
  if appointment.user_id != body.user_id {
    return Err(ApiError::NotFound(format!(
      "appointment {appointment_id} not found"
    )));
  }

  let key = CheckInKey::new(appointment_id, body.user_id);
  let coordinator = CheckInCoordinator::new(
    key,
    PostedFix(fix),
    state.store.clone(),
    appointment.location,
    appointment.checkin_radius_m,
    state.gate.clone(),
  )
  .with_location_timeout(Duration::from_secs(state.config.location_timeout_s));

  match coordinator.check_in().await {
    Ok(outcome) => Ok(Json(AttemptResponse::from(outcome))),
    Err(CheckInError::AttemptInFlight(k)) => {
      Err(ApiError::AttemptInFlight(k.to_string()))
    }
    Err(e) => Err(ApiError::Store(Box::new(e))),
  }
}

// ─── Record ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
  pub record: CheckInRecord,
  /// `true` when the value came from the local cache during a remote
  /// outage.
  pub stale:  bool,
}

/// `GET /appointments/:id/checkin/:user_id`
pub async fn get_record<R, C>(
  State(state): State<AppState<R, C>>,
  _auth: Authenticated,
  Path((appointment_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RecordResponse>, ApiError>
where
  R: RemoteStore + Clone + 'static,
  C: RecordCache + Clone + 'static,
{
  let key = CheckInKey::new(appointment_id, user_id);
  let loaded = state
    .store
    .load(key)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("no check-in record for {key}")))?;

  Ok(Json(RecordResponse {
    record: loaded.record,
    stale:  loaded.stale,
  }))
}
