//! Handlers for `/appointments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/appointments` | Body: [`BookBody`]; returns 201 + the appointment |
//! | `GET`  | `/appointments/:id` | Single appointment |
//!
//! Booking also seeds the `PENDING` check-in record for the
//! (appointment, patient) pair.

use attend_core::{
  appointment::Appointment,
  geo::GeoCoordinate,
  record::{CheckInKey, CheckInRecord},
  store::{RecordCache, RemoteStore},
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Book ─────────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /appointments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookBody {
  pub user_id:          Uuid,
  /// Clinic latitude, degrees.
  pub lat:              f64,
  /// Clinic longitude, degrees.
  pub lng:              f64,
  /// Proximity radius override, meters. Falls back to the configured
  /// default.
  pub checkin_radius_m: Option<f64>,
  pub scheduled_at:     DateTime<Utc>,
}

/// `POST /appointments` — returns 201 + the stored [`Appointment`].
pub async fn book<R, C>(
  State(state): State<AppState<R, C>>,
  _auth: Authenticated,
  Json(body): Json<BookBody>,
) -> Result<impl IntoResponse, ApiError>
where
  R: RemoteStore + Clone + 'static,
  C: RecordCache + Clone + 'static,
{
  let location = GeoCoordinate::new(body.lat, body.lng)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let appointment = Appointment {
    appointment_id: Uuid::new_v4(),
    user_id: body.user_id,
    status: "Booked".to_owned(),
    location,
    checkin_radius_m: body
      .checkin_radius_m
      .unwrap_or(state.config.default_radius_m),
    scheduled_at: body.scheduled_at,
    updated_at: Utc::now(),
  };

  state
    .store
    .remote()
    .put_appointment(appointment.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  // Booking implicitly creates the Pending check-in record.
  let key = CheckInKey::new(appointment.appointment_id, appointment.user_id);
  state
    .store
    .save(key, CheckInRecord::pending())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((StatusCode::CREATED, Json(appointment)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /appointments/:id`
pub async fn get_one<R, C>(
  State(state): State<AppState<R, C>>,
  _auth: Authenticated,
  Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError>
where
  R: RemoteStore + Clone + 'static,
  C: RecordCache + Clone + 'static,
{
  let appointment = state
    .store
    .remote()
    .get_appointment(appointment_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound(format!("appointment {appointment_id} not found"))
    })?;
  Ok(Json(appointment))
}
