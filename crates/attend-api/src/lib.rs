//! JSON REST API for the attend check-in service.
//!
//! Exposes an axum [`Router`] backed by any [`RemoteStore`] +
//! [`RecordCache`] pair. TLS and transport concerns are the caller's
//! responsibility; the `server` binary is the composition root that wires
//! concrete backends.

pub mod appointments;
pub mod auth;
pub mod checkin;
pub mod error;

use std::{path::PathBuf, sync::Arc};

use attend_checkin::{coordinator::AttemptGate, store::CheckInStore};
use attend_core::store::{RecordCache, RemoteStore};
use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// Where the SQLite record cache lives.
  pub cache_path:         PathBuf,
  /// Check-in radius (meters) for bookings that do not specify one.
  pub default_radius_m:   f64,
  /// Bound on waiting for a location fix, seconds.
  pub location_timeout_s: u64,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<R, C> {
  pub store:  CheckInStore<R, C>,
  pub gate:   AttemptGate,
  pub auth:   Arc<AuthConfig>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn router<R, C>(state: AppState<R, C>) -> Router
where
  R: RemoteStore + Clone + 'static,
  C: RecordCache + Clone + 'static,
{
  Router::new()
    .route("/appointments", post(appointments::book::<R, C>))
    .route("/appointments/{id}", get(appointments::get_one::<R, C>))
    .route(
      "/appointments/{id}/checkin",
      post(checkin::attempt::<R, C>),
    )
    .route(
      "/appointments/{id}/checkin/{user_id}",
      get(checkin::get_record::<R, C>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
