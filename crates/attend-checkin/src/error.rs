//! Error type for `attend-checkin`.

use attend_core::record::CheckInKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A check-in attempt is already running for this key. Surfaced
  /// synchronously; no second attempt is started.
  #[error("check-in attempt already in flight for {0}")]
  AttemptInFlight(CheckInKey),

  /// Remote store read/write fault (network or backend).
  #[error("store error for {key}: {source}")]
  Store {
    key:    CheckInKey,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
