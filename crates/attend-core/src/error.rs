//! Error types for `attend-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("latitude out of range [-90, 90]: {0}")]
  LatitudeOutOfRange(f64),

  #[error("longitude out of range [-180, 180]: {0}")]
  LongitudeOutOfRange(f64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
