//! [`SqliteCache`] — the SQLite implementation of the local record cache.

use std::path::Path;

use attend_core::{
  record::{CheckInKey, CheckInRecord},
  store::RecordCache,
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{decode_record, encode_dt, encode_record, encode_uuid},
  schema::SCHEMA,
};

/// A check-in record cache backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteCache {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCache {
  /// Open (or create) a cache at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  /// Open an in-memory cache — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

}

impl RecordCache for SqliteCache {
  type Error = Error;

  async fn put(&self, key: CheckInKey, record: CheckInRecord) -> Result<()> {
    let appointment_id = encode_uuid(key.appointment_id);
    let user_id = encode_uuid(key.user_id);
    let record_json = encode_record(&record)?;
    let cached_at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO checkin_cache
             (appointment_id, user_id, record_json, cached_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (appointment_id, user_id)
           DO UPDATE SET record_json = ?3, cached_at = ?4",
          rusqlite::params![appointment_id, user_id, record_json, cached_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get(&self, key: CheckInKey) -> Result<Option<CheckInRecord>> {
    let appointment_id = encode_uuid(key.appointment_id);
    let user_id = encode_uuid(key.user_id);

    let record_json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT record_json FROM checkin_cache
               WHERE appointment_id = ?1 AND user_id = ?2",
              rusqlite::params![appointment_id, user_id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    record_json.as_deref().map(decode_record).transpose()
  }

  async fn delete(&self, key: CheckInKey) -> Result<()> {
    let appointment_id = encode_uuid(key.appointment_id);
    let user_id = encode_uuid(key.user_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM checkin_cache
           WHERE appointment_id = ?1 AND user_id = ?2",
          rusqlite::params![appointment_id, user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
