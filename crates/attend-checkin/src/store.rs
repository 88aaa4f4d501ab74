//! [`CheckInStore`] — persistence for check-in records across the
//! authoritative remote store and the best-effort local cache.

use attend_core::{
  record::{CheckInKey, CheckInRecord},
  store::{Loaded, RecordCache, RemoteStore},
};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Two-tier record persistence.
///
/// The remote store is authoritative; the cache is a mirror that smooths
/// over remote outages on the read path. A cache entry is never preferred
/// once a remote operation has acknowledged.
#[derive(Clone)]
pub struct CheckInStore<R, C> {
  remote: R,
  cache:  C,
}

impl<R: RemoteStore, C: RecordCache> CheckInStore<R, C> {
  pub fn new(remote: R, cache: C) -> Self { Self { remote, cache } }

  /// The underlying remote store, for callers that need appointment
  /// documents or the change feed.
  pub fn remote(&self) -> &R { &self.remote }

  /// Upsert `record` at the key's path, then mirror it to the cache.
  ///
  /// The cache write is best-effort: its failure is logged and the save
  /// still succeeds. A remote failure fails the save and leaves the cache
  /// untouched.
  pub async fn save(
    &self,
    key: CheckInKey,
    record: CheckInRecord,
  ) -> Result<()> {
    self
      .remote
      .put_record(key, record.clone())
      .await
      .map_err(|e| Error::Store {
        key,
        source: Box::new(e),
      })?;

    if let Err(e) = self.cache.put(key, record).await {
      warn!(%key, error = %e, "cache mirror write failed; remote write stands");
    }

    Ok(())
  }

  /// Read the record for `key`. A missing record is `Ok(None)`.
  ///
  /// On a remote failure the cache is consulted: a cached value is returned
  /// tagged `stale: true`; an empty cache propagates the remote error.
  /// Absence is never fabricated from a dead network.
  pub async fn load(&self, key: CheckInKey) -> Result<Option<Loaded>> {
    match self.remote.get_record(key).await {
      Ok(Some(record)) => {
        // Keep the mirror warm; a refresh failure is only logged.
        if let Err(e) = self.cache.put(key, record.clone()).await {
          debug!(%key, error = %e, "cache refresh failed");
        }
        Ok(Some(Loaded {
          record,
          stale: false,
        }))
      }
      Ok(None) => Ok(None),
      Err(remote_err) => match self.cache.get(key).await {
        Ok(Some(record)) => {
          warn!(%key, error = %remote_err, "remote read failed; serving cached record as stale");
          Ok(Some(Loaded {
            record,
            stale: true,
          }))
        }
        Ok(None) => Err(Error::Store {
          key,
          source: Box::new(remote_err),
        }),
        Err(cache_err) => {
          warn!(%key, error = %cache_err, "cache read failed during remote outage");
          Err(Error::Store {
            key,
            source: Box::new(remote_err),
          })
        }
      },
    }
  }
}
