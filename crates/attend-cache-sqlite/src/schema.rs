//! SQL schema for the SQLite record cache.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Local mirror of remote check-in documents, keyed the same way as the
-- remote path appointments/{appointment_id}/checkin/{user_id}.
-- Entries are upserted on save and refresh; never authoritative.
CREATE TABLE IF NOT EXISTS checkin_cache (
    appointment_id TEXT NOT NULL,
    user_id        TEXT NOT NULL,
    record_json    TEXT NOT NULL,   -- wire-format CheckInRecord document
    cached_at      TEXT NOT NULL,   -- ISO 8601 UTC; when this entry was mirrored
    PRIMARY KEY (appointment_id, user_id)
);

PRAGMA user_version = 1;
";
