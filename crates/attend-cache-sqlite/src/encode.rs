//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, records as their wire-format
//! JSON document, UUIDs as hyphenated lowercase strings.

use attend_core::record::CheckInRecord;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── CheckInRecord ───────────────────────────────────────────────────────────

pub fn encode_record(record: &CheckInRecord) -> Result<String> {
  Ok(serde_json::to_string(record)?)
}

pub fn decode_record(s: &str) -> Result<CheckInRecord> {
  Ok(serde_json::from_str(s)?)
}
