//! SQLite backend for the local check-in record cache.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread pool without blocking the async runtime.

mod cache;
mod encode;
mod schema;

pub mod error;

pub use cache::SqliteCache;
pub use error::{Error, Result};
