//! Core types and trait definitions for the attend check-in service.
//!
//! This crate is deliberately free of HTTP, database, and runtime
//! dependencies. All other crates depend on it; it depends on nothing
//! proprietary.

pub mod appointment;
pub mod error;
pub mod evaluate;
pub mod geo;
pub mod record;
pub mod store;

pub use error::{Error, Result};
