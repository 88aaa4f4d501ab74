//! The check-in workflow: two-tier record persistence, appointment status
//! sync, and the attempt coordinator.
//!
//! Everything here is generic over the collaborator traits in
//! [`attend_core::store`]. Concrete backends are wired once by the server
//! binary in `attend-api`.

pub mod coordinator;
pub mod error;
pub mod memory;
pub mod store;
pub mod sync;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
