//! Test utilities and helpers for Waitroom
//!
//! Shared by unit tests, the integration tests under `tests/` and the server
//! and CLI test suites.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
