//! Test utilities shared by unit tests, integration tests and benches
//!
//! Fixtures build versions, deltas and operations with stable integrity
//! tags; assertions compare receiver event streams.

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
