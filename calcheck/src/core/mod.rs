//! Deterministic, pure logic of the calibration check model.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod comparison;
pub mod error;
pub mod invariants;
pub mod payload;
pub mod registry;
pub mod sequencer;
pub mod snapshot;
pub mod types;
