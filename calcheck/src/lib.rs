//! Calibration check session model for a liquid-handling robot.
//!
//! The robot reports a guided calibration check (tip length, pipette offset,
//! deck) as a series of session payloads. This crate validates those
//! payloads into immutable snapshots, sequences the user's transitions
//! through the fixed step order, and judges measured offsets against their
//! thresholds. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (step order, threshold
//!   evaluation, instrument registry, payload invariants). No I/O.
//! - **[`io`]**: Config files, payload files with schema validation, and
//!   summary rendering.
//!
//! [`session`] composes the core into the owned [`session::SessionStore`]
//! consumed by the UI; `main.rs` drives it from the command line.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
