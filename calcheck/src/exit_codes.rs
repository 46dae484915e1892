//! Stable exit codes for calcheck CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, config, payload, or any other error.
pub const INVALID: i32 = 1;
/// The session reached a terminal step or rejected an event because it had.
pub const TERMINATED: i32 = 2;
/// `calcheck summary` found a comparison outside its threshold.
pub const OUTSIDE_THRESHOLD: i32 = 3;
