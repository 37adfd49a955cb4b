//! Stable exit codes for boulder CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, missing state or any other error.
pub const INVALID: i32 = 1;
/// `boulder next` found no open task (plan complete).
pub const COMPLETE: i32 = 2;
/// A story transition was rejected or a checkpoint is waiting for a decision.
pub const BLOCKED: i32 = 3;
