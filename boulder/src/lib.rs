//! Plan-execution orchestration engine.
//!
//! Drives work through markdown plans (checkbox tasks grouped into waves) and
//! keeps one persisted execution state per project. The architecture follows
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan parsing, progress, checkpoint
//!   decisions, story transitions, agent resolution). No I/O.
//! - **[`io`]**: Side-effecting operations (state and config files, story and
//!   transcript readers, prompt rendering, delivery transport).
//!
//! Orchestration modules ([`start`], [`checkpoint`], [`story_guard`],
//! [`continuation`], [`plans`]) coordinate core logic with I/O to implement
//! the CLI commands and the host-facing continuation controller.

pub mod checkpoint;
pub mod continuation;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plans;
pub mod start;
pub mod story_guard;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
