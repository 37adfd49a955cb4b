//! Deterministic, pure logic shared by the orchestration layer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod agent;
pub mod checkpoint;
pub mod plan;
pub mod progress;
pub mod story;
