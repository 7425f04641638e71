//! Deterministic, pure logic shared by checkers and adapters.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod classifier;
pub mod merge;
pub mod pattern;
pub mod shell;
pub mod types;
