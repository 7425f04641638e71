//! Hook enforcement layer for AI coding agents.
//!
//! A host runtime invokes the `hookgate` binary at fixed points of an agent
//! session (session start, before and after file edits, stop, session end).
//! Each invocation reads the project's workflow state under `.workflow/`,
//! evaluates the relevant checkers, and answers in the host's own hook
//! vocabulary. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalized types, path
//!   classification, result merging, glob matching).
//! - **[`io`]**: Side-effecting operations (config, state store, processes).
//!   Isolated behind traits to enable in-memory fakes in tests.
//! - **[`checks`]**: The checkers: task gate, component reuse, loop check,
//!   validation runner, session context.
//! - **[`adapters`]**: Translation between one host's envelopes and the
//!   normalized request/result shapes.
//!
//! [`dispatch`] wires these together under a fail-open policy.

pub mod adapters;
pub mod checks;
pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
