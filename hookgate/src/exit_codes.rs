//! Stable exit codes for hookgate CLI commands.

/// Command succeeded. `hookgate hook` always exits with this code.
pub const OK: i32 = 0;
/// Command failed due to invalid config, arguments or I/O errors.
pub const INVALID: i32 = 1;
