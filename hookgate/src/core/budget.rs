//! Execution-time budget helpers for a single hook invocation.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(anyhow!("hook time budget exhausted"));
    }
    Ok(remaining)
}

/// The smaller of `limit` and what is left until `deadline`.
///
/// Errors once the deadline has passed.
pub fn bounded_timeout(limit: Duration, deadline: Instant) -> Result<Duration> {
    Ok(remaining_budget(deadline)?.min(limit))
}
